//! File backend: owns one collection file and nothing else touches it.
//!
//! Bootstraps the file on demand, absorbs corrupt content into an empty
//! document (logged and counted), and writes crash-safely.

use crate::document::Document;
use crate::durability::Durability;
use crate::error::{Error, Result};
use crate::persist;
use crate::serializer::{JsonSerializer, Serializer};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Durable storage for one document file.
///
/// Cloning is cheap and clones share the corrupt-recovery counter. Callers are
/// expected to serialize load/store cycles themselves (the
/// [`EntityStore`](crate::EntityStore) does this with a per-file lock).
#[derive(Clone)]
pub struct FileBackend {
    path: PathBuf,
    serializer: JsonSerializer,
    durability: Durability,
    corrupt_recoveries: Arc<AtomicU64>,
}

impl FileBackend {
    /// Backend for `path` with pretty JSON and [`Durability::Fsync`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_options(path, JsonSerializer::pretty(), Durability::default())
    }

    /// Backend with an explicit serializer and durability policy.
    pub fn with_options(
        path: impl AsRef<Path>,
        serializer: JsonSerializer,
        durability: Durability,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            serializer,
            durability,
            corrupt_recoveries: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times a corrupt file was replaced by an empty document. Every
    /// increment is lost data, so anything above zero deserves attention.
    pub fn corrupt_recoveries(&self) -> u64 {
        self.corrupt_recoveries.load(Ordering::Relaxed)
    }

    /// Create the parent directory and an empty document if the file is
    /// missing. Idempotent.
    pub async fn ensure_exists(&self) -> Result<()> {
        let empty = self.serializer.encode(&Document::<()>::empty())?;
        if persist::create_if_missing(&self.path, &empty).await? {
            debug!(path = %self.path.display(), "created empty collection file");
        }
        Ok(())
    }

    /// Read and decode the document, bootstrapping the file if needed.
    ///
    /// A file that can't be decoded is not an error here: it is moved aside
    /// to `<file>.corrupt-<timestamp>`, replaced by an empty document, and an
    /// empty document is returned. An empty or whitespace-only file is simply
    /// rewritten as an empty document. Per-record shape is not checked here;
    /// decode into `Document<Fields>` to keep odd records intact. I/O
    /// failures are returned as-is.
    pub async fn load<T>(&self) -> Result<Document<T>>
    where
        T: DeserializeOwned,
    {
        self.ensure_exists().await?;
        let bytes = persist::read(&self.path).await?;
        match self.serializer.decode(&bytes) {
            Ok(doc) => {
                trace!(path = %self.path.display(), bytes = bytes.len(), "loaded document");
                Ok(doc)
            }
            Err(Error::CorruptDocument(reason)) => {
                self.recover(&bytes, &reason).await?;
                Ok(Document::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Stamp `last_updated`, encode, and atomically replace the file.
    pub async fn store<T>(&self, doc: &mut Document<T>) -> Result<()>
    where
        T: Serialize,
    {
        doc.last_updated = Some(Utc::now());
        let bytes = self.serializer.encode(doc)?;
        persist::atomic_write(&self.path, &bytes, self.durability)
            .await
            .map_err(|e| {
                error!(path = %self.path.display(), error = %e, "failed to write document");
                e
            })?;
        trace!(path = %self.path.display(), items = doc.items.len(), "stored document");
        Ok(())
    }

    async fn recover(&self, bytes: &[u8], reason: &str) -> Result<()> {
        // Nothing to lose in an empty file, so it isn't counted.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            warn!(path = %self.path.display(), "collection file is empty, rewriting as no data");
            let empty = self.serializer.encode(&Document::<()>::empty())?;
            return persist::atomic_write(&self.path, &empty, self.durability).await;
        }
        self.corrupt_recoveries.fetch_add(1, Ordering::Relaxed);
        error!(
            path = %self.path.display(),
            reason,
            "collection file is corrupt, falling back to an empty document"
        );
        match persist::quarantine(&self.path).await {
            Ok(moved) => {
                warn!(from = %self.path.display(), to = %moved.display(), "quarantined corrupt file");
                self.ensure_exists().await
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "could not quarantine corrupt file");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("path", &self.path)
            .field("durability", &self.durability)
            .field("pretty", &self.serializer.is_pretty())
            .finish_non_exhaustive()
    }
}
