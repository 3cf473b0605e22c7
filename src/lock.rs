//! Per-file mutual exclusion for read-modify-write cycles.
//!
//! One async mutex per backing file, created lazily. Collections never share a
//! lock, and two store handles on the same file always do.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Lock held for the duration of a load → mutate → store cycle.
pub type CollectionLock = Arc<tokio::sync::Mutex<()>>;

/// Table of collection locks keyed by absolute file path.
#[derive(Debug, Default)]
pub struct CollectionLocks {
    locks: Mutex<HashMap<PathBuf, CollectionLock>>,
}

impl CollectionLocks {
    /// An empty table, independent of the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide table. Stores use this unless told otherwise.
    pub fn global() -> Arc<CollectionLocks> {
        static GLOBAL: OnceLock<Arc<CollectionLocks>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(CollectionLocks::new())))
    }

    /// Get (or create) the lock for `path`. Repeated calls for the same file
    /// return the same `Arc`.
    ///
    /// Relative paths are resolved against the current directory. Paths are
    /// not canonicalized, so reaching one file through a symlink or `..` gets
    /// a different lock.
    pub fn lock_for(&self, path: &Path) -> CollectionLock {
        let key = absolute(path);
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key).or_default())
    }

    /// Number of files with a lock.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// `true` if no lock has been handed out yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
