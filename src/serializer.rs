//! Serialization layer. Defaults to pretty-printed JSON via serde_json.
//!
//! Implement [`Serializer`] if you need a different format.

use crate::document::Document;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts documents to/from bytes for persistence.
pub trait Serializer: Send + Sync {
    /// Encode a document to bytes.
    fn encode<T>(&self, doc: &Document<T>) -> Result<Vec<u8>>
    where
        T: Serialize;

    /// Decode bytes back into a document. Empty or malformed input yields
    /// [`Error::CorruptDocument`], never a panic.
    fn decode<T>(&self, bytes: &[u8]) -> Result<Document<T>>
    where
        T: DeserializeOwned;
}

/// JSON serializer, pretty-printed unless asked otherwise.
///
/// Output is deterministic: struct fields come out in declaration order and
/// free-form maps are sorted by key, so operators can diff the file.
#[derive(Debug, Clone)]
pub struct JsonSerializer {
    pretty: bool,
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::pretty()
    }
}

impl JsonSerializer {
    /// Pretty-printed JSON with indentation and a trailing newline.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Compact JSON (single line, no extra whitespace).
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// Whether output is indented.
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl Serializer for JsonSerializer {
    fn encode<T>(&self, doc: &Document<T>) -> Result<Vec<u8>>
    where
        T: Serialize,
    {
        let mut bytes = if self.pretty {
            serde_json::to_vec_pretty(doc)
        } else {
            serde_json::to_vec(doc)
        }
        .map_err(|e| Error::Serialize(e.to_string()))?;
        if self.pretty {
            bytes.push(b'\n');
        }
        Ok(bytes)
    }

    fn decode<T>(&self, bytes: &[u8]) -> Result<Document<T>>
    where
        T: DeserializeOwned,
    {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::CorruptDocument("document is empty".into()));
        }
        serde_json::from_slice(bytes).map_err(|e| Error::CorruptDocument(e.to_string()))
    }
}
