//! Unified error type for all store operations.

use std::io::ErrorKind;

/// Things that can go wrong when using a collection.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No entity with this id exists in the collection.
    NotFound(String),
    /// The bytes on disk could not be decoded into a document. The file backend
    /// absorbs this by falling back to an empty document, so callers only see
    /// it when decoding directly through a [`Serializer`](crate::Serializer).
    CorruptDocument(String),
    /// File system problem (create, read, write, sync, rename).
    Io {
        /// What kind of failure the OS reported (permission denied, etc.).
        kind: ErrorKind,
        /// Human-readable detail, including the path involved.
        message: String,
    },
    /// Caller-supplied fields are not an object, or don't fit the entity type.
    InvalidFields(String),
    /// A counter increment targeted a field that isn't a number.
    NotNumeric(String),
    /// Failed to serialize a document to bytes.
    Serialize(String),
    /// Bad configuration (invalid path, unknown or duplicate collection, etc.).
    Config(String),
}

impl Error {
    /// `true` for [`Error::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// `true` for [`Error::Io`].
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }

    /// Status code an HTTP layer should answer with. No partial data should be
    /// returned alongside a 5xx.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::InvalidFields(_) | Error::NotNumeric(_) => 400,
            _ => 500,
        }
    }

    pub(crate) fn io(err: std::io::Error, context: impl std::fmt::Display) -> Self {
        Error::Io {
            kind: err.kind(),
            message: format!("{context}: {err}"),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound(id) => write!(f, "entity not found: {id}"),
            Error::CorruptDocument(msg) => write!(f, "corrupt document: {msg}"),
            Error::Io { kind, message } => write!(f, "i/o error ({kind}): {message}"),
            Error::InvalidFields(msg) => write!(f, "invalid fields: {msg}"),
            Error::NotNumeric(field) => write!(f, "counter field is not numeric: {field}"),
            Error::Serialize(msg) => write!(f, "serialization error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
