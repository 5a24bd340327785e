//! Error types for glyphcache

use std::fmt;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error types for cache operations
#[derive(Debug)]
pub enum CacheError {
    /// Bad handle, query, index or configuration supplied by the caller
    InvalidArgument(String),

    /// The face source could not resolve or reopen a face
    FontUnavailable(String),

    /// Allocation failure while growing cache bookkeeping
    OutOfMemory,

    /// No resident node matched (internal, never returned by lookups)
    NotCached,

    /// Other face source failure
    Face(facesource::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CacheError::FontUnavailable(msg) => write!(f, "Font unavailable: {}", msg),
            CacheError::OutOfMemory => write!(f, "Out of memory"),
            CacheError::NotCached => write!(f, "Not cached"),
            CacheError::Face(e) => write!(f, "Face error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Face(e) => Some(e),
            _ => None,
        }
    }
}

impl From<facesource::Error> for CacheError {
    fn from(err: facesource::Error) -> Self {
        match err {
            facesource::Error::FontUnavailable(msg) => CacheError::FontUnavailable(msg),
            facesource::Error::InvalidSubtable { index, count } => CacheError::InvalidArgument(
                format!("subtable {} out of range ({} available)", index, count),
            ),
            other => CacheError::Face(other),
        }
    }
}
