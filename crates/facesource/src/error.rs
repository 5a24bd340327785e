//! Error types for facesource

use std::fmt;
use std::io;

/// Result type alias for face source operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for face source operations
#[derive(Debug)]
pub enum Error {
    /// I/O error while reading a face
    Io(io::Error),

    /// Malformed charmap table
    Parse(String),

    /// The face identifier could not be resolved or reopened
    FontUnavailable(String),

    /// Subtable index outside `0..count`
    InvalidSubtable {
        /// Requested subtable
        index: usize,
        /// Number of subtables in the face
        count: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::FontUnavailable(id) => write!(f, "Font unavailable: {}", id),
            Error::InvalidSubtable { index, count } => {
                write!(f, "Invalid subtable {} (face has {})", index, count)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}
