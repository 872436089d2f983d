//! Error types for the Ember renderer
//!
//! GPU-level failures (object creation, unsupported operations) are fatal for the
//! component being constructed. File and format failures (`Io`, `Parse`) are
//! recoverable and can be told apart with [`Error::is_recoverable`].

use std::fmt;
use std::path::PathBuf;
use crate::device::{ImageLayout, MemoryProperty};

/// Result type for Ember renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ember renderer errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (object creation or command failure)
    BackendError(String),

    /// Out of host or device memory
    OutOfMemory,

    /// Invalid resource or argument (size, index, handle)
    InvalidResource(String),

    /// Initialization failed (device, pipeline, subsystems)
    InitializationFailed(String),

    /// No memory type matches the requirement bitmask and property flags
    NoSuitableMemoryType {
        type_filter: u32,
        properties: MemoryProperty,
    },

    /// Image layout transition not present in the transition table
    UnsupportedLayoutTransition {
        old: ImageLayout,
        new: ImageLayout,
    },

    /// None of the candidate formats supports the requested features
    UnsupportedFormat(String),

    /// Operation not allowed in the object's current lifecycle state
    InvalidState(String),

    /// File could not be read
    Io {
        path: PathBuf,
        message: String,
    },

    /// File content is malformed
    Parse {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },
}

impl Error {
    /// True for I/O-class failures (missing or malformed input files).
    ///
    /// Everything else is a GPU-level failure that aborts the construction
    /// of the component reporting it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Parse { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::NoSuitableMemoryType { type_filter, properties } => write!(
                f,
                "No suitable memory type (type filter {:#b}, properties {:?})",
                type_filter, properties
            ),
            Error::UnsupportedLayoutTransition { old, new } => {
                write!(f, "Unsupported layout transition: {:?} -> {:?}", old, new)
            }
            Error::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::Io { path, message } => {
                write!(f, "I/O error on '{}': {}", path.display(), message)
            }
            Error::Parse { path, line: Some(line), message } => {
                write!(f, "Parse error in '{}' at line {}: {}", path.display(), line, message)
            }
            Error::Parse { path, line: None, message } => {
                write!(f, "Parse error in '{}': {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
