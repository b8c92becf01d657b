//! Error handling for cncstream
//!
//! Provides error types for all layers of the streaming subsystem:
//! - Controller errors (reported by the command interpreter through acks)
//! - Connection errors (socket and listener failures)
//! - Storage errors (upload destination resolution and writes)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Controller error type
///
/// Represents a failure reported by the command interpreter for a line it
/// was handed. Any of these passed to a channel's `ack` aborts the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Command was rejected by the interpreter
    #[error("Command rejected: {reason}")]
    CommandRejected {
        /// The reason the command was rejected.
        reason: String,
    },

    /// Interpreter reported a numbered error code
    #[error("Error code {code}")]
    Code {
        /// The interpreter's error code.
        code: u8,
    },

    /// Alarm condition detected
    #[error("Alarm: {code} - {message}")]
    Alarm {
        /// The alarm code.
        code: u32,
        /// The alarm message.
        message: String,
    },

    /// Line did not fit the line buffer; raised by the channel itself
    #[error("Line overflow after {length} bytes")]
    LineOverflow {
        /// Number of bytes accepted before the overflow.
        length: usize,
    },
}

/// Connection error type
///
/// Represents errors of the listening sockets and accepted connections.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to bind the listening socket
    #[error("Failed to bind port {port}: {reason}")]
    BindFailed {
        /// The port that could not be bound.
        port: u16,
        /// The reason the bind failed.
        reason: String,
    },
}

/// Storage error type
///
/// Represents failures of the upload destination.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested path cannot be placed under the storage root
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The requested path.
        path: String,
        /// Why the path was refused.
        reason: String,
    },

    /// Not enough free space for the upload
    #[error("Insufficient space: need {needed} bytes, {available} available")]
    InsufficientSpace {
        /// Bytes required by the upload.
        needed: u64,
        /// Bytes available, including the size of a replaced file.
        available: u64,
    },

    /// The file accepted fewer bytes than requested
    #[error("Short write: {written} of {requested} bytes")]
    ShortWrite {
        /// Bytes the file accepted.
        written: usize,
        /// Bytes handed to the file.
        requested: usize,
    },

    /// Underlying I/O error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for cncstream
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a controller error
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Error::Controller(_))
    }

    /// Check if this is a storage error
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome the interpreter reports for a line handed out by a channel.
pub type AckStatus = std::result::Result<(), ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err: Error = StorageError::InsufficientSpace {
            needed: 10,
            available: 4,
        }
        .into();
        assert!(err.is_storage_error());
        assert!(!err.is_connection_error());
        assert_eq!(
            err.to_string(),
            "Insufficient space: need 10 bytes, 4 available"
        );
    }

    #[test]
    fn test_controller_error_display() {
        let err = ControllerError::Code { code: 20 };
        assert_eq!(err.to_string(), "Error code 20");
        assert!(Error::from(err).is_controller_error());
    }
}
