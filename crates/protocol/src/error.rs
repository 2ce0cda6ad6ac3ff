//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering malformed or inconsistent wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A chunk payload does not have the length its position requires.
    #[error("chunk {index} has {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        /// Index of the offending chunk.
        index: u64,
        /// Length required by the chunk position.
        expected: u64,
        /// Length actually received.
        actual: u64,
    },

    /// A chunk index lies past the last chunk of the declared file.
    #[error("chunk {index} is out of range for a file of {total} chunks")]
    ChunkOutOfRange {
        /// Index of the offending chunk.
        index: u64,
        /// Number of chunks in the declared file.
        total: u64,
    },

    /// An unknown upload reply code.
    #[error("unknown reply code: {0}")]
    UnknownCode(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
