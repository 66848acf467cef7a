//! Error types for breeze.
//!
//! This module provides a unified error type for all breeze operations,
//! with specific error variants for different failure modes.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A specialized `Result` type for breeze operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for breeze.
#[derive(Error, Debug)]
pub enum Error {
    /// A framed message exceeded the 1 MiB protocol limit
    #[error("message of {0} bytes exceeds the 1 MiB frame limit")]
    MessageTooLarge(usize),

    /// Invalid protocol message
    #[error("invalid protocol message: {0}")]
    Protocol(String),

    /// Unexpected message type
    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected message variant
        expected: String,
        /// Actual message variant received
        actual: String,
    },

    /// A peer offered a file under an unsafe relative path
    #[error("unsafe relative path: {0:?}")]
    PathInvalid(String),

    /// Received file bytes did not match the sender's checksum
    #[error("checksum mismatch for '{file}'")]
    ChecksumMismatch {
        /// Relative path of the offending file
        file: String,
    },

    /// Transfer rejected by receiver
    #[error("transfer rejected by receiver")]
    TransferRejected,

    /// Connection lost during transfer
    #[error("connection lost during transfer to {0}")]
    ConnectionLost(SocketAddr),

    /// No peer with the requested alias or device id announced itself
    #[error("peer '{0}' not found on the network")]
    PeerNotFound(String),

    /// File not found
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
