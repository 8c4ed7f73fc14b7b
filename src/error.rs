//! Error types for the chat server
//!
//! Defines application-level errors and per-recipient send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// These end a connection or stop the process. Protocol mistakes made by a
/// client are never errors; they are answered with a notice instead.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (bind, accept or transport)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Port argument could not be parsed
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Connection writer task panicked or was cancelled
    #[error("Writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Message send errors
///
/// Occurs when the recipient's writer has gone away. Never retried.
#[derive(Debug, Error)]
pub enum SendError {
    /// The recipient's transport has been closed
    #[error("Transport closed")]
    TransportClosed,
}
