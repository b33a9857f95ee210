//! Error types shared across the mediasync crates.
//!
//! Expected failure modes (transient upload errors, per-variant transcode
//! failures) are represented as values by the crates that own them; this enum
//! covers the cross-cutting cases that reach the worker boundary.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether retrying the operation later can reasonably succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Io(_))
    }
}
