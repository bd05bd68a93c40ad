//! Error types for SyncKit collaboration

use crate::text::TextError;
use thiserror::Error;

/// Result type alias for collaboration operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Crate-level error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// The shared text refused an operation inside a transaction.
    ///
    /// Nothing from the transaction was applied; the caller decides whether to retry.
    #[error("Transaction rejected: {0}")]
    TransactionRejected(#[from] TextError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
