use thiserror::Error;

use crate::OrderId;

/// Errors that can occur when reading or writing tax records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No transaction has been registered for the order.
    #[error("No transaction registered for order {0}")]
    TransactionNotFound(OrderId),

    /// A stored row could not be mapped back into a record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
