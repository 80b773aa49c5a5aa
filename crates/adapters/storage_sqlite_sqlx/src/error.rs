//! Storage-specific error type wrapping sqlx errors.

use signage_domain::error::SignageError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored timestamp could not be read back.
    #[error("invalid stored timestamp {0:?}")]
    Timestamp(String),
}

impl From<StorageError> for SignageError {
    fn from(err: StorageError) -> Self {
        Self::StorageUnavailable(Box::new(err))
    }
}
