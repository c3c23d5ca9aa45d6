use thiserror::Error;

/// Errors that can occur when interacting with a recipe store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique index rejected the write.
    #[error("Duplicate value for {field}: {value}")]
    DuplicateKey { field: &'static str, value: String },

    /// The store refused the operation (used by fault injection and
    /// connection-level failures that carry no database error).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
