use thiserror::Error;

/// Errors raised by a `DurationStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Underlying PostgreSQL / sqlx error.
    #[error("Postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A thread panicked while holding the connection lock.
    #[error("Store connection lock poisoned")]
    Poisoned,

    /// The value does not fit the backend's integer column.
    #[error("Value out of range: {0}")]
    OutOfRange(u64),

    /// Creating the database directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
