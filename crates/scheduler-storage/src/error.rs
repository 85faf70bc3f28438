use thiserror::Error;

/// Storage-layer failures. Domain services consume these only through the
/// `anyhow::Result` returned by `Store`; this type exists so SQL and
/// migration failures keep their own variant instead of collapsing into a
/// string.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
