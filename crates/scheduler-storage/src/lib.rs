pub mod error;
pub mod rows;
pub mod store;

#[cfg(test)]
mod store_tests;

pub use error::{Result, StorageError};
pub use store::SqliteStore;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;

/// Open (creating if absent) the scheduler's sqlite database and run
/// pending migrations.
pub async fn init_store_db(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_path)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!(db_path, "scheduler store initialized");

    Ok(pool)
}
