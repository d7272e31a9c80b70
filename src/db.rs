use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::error::PipelineError;

pub async fn connect(config: &Config) -> Result<SqlitePool, PipelineError> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| PipelineError::Connection(e.to_string()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(|e| PipelineError::Connection(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| PipelineError::Connection(e.to_string()))?;

    Ok(pool)
}

/// Round-trip query confirming the store actually answers, not just that a
/// pool object exists.
pub async fn ping(pool: &SqlitePool) -> Result<(), PipelineError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| PipelineError::Connection(e.to_string()))?;
    Ok(())
}
