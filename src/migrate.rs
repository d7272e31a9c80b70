use crate::config::Config;
use crate::db;
use crate::error::PipelineError;

pub async fn run_migrations(config: &Config) -> Result<(), PipelineError> {
    let pool = db::connect(config).await?;

    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            natural_id TEXT NOT NULL,
            group_key TEXT,
            metric REAL,
            quality_score REAL NOT NULL,
            ingested_at INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            doc_json TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Indexes are also ensured by the loader before every batch
    crate::load::ensure_indexes(&pool).await?;

    pool.close().await;
    Ok(())
}
