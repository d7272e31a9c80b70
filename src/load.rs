//! Idempotent loader.
//!
//! Upserts canonical documents keyed by `(source, natural_id)` with full
//! overwrite semantics. Each document is classified against the stored
//! content hash: inserted (no prior row), updated (hash changed), or
//! unchanged (identical content — the write is skipped entirely). One
//! document failing to persist does not abort the batch.

use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{CanonicalDocument, LoadReport};

/// Create the three query indexes if they do not exist yet. Safe to call
/// before every batch.
pub async fn ensure_indexes(pool: &SqlitePool) -> Result<(), PipelineError> {
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_natural_id ON documents(source, natural_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_ingested_at ON documents(ingested_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_group_key ON documents(group_key)")
        .execute(pool)
        .await?;
    Ok(())
}

/// Load a batch. An empty batch is a trivial success.
pub async fn load(
    pool: &SqlitePool,
    documents: &[CanonicalDocument],
) -> Result<LoadReport, PipelineError> {
    ensure_indexes(pool).await?;

    let mut report = LoadReport::default();

    for doc in documents {
        match upsert_document(pool, doc).await {
            Ok(Outcome::Inserted) => report.inserted += 1,
            Ok(Outcome::Updated) => report.updated += 1,
            Ok(Outcome::Unchanged) => report.unchanged += 1,
            Err(e) => {
                warn!(
                    natural_id = %doc.natural_id,
                    source = %doc.source,
                    error = %e,
                    "failed to persist document, continuing"
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

enum Outcome {
    Inserted,
    Updated,
    Unchanged,
}

async fn upsert_document(
    pool: &SqlitePool,
    doc: &CanonicalDocument,
) -> Result<Outcome, PipelineError> {
    let content_hash = doc.content_hash();

    let existing: Option<(String, String)> = sqlx::query_as(
        "SELECT id, content_hash FROM documents WHERE source = ? AND natural_id = ?",
    )
    .bind(&doc.source)
    .bind(&doc.natural_id)
    .fetch_optional(pool)
    .await?;

    let doc_json = doc.to_stored_json().to_string();

    match existing {
        None => {
            sqlx::query(
                r#"
                INSERT INTO documents (id, source, natural_id, group_key, metric, quality_score, ingested_at, content_hash, doc_json)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&doc.source)
            .bind(&doc.natural_id)
            .bind(&doc.group_key)
            .bind(doc.metric)
            .bind(doc.metadata.quality_score)
            .bind(doc.metadata.ingested_at.timestamp())
            .bind(&content_hash)
            .bind(&doc_json)
            .execute(pool)
            .await?;
            Ok(Outcome::Inserted)
        }
        Some((_, existing_hash)) if existing_hash == content_hash => Ok(Outcome::Unchanged),
        Some((id, _)) => {
            // Full overwrite: every derived column is replaced, never merged.
            sqlx::query(
                r#"
                UPDATE documents
                SET group_key = ?, metric = ?, quality_score = ?, ingested_at = ?, content_hash = ?, doc_json = ?
                WHERE id = ?
                "#,
            )
            .bind(&doc.group_key)
            .bind(doc.metric)
            .bind(doc.metadata.quality_score)
            .bind(doc.metadata.ingested_at.timestamp())
            .bind(&content_hash)
            .bind(&doc_json)
            .bind(&id)
            .execute(pool)
            .await?;
            Ok(Outcome::Updated)
        }
    }
}
