//! Core data types that flow through the extract → transform → load pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Version tag stamped into every document's `etl_metadata`.
pub const SCHEMA_VERSION: &str = "1.0";

/// ETL provenance block attached to every canonical document.
#[derive(Debug, Clone, Serialize)]
pub struct EtlMetadata {
    pub ingested_at: DateTime<Utc>,
    pub source: String,
    pub schema_version: String,
    pub record_id: String,
    pub quality_score: f64,
}

/// The unit stored in the document store: one raw record, normalized.
///
/// `natural_id` is the idempotency key; repeated loads of the same id fully
/// replace the stored document (never merge). `fields` holds the flattened
/// source-specific derivations, `original` the untouched raw record as an
/// audit copy.
#[derive(Debug, Clone)]
pub struct CanonicalDocument {
    pub natural_id: String,
    pub source: String,
    /// Secondary categorical field for grouping (owning user, severity).
    pub group_key: Option<String>,
    /// Numeric field averaged in pipeline stats (content length, CVSS score).
    pub metric: Option<f64>,
    pub fields: serde_json::Value,
    pub metadata: EtlMetadata,
    pub original: serde_json::Value,
}

impl CanonicalDocument {
    /// Content hash used by the loader to tell a real update from a no-op
    /// replacement. Excludes the ingestion timestamp so a re-run over
    /// unchanged upstream data counts as neither inserted nor updated.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hasher.update(self.natural_id.as_bytes());
        hasher.update(self.fields.to_string().as_bytes());
        hasher.update(self.original.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Full stored shape: flattened fields at the top level plus the
    /// `etl_metadata` and `original_data` blocks.
    pub fn to_stored_json(&self) -> serde_json::Value {
        let mut doc = match &self.fields {
            serde_json::Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("fields".to_string(), other.clone());
                map
            }
        };
        doc.insert(
            "etl_metadata".to_string(),
            serde_json::json!({
                "ingestion_timestamp": self.metadata.ingested_at.to_rfc3339(),
                "source": self.metadata.source,
                "version": self.metadata.schema_version,
                "record_id": self.metadata.record_id,
                "data_quality_score": self.metadata.quality_score,
            }),
        );
        doc.insert("original_data".to_string(), self.original.clone());
        serde_json::Value::Object(doc)
    }
}

/// Per-record transform result. Skips carry a reason so batch callers can
/// log and count them without exception-driven control flow.
#[derive(Debug)]
pub enum TransformOutcome {
    Document(Box<CanonicalDocument>),
    Skip { reason: String },
}

/// Counts returned by the loader for one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub failed: u64,
}

/// Read-only aggregate view over the stored collection. Always recomputable;
/// never stored.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub total_records: i64,
    pub distinct_groups: i64,
    pub latest_ingestion: Option<DateTime<Utc>>,
    pub avg_metric: Option<f64>,
}
