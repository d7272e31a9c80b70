//! The connector seam: one implementation per upstream source.
//!
//! A connector owns the two source-specific halves of the pipeline — how to
//! page through the remote API (extract) and how to map one raw record into
//! a canonical document (transform). Everything around it (orchestration,
//! loading, stats) is shared.

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::Config;
use crate::connector_nvd::NvdConnector;
use crate::connector_posts::PostsConnector;
use crate::extract::ApiTransport;
use crate::models::TransformOutcome;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Source tag stored on every document (e.g. `"posts"`, `"nvd"`).
    fn name(&self) -> &str;

    /// One-line description for `siphon sources` output.
    fn description(&self) -> &str;

    /// API base URL this connector pulls from.
    fn base_url(&self) -> &str;

    /// Pull one flat batch of raw records. Never fails the pipeline: on
    /// transport or decode errors this returns what was collected so far.
    async fn extract(&self, transport: &dyn ApiTransport) -> Vec<Value>;

    /// Map one raw record into a canonical document, or a skip-with-reason.
    /// `ingested_at` is fixed once per batch so all documents from one run
    /// share the same ingestion timestamp.
    fn transform(&self, raw: &Value, ingested_at: DateTime<Utc>) -> TransformOutcome;
}

/// Resolve a connector by name from the config.
pub fn resolve(config: &Config, name: &str) -> anyhow::Result<Box<dyn Connector>> {
    match name {
        "posts" => Ok(Box::new(PostsConnector::new(
            config.connectors.posts.clone(),
        ))),
        "nvd" => Ok(Box::new(NvdConnector::new(config.connectors.nvd.clone()))),
        _ => bail!("Unknown connector: '{}'. Available: posts, nvd", name),
    }
}

/// All connectors, in `siphon sources` display order.
pub fn all(config: &Config) -> Vec<Box<dyn Connector>> {
    vec![
        Box::new(PostsConnector::new(config.connectors.posts.clone())),
        Box::new(NvdConnector::new(config.connectors.nvd.clone())),
    ]
}
