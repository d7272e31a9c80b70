//! Pipeline statistics.
//!
//! A read-only aggregate view over the stored collection: counts, distinct
//! group cardinality, latest ingestion timestamp, and the average of the
//! per-source numeric field (content length for posts, CVSS score for CVEs).
//! Always recomputed from the collection; never stored.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::error::PipelineError;
use crate::models::PipelineStats;

/// Compute stats for one source's slice of the collection.
pub async fn collect_stats(
    pool: &SqlitePool,
    source: &str,
) -> Result<PipelineStats, PipelineError> {
    let total_records: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE source = ?")
            .bind(source)
            .fetch_one(pool)
            .await?;

    let distinct_groups: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT group_key) FROM documents WHERE source = ? AND group_key IS NOT NULL",
    )
    .bind(source)
    .fetch_one(pool)
    .await?;

    let latest_ts: Option<i64> =
        sqlx::query_scalar("SELECT MAX(ingested_at) FROM documents WHERE source = ?")
            .bind(source)
            .fetch_one(pool)
            .await?;

    let avg_metric: Option<f64> = sqlx::query_scalar(
        "SELECT AVG(metric) FROM documents WHERE source = ? AND metric IS NOT NULL",
    )
    .bind(source)
    .fetch_one(pool)
    .await?;

    Ok(PipelineStats {
        total_records,
        distinct_groups,
        latest_ingestion: latest_ts.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        avg_metric,
    })
}

/// Run the stats command: query the collection and print a summary.
pub async fn run_stats(config: &Config, source: &str) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool, source).await?;
    print_stats(source, &stats);
    pool.close().await;
    Ok(())
}

pub fn print_stats(source: &str, stats: &PipelineStats) {
    println!("stats {}", source);
    println!("  total records:    {}", stats.total_records);
    println!("  distinct groups:  {}", stats.distinct_groups);
    println!(
        "  latest ingestion: {}",
        stats
            .latest_ingestion
            .map(format_ts)
            .unwrap_or_else(|| "never".to_string())
    );
    println!(
        "  average metric:   {}",
        stats
            .avg_metric
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "n/a".to_string())
    );
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
