//! Pipeline orchestration.
//!
//! One run walks the stage machine
//! `Idle → Connecting → Extracting → Transforming → Loading → Completed`,
//! strictly sequential, short-circuiting to `Failed` when a stage errors or
//! produces nothing. Stats are computed after a successful load as a read
//! query; a stats failure is logged but does not fail a completed run. The
//! store pool is released on every exit path, after stats, so diagnostics
//! stay available until the very end.

use chrono::Utc;
use sqlx::SqlitePool;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::connector::Connector;
use crate::db;
use crate::error::PipelineError;
use crate::extract::ApiTransport;
use crate::load;
use crate::models::{CanonicalDocument, LoadReport, PipelineStats, TransformOutcome};
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Connecting,
    Extracting,
    Transforming,
    Loading,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Connecting => "connecting",
            Stage::Extracting => "extracting",
            Stage::Transforming => "transforming",
            Stage::Loading => "loading",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Cap on the number of extracted records processed this run.
    pub limit: Option<usize>,
    /// Extract and transform only; report counts without touching the store.
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub extracted: usize,
    pub transformed: usize,
    pub skipped: usize,
    pub report: LoadReport,
    pub stats: Option<PipelineStats>,
    pub elapsed: Duration,
    pub dry_run: bool,
}

/// Execute one full pipeline run for one connector.
pub async fn run(
    config: &Config,
    connector: &dyn Connector,
    transport: &dyn ApiTransport,
    opts: &RunOptions,
) -> Result<RunOutcome, PipelineError> {
    let started = Instant::now();

    enter(Stage::Connecting, connector.name());
    let pool = match db::connect(config).await {
        Ok(pool) => pool,
        Err(e) => return Err(fail(Stage::Connecting, connector.name(), e)),
    };

    let result = run_stages(&pool, connector, transport, opts, started).await;

    // Release the pool exactly once, after stats, on every exit path.
    pool.close().await;
    result
}

async fn run_stages(
    pool: &SqlitePool,
    connector: &dyn Connector,
    transport: &dyn ApiTransport,
    opts: &RunOptions,
    started: Instant,
) -> Result<RunOutcome, PipelineError> {
    if let Err(e) = db::ping(pool).await {
        return Err(fail(Stage::Connecting, connector.name(), e));
    }

    enter(Stage::Extracting, connector.name());
    let mut raw_records = connector.extract(transport).await;
    if let Some(limit) = opts.limit {
        raw_records.truncate(limit);
    }
    let extracted = raw_records.len();
    if extracted == 0 {
        return Err(fail(
            Stage::Extracting,
            connector.name(),
            PipelineError::Transport("extraction produced no records".to_string()),
        ));
    }

    enter(Stage::Transforming, connector.name());
    // One timestamp per batch, like the source APIs are snapshotted at a
    // single instant.
    let ingested_at = Utc::now();
    let mut documents: Vec<CanonicalDocument> = Vec::with_capacity(extracted);
    let mut skipped = 0usize;
    for raw in &raw_records {
        match connector.transform(raw, ingested_at) {
            TransformOutcome::Document(doc) => documents.push(*doc),
            TransformOutcome::Skip { reason } => {
                warn!(source = connector.name(), %reason, "skipping record");
                skipped += 1;
            }
        }
    }
    let transformed = documents.len();
    if transformed == 0 {
        return Err(fail(
            Stage::Transforming,
            connector.name(),
            PipelineError::Transform(format!("all {} records failed to transform", extracted)),
        ));
    }

    if opts.dry_run {
        info!(
            source = connector.name(),
            extracted, transformed, skipped, "dry run, skipping load"
        );
        return Ok(RunOutcome {
            extracted,
            transformed,
            skipped,
            report: LoadReport::default(),
            stats: None,
            elapsed: started.elapsed(),
            dry_run: true,
        });
    }

    enter(Stage::Loading, connector.name());
    let report = match load::load(pool, &documents).await {
        Ok(report) => report,
        Err(e) => return Err(fail(Stage::Loading, connector.name(), e)),
    };
    if report.failed as usize == documents.len() {
        return Err(fail(
            Stage::Loading,
            connector.name(),
            PipelineError::Load("every document in the batch failed to persist".to_string()),
        ));
    }

    enter(Stage::Completed, connector.name());
    let run_stats = match stats::collect_stats(pool, connector.name()).await {
        Ok(s) => Some(s),
        Err(e) => {
            // Stats are diagnostics; a completed run stays completed.
            warn!(source = connector.name(), error = %e, "stats collection failed");
            None
        }
    };

    info!(
        source = connector.name(),
        extracted,
        transformed,
        skipped,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline run completed"
    );

    Ok(RunOutcome {
        extracted,
        transformed,
        skipped,
        report,
        stats: run_stats,
        elapsed: started.elapsed(),
        dry_run: false,
    })
}

fn enter(stage: Stage, source: &str) {
    info!(source, stage = %stage, "entering stage");
}

fn fail(stage: Stage, source: &str, error: PipelineError) -> PipelineError {
    tracing::error!(source, stage = %stage, %error, "pipeline failed");
    error
}
