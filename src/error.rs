//! Error taxonomy for the pipeline.
//!
//! Each variant maps to a recovery policy:
//! - [`Transport`](PipelineError::Transport) / [`Decode`](PipelineError::Decode)
//!   — the extractor recovers by returning whatever it has collected so far;
//!   an empty extraction then aborts the run at the Extracting stage.
//! - [`Transform`](PipelineError::Transform) — per-record; the record is
//!   skipped and the batch continues.
//! - [`Load`](PipelineError::Load) — per-document at the loader; a store that
//!   is unavailable outright surfaces as a stage-level failure.
//! - [`Connection`](PipelineError::Connection) — fatal before extraction.
//!
//! HTTP 429 is not an error. It is a flow-control signal handled inside the
//! extractor by backoff-and-retry, and never reaches this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network failure, timeout, or non-2xx status from the source API.
    #[error("transport error: {0}")]
    Transport(String),

    /// The source API returned a body that is not valid JSON.
    #[error("decode error: {0}")]
    Decode(String),

    /// A raw record broke a structural assumption (e.g. not a JSON object).
    #[error("transform error: {0}")]
    Transform(String),

    /// The document store rejected a write.
    #[error("load error: {0}")]
    Load(String),

    /// The document store was unreachable at startup.
    #[error("store connection error: {0}")]
    Connection(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Load(e.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PipelineError::Decode(e.to_string())
        } else {
            PipelineError::Transport(e.to_string())
        }
    }
}
