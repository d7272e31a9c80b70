//! # Siphon
//!
//! A connector-driven ETL pipeline for pulling JSON HTTP APIs into SQLite.
//!
//! Siphon periodically pulls paginated records from remote JSON APIs,
//! normalizes and enriches each record with derived fields and a data-quality
//! score, then idempotently upserts the result into a SQLite document store
//! keyed by a natural business identifier (post id, CVE id).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │ Connectors  │──▶│        Pipeline          │──▶│  SQLite  │
//! │ posts / nvd │   │ extract→transform→load   │   │documents │
//! └─────────────┘   └──────────────────────────┘   └────┬─────┘
//!                                                       │
//!                                                       ▼
//!                                                 ┌──────────┐
//!                                                 │   CLI    │
//!                                                 │ (siphon) │
//!                                                 └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! siphon init                   # create database
//! siphon run posts              # pull posts into the store
//! siphon run nvd --dry-run      # extract + transform CVEs, no writes
//! siphon stats --source posts   # aggregate view of the collection
//! siphon sources                # list configured connectors
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Canonical document and report types |
//! | [`quality`] | Data-quality (completeness) scoring |
//! | [`extract`] | HTTP transport capability, pagination, rate-limit backoff |
//! | [`connector`] | Connector trait and resolution |
//! | [`connector_posts`] | Posts (JSONPlaceholder-style) connector |
//! | [`connector_nvd`] | CVE (NVD-style) connector |
//! | [`load`] | Idempotent upsert loader |
//! | [`pipeline`] | Stage machine orchestration |
//! | [`stats`] | Collection statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod connector;
pub mod connector_nvd;
pub mod connector_posts;
pub mod db;
pub mod error;
pub mod extract;
pub mod load;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod quality;
pub mod sources;
pub mod stats;
