//! # uplift-ingest
//!
//! Staging-to-normalized pipeline for CSV survey/attendance/donation
//! exports. Raw rows land in `staging_raw_rows` untouched, then a
//! normalization run resolves them into the canonical tables by natural
//! key, records an audit trail for dropped/partial rows, and archives the
//! batch.
//!
//! The upload transport (HTTP, multipart parsing) is not part of this
//! crate; callers hand over already-parsed row mappings.

pub mod audit;
pub mod db;
pub mod normalize;
pub mod pipeline;
pub mod staging;

pub use pipeline::{run_normalization, RunSummary};
pub use staging::{load_staging_rows, StagedRow};
