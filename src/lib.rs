// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod bias;
pub mod canonical;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod history;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod score;
pub mod select;

// ---- Re-exports for stable public API ----
pub use crate::config::{CuratorConfig, RunOptions};
pub use crate::error::{CurateError, FetchError};
pub use crate::fetch::{Fetcher, HttpFetcher, StaticFetcher};
pub use crate::pipeline::{run, run_at, RunReport};
