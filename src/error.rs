// src/error.rs
//! Closed set of failure kinds. Each one is handled at a known boundary:
//! fetch/parse errors degrade a single source, validation errors drop a single
//! candidate, persistence errors on the state file fall back to empty state,
//! and only `Setup` aborts a run.

use std::path::PathBuf;

/// Transport-level failure for one outbound call.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid url `{url}`")]
    InvalidUrl { url: String },

    #[error("http error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("timed out after {secs}s: {url}")]
    Timeout { url: String, secs: u64 },

    #[error("no canned response for {url}")]
    NotFound { url: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CurateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed payload from {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("state file {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid candidate: {0}")]
    Validation(String),

    #[error("cannot prepare {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CurateError {
    pub fn parse(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    /// Only setup failures terminate a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Setup { .. })
    }
}

pub type Result<T> = std::result::Result<T, CurateError>;
