// src/ingest/providers/mod.rs
pub mod feed;
pub mod trending;

pub use feed::FeedProvider;
pub use trending::TrendingProvider;
