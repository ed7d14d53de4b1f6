//! Recent page-view counts from an external analytics service
//!
//! The read path asks the analytics upstream how many real (non-bot) pageloads
//! a post received over the trailing 24 hours. That count is only ever used to
//! reconcile the durable total; it is never persisted by itself.

pub mod cloudflare;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use cloudflare::CloudflareAnalytics;

/// Length of the trailing window counted by [`AnalyticsSource`]
pub const RECENT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The upstream answered with its own error list. Never treated as zero.
    #[error("{0}")]
    Upstream(String),
    #[error("analytics request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analytics upstream returned status {0}")]
    Status(u16),
    #[error("malformed analytics response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Pageload events for `path` over the last [`RECENT_WINDOW_HOURS`] hours,
    /// bots excluded. `path` must match the recorded request path exactly.
    async fn count_recent_views(&self, path: &str) -> Result<u64, AnalyticsError>;
}
