use crate::models::ViewRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Durable, authoritative per-post totals.
#[async_trait]
pub trait ViewRecordStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Fetch the full row for a post
    async fn get_record(&self, post: &str) -> Result<Option<ViewRecord>>;

    /// Point lookup of the stored total. `None` means no row exists.
    async fn query_total(&self, post: &str) -> Result<Option<i64>> {
        Ok(self.get_record(post).await?.map(|r| r.total_views))
    }

    /// Insert the row if absent, otherwise overwrite `totalViews` and
    /// `lastUpdated`. Failures are logged and reported as `false`.
    async fn upsert(&self, post: &str, total_views: i64, today: NaiveDate) -> bool;

    /// List rows ordered by total views, highest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ViewRecord>>;
}

/// Plain string key-value collaborator backing the fast counter.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;
}
