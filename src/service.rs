//! Read and write paths for post view counts
//!
//! Reads return the durable total. When analytics is configured, the trailing
//! 24h pageload count is folded into that total at most once per calendar day
//! (the first read of a post on a new day). Writes bump the fast counter once
//! per visitor, using the `visited` cookie to recognise repeat views.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsError, AnalyticsSource};
use crate::cookie::{self, CookieError};
use crate::models::{PostId, PostPath, ViewRecord};
use crate::storage::{CounterError, CounterStore, CounterUpdate, ViewRecordStore};

pub const ALREADY_VISITED_MESSAGE: &str = "Visited previously, returning...";

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("missing post identifier")]
    MissingPost,
    #[error(transparent)]
    Cookie(#[from] CookieError),
    #[error(transparent)]
    Counter(#[from] CounterError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub post: PostId,
    /// Durable total, including today's reconciliation if it succeeded
    pub total_views: i64,
    /// Trailing-window count, `None` when analytics is not configured
    pub recent_views: Option<u64>,
    pub reconciled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    AlreadyVisited,
    Recorded {
        update: CounterUpdate,
        /// Value for the `Set-Cookie` response header
        set_cookie: String,
    },
}

impl WriteOutcome {
    pub fn message(&self) -> String {
        match self {
            WriteOutcome::AlreadyVisited => ALREADY_VISITED_MESSAGE.to_string(),
            WriteOutcome::Recorded { update, .. } => format!(
                "Updated count to {} (was {})",
                update.current, update.previous
            ),
        }
    }
}

pub struct ViewCountService {
    counter: CounterStore,
    records: Arc<dyn ViewRecordStore>,
    analytics: Option<Arc<dyn AnalyticsSource>>,
    reconcile_enabled: bool,
}

impl ViewCountService {
    pub fn new(
        counter: CounterStore,
        records: Arc<dyn ViewRecordStore>,
        analytics: Option<Arc<dyn AnalyticsSource>>,
        reconcile_enabled: bool,
    ) -> Self {
        Self {
            counter,
            records,
            analytics,
            reconcile_enabled,
        }
    }

    pub async fn read_views(&self, path: &PostPath) -> Result<ReadOutcome, ViewError> {
        let post = path.post_id();
        let analytics_path = path.analytics_path();

        let recent = async {
            match &self.analytics {
                Some(source) => source.count_recent_views(&analytics_path).await.map(Some),
                None => Ok(None),
            }
        };
        let (recent, record) = tokio::join!(recent, self.records.get_record(post.as_str()));

        // An upstream analytics failure takes priority over the store result
        let recent_views = recent.inspect_err(|e| {
            warn!(post = %post, path = %analytics_path, error = %e, "analytics lookup failed");
        })?;
        let record = record.map_err(ViewError::Storage)?;

        let today = Utc::now().date_naive();
        let total_views = record.as_ref().map(|r| r.total_views).unwrap_or(0);
        let mut outcome = ReadOutcome {
            post: post.clone(),
            total_views,
            recent_views,
            reconciled: false,
        };

        if let Some(recent) = recent_views {
            if self.reconcile_enabled && needs_reconcile(record.as_ref(), today) {
                let reconciled_total =
                    total_views.saturating_add(i64::try_from(recent).unwrap_or(i64::MAX));

                if self.records.upsert(post.as_str(), reconciled_total, today).await {
                    info!(
                        post = %post,
                        previous = total_views,
                        recent,
                        total = reconciled_total,
                        "reconciled durable view total"
                    );
                    outcome.total_views = reconciled_total;
                    outcome.reconciled = true;
                } else {
                    warn!(post = %post, "reconciliation write failed, serving stored total");
                }
            }
        }

        debug!(post = %post, total = outcome.total_views, ?recent_views, "read view count");
        Ok(outcome)
    }

    pub async fn record_view(
        &self,
        path: &PostPath,
        cookie_header: Option<&str>,
    ) -> Result<WriteOutcome, ViewError> {
        let post = path.post_id();

        let visited = match cookie::parse(cookie_header)? {
            Some(jar) => jar.visited()?,
            None => None,
        };

        if visited.as_ref().is_some_and(|v| v.contains(&post)) {
            debug!(post = %post, "visitor already counted");
            return Ok(WriteOutcome::AlreadyVisited);
        }

        let mut visited = visited.unwrap_or_default();
        visited.insert(post.clone());
        let set_cookie = cookie::build_set_cookie_header(&visited);

        let update = self.counter.increment(post.as_str()).await?;
        info!(post = %post, count = update.current, "recorded view");

        Ok(WriteOutcome::Recorded { update, set_cookie })
    }
}

/// A post is reconciled once per calendar day.
fn needs_reconcile(record: Option<&ViewRecord>, today: NaiveDate) -> bool {
    match record.map(ViewRecord::last_updated_date) {
        None => true,
        Some(Some(last)) => last < today,
        // unreadable date, rewrite it
        Some(None) => true,
    }
}
