use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::PostId;

/// Authoritative per-post row in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ViewRecord {
    pub post: String,
    #[sqlx(rename = "totalViews")]
    #[serde(rename = "totalViews")]
    pub total_views: i64,
    /// Calendar date formatted as `YYYY-MM-DD`
    #[sqlx(rename = "lastUpdated")]
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}

impl ViewRecord {
    /// `None` if the stored date is not a valid `YYYY-MM-DD` string.
    pub fn last_updated_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.last_updated, "%Y-%m-%d").ok()
    }
}

/// Posts a visitor has already been counted for, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VisitedSet {
    posts: Vec<PostId>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, post: &PostId) -> bool {
        self.posts.iter().any(|p| p == post)
    }

    /// Returns `false` if the post was already present.
    pub fn insert(&mut self, post: PostId) -> bool {
        if self.contains(&post) {
            return false;
        }
        self.posts.push(post);
        true
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostId> {
        self.posts.iter()
    }
}

impl FromIterator<PostId> for VisitedSet {
    fn from_iter<I: IntoIterator<Item = PostId>>(iter: I) -> Self {
        let mut set = VisitedSet::new();
        for post in iter {
            set.insert(post);
        }
        set
    }
}
