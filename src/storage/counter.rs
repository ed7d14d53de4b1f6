//! Fast, approximate per-post view counter
//!
//! Counts live in a [`KeyValueStore`] as decimal strings. An increment is a
//! plain read-modify-write with no compare-and-swap: two concurrent increments
//! of the same post can both read the same base value, and one of them is
//! lost. Stronger consistency needs an atomic increment on the store itself.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::storage::KeyValueStore;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("stored count for '{post}' is not a number: {value:?}")]
    Corrupt { post: String, value: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Counter value before and after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterUpdate {
    pub previous: u64,
    pub current: u64,
}

#[derive(Clone)]
pub struct CounterStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CounterStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// `None` if the post has never been counted.
    pub async fn get(&self, post: &str) -> Result<Option<u64>, CounterError> {
        match self.kv.get(post).await? {
            Some(raw) => parse_count(post, raw).map(Some),
            None => Ok(None),
        }
    }

    pub async fn increment(&self, post: &str) -> Result<CounterUpdate, CounterError> {
        let previous = self.get(post).await?.unwrap_or(0);
        let current = previous + 1;
        self.kv.put(post, &current.to_string()).await?;

        debug!(post = %post, previous, current, "incremented view counter");
        Ok(CounterUpdate { previous, current })
    }
}

fn parse_count(post: &str, raw: String) -> Result<u64, CounterError> {
    raw.trim().parse::<u64>().map_err(|_| CounterError::Corrupt {
        post: post.to_string(),
        value: raw,
    })
}
