pub mod counter;
pub mod kv;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use counter::{CounterError, CounterStore, CounterUpdate};
pub use kv::{MemoryKeyValueStore, SqliteKeyValueStore};
pub use postgres::PostgresViewStore;
pub use sqlite::SqliteViewStore;
pub use trait_def::{KeyValueStore, ViewRecordStore};

use crate::config::{CounterBackend, CounterConfig, DatabaseBackend, DatabaseConfig};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Open and initialize the configured durable store
pub async fn connect_view_store(config: &DatabaseConfig) -> Result<Arc<dyn ViewRecordStore>> {
    let store: Arc<dyn ViewRecordStore> = match config.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteViewStore::new(&config.url, config.max_connections)
                .await
                .context("failed to open SQLite view store")?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresViewStore::new(&config.url, config.max_connections)
                .await
                .context("failed to open PostgreSQL view store")?,
        ),
    };
    store.init().await?;
    Ok(store)
}

/// Open the configured key-value backend for the fast counter
pub async fn connect_counter(config: &CounterConfig) -> Result<CounterStore> {
    let kv: Arc<dyn KeyValueStore> = match config.backend {
        CounterBackend::Memory => Arc::new(MemoryKeyValueStore::new()),
        CounterBackend::Sqlite => {
            let store = SqliteKeyValueStore::new(&config.url, 5)
                .await
                .context("failed to open SQLite counter store")?;
            store.init().await?;
            Arc::new(store)
        }
    };
    Ok(CounterStore::new(kv))
}
