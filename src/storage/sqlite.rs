use crate::models::ViewRecord;
use crate::storage::ViewRecordStore;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteViewStore {
    pool: Arc<SqlitePool>,
}

impl SqliteViewStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn try_upsert(&self, post: &str, total_views: i64, today: NaiveDate) -> Result<()> {
        if total_views < 0 {
            bail!("total views must not be negative, got {total_views}");
        }

        let last_updated = today.format("%Y-%m-%d").to_string();
        sqlx::query(
            r#"
            INSERT INTO "Page_Views" (post, "totalViews", "lastUpdated")
            VALUES (?, ?, ?)
            ON CONFLICT (post) DO UPDATE SET
                "totalViews" = excluded."totalViews",
                "lastUpdated" = excluded."lastUpdated"
            "#,
        )
        .bind(post)
        .bind(total_views)
        .bind(last_updated)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ViewRecordStore for SqliteViewStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS "Page_Views" (
                post TEXT PRIMARY KEY,
                "totalViews" INTEGER NOT NULL DEFAULT 0,
                "lastUpdated" TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_record(&self, post: &str) -> Result<Option<ViewRecord>> {
        let record = sqlx::query_as::<_, ViewRecord>(
            r#"
            SELECT post, "totalViews", "lastUpdated"
            FROM "Page_Views"
            WHERE post = ?
            "#,
        )
        .bind(post)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn upsert(&self, post: &str, total_views: i64, today: NaiveDate) -> bool {
        match self.try_upsert(post, total_views, today).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(post = %post, error = %e, "failed to upsert view record");
                false
            }
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ViewRecord>> {
        let records = sqlx::query_as::<_, ViewRecord>(
            r#"
            SELECT post, "totalViews", "lastUpdated"
            FROM "Page_Views"
            ORDER BY "totalViews" DESC, post ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(records)
    }
}
