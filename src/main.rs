use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use viewcount::analytics::{AnalyticsSource, CloudflareAnalytics};
use viewcount::api;
use viewcount::config::{Config, CounterBackend, DatabaseBackend};
use viewcount::service::ViewCountService;
use viewcount::storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    match config.database.backend {
        DatabaseBackend::Sqlite => info!("Using SQLite view store: {}", config.database.url),
        DatabaseBackend::Postgres => info!("Using PostgreSQL view store"),
    }
    let records = storage::connect_view_store(&config.database).await?;
    info!("View store initialized successfully");

    match config.counter.backend {
        CounterBackend::Memory => info!("Using in-memory view counter"),
        CounterBackend::Sqlite => info!("Using SQLite view counter: {}", config.counter.url),
    }
    let counter = storage::connect_counter(&config.counter).await?;

    // Initialize analytics
    let analytics: Option<Arc<dyn AnalyticsSource>> = match config.analytics.as_ref() {
        Some(analytics_config) => {
            info!(
                "📈 Analytics enabled (endpoint: {}, reconcile: {})",
                analytics_config.endpoint, config.reconcile_enabled
            );
            let source: Arc<dyn AnalyticsSource> =
                Arc::new(CloudflareAnalytics::from_config(analytics_config)?);
            Some(source)
        }
        None => {
            info!("Analytics disabled - CF_ACCOUNT_TAG not set, serving stored totals only");
            None
        }
    };

    let service = Arc::new(ViewCountService::new(
        counter,
        records,
        analytics,
        config.reconcile_enabled,
    ));

    let router = api::create_api_router(service, &config.cors);

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 View count API listening on http://{}", addr);
    info!("   - endpoints available at http://{}/api/views/...", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
