use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::config::CorsConfig;
use crate::service::ViewCountService;

use super::handlers::{get_views, health_check, record_view, AppState};

pub fn create_api_router(service: Arc<ViewCountService>, cors: &CorsConfig) -> Router {
    let state = Arc::new(AppState { service });

    let views = Router::new()
        .route("/api/views/{*path}", get(get_views).put(record_view))
        .with_state(state);

    let router = Router::new().route("/health", get(health_check)).merge(views);

    match cors_layer(cors) {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// Browsers only send the `visited` cookie cross-origin when credentials are
/// allowed, which in turn requires an explicit origin list.
fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::PUT])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}
