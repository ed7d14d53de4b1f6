use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::cookie;
use crate::models::PostPath;
use crate::service::{ViewCountService, ViewError, WriteOutcome};

pub const RECENT_VIEWS_HEADER: &str = "x-viewcount-recent-views";
pub const RECONCILED_HEADER: &str = "x-viewcount-reconciled";

pub struct AppState {
    pub service: Arc<ViewCountService>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let status = match &self {
            ViewError::MissingPost => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(status = %status, error = %self, "view request failed");

        (status, self.to_string()).into_response()
    }
}

fn resolve_path(raw: &str) -> Result<PostPath, ViewError> {
    PostPath::parse(raw).ok_or(ViewError::MissingPost)
}

/// Current durable view total for a post
pub async fn get_views(
    State(state): State<Arc<AppState>>,
    Path(raw_path): Path<String>,
) -> Result<Response, ViewError> {
    let path = resolve_path(&raw_path)?;
    let outcome = state.service.read_views(&path).await?;

    let mut headers = HeaderMap::new();
    if let Some(recent) = outcome.recent_views {
        headers.insert(RECENT_VIEWS_HEADER, HeaderValue::from(recent));
    }
    headers.insert(
        RECONCILED_HEADER,
        HeaderValue::from_static(if outcome.reconciled { "true" } else { "false" }),
    );

    Ok((StatusCode::OK, headers, outcome.total_views.to_string()).into_response())
}

/// Count one view for the requesting visitor
pub async fn record_view(
    State(state): State<Arc<AppState>>,
    Path(raw_path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ViewError> {
    let path = resolve_path(&raw_path)?;

    // HTTP/2 clients may split cookies over several headers. Values are not
    // guaranteed to be ASCII, so decode the raw bytes rather than `to_str`.
    let cookies = headers
        .get_all(header::COOKIE)
        .iter()
        .map(|v| cookie::decode_header(v.as_bytes()))
        .collect::<Result<Vec<&str>, _>>()?;
    let cookie_header = (!cookies.is_empty()).then(|| cookies.join("; "));

    let outcome = state
        .service
        .record_view(&path, cookie_header.as_deref())
        .await?;
    let message = outcome.message();

    let response = match outcome {
        WriteOutcome::AlreadyVisited => (StatusCode::OK, message).into_response(),
        WriteOutcome::Recorded { set_cookie, .. } => (
            StatusCode::OK,
            [(header::SET_COOKIE, set_cookie)],
            message,
        )
            .into_response(),
    };

    Ok(response)
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
