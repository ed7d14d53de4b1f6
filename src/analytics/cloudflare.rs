use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use super::models::{GraphQlRequest, GraphQlResponse};
use super::{AnalyticsError, AnalyticsSource};
use crate::config::{AnalyticsConfig, AnalyticsCredentials};

/// Cloudflare GraphQL client for RUM pageload counts
#[derive(Clone)]
pub struct CloudflareAnalytics {
    endpoint: String,
    account_tag: String,
    credentials: AnalyticsCredentials,
    client: Client,
}

impl CloudflareAnalytics {
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("viewcount-analytics/0.1.0")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client for Cloudflare analytics")?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            account_tag: config.account_tag.clone(),
            credentials: config.credentials.clone(),
            client,
        })
    }
}

#[async_trait]
impl AnalyticsSource for CloudflareAnalytics {
    async fn count_recent_views(&self, path: &str) -> Result<u64, AnalyticsError> {
        let body = GraphQlRequest::recent_views(&self.account_tag, path, Utc::now());

        let request = self.client.post(&self.endpoint).json(&body);
        let request = match &self.credentials {
            AnalyticsCredentials::ApiToken(token) => request.bearer_auth(token),
            AnalyticsCredentials::GlobalKey { email, key } => request
                .header("X-AUTH-EMAIL", email)
                .header("X-AUTH-KEY", key),
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Cloudflare reports most failures as an error list with a 200 status,
        // so prefer the decoded errors over the bare status code.
        let parsed = match serde_json::from_str::<GraphQlResponse>(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => return Err(AnalyticsError::Status(status.as_u16())),
            Err(e) => return Err(e.into()),
        };

        let has_errors = parsed.errors.as_ref().is_some_and(|e| !e.is_empty());
        if !status.is_success() && !has_errors {
            return Err(AnalyticsError::Status(status.as_u16()));
        }

        let count = parsed.into_count()?;
        debug!(path = %path, count, "fetched recent pageload count");
        Ok(count)
    }
}
