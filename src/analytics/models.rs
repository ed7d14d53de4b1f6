//! GraphQL wire types for the pageload analytics query

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AnalyticsError, RECENT_WINDOW_HOURS};

pub const RECENT_VIEWS_QUERY: &str = r#"query GetRecentPageloads($accountTag: string, $filter: AccountRumPageloadEventsAdaptiveGroupsFilter_InputObject) {
  viewer {
    accounts(filter: { accountTag: $accountTag }) {
      total: rumPageloadEventsAdaptiveGroups(filter: $filter, limit: 1) {
        count
      }
    }
  }
}"#;

#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: &'static str,
    pub variables: Value,
}

impl GraphQlRequest {
    /// Count of non-bot pageloads on `path` in the window ending at `now`.
    pub fn recent_views(account_tag: &str, path: &str, now: DateTime<Utc>) -> Self {
        let since = now - Duration::hours(RECENT_WINDOW_HOURS);

        Self {
            query: RECENT_VIEWS_QUERY,
            variables: json!({
                "accountTag": account_tag,
                "filter": {
                    "AND": [
                        {
                            "datetime_geq": since.to_rfc3339_opts(SecondsFormat::Millis, true),
                            "datetime_leq": now.to_rfc3339_opts(SecondsFormat::Millis, true),
                        },
                        { "bot": 0 },
                        { "requestPath": path },
                    ]
                }
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<ResponseData>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub viewer: Option<Viewer>,
}

#[derive(Debug, Deserialize)]
pub struct Viewer {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub total: Vec<CountGroup>,
}

#[derive(Debug, Deserialize)]
pub struct CountGroup {
    pub count: u64,
}

impl GraphQlResponse {
    /// Event count, `0` when no group matched. A non-empty error list wins over
    /// any data that came along with it.
    pub fn into_count(self) -> Result<u64, AnalyticsError> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AnalyticsError::Upstream(message));
        }

        let count = self
            .data
            .and_then(|d| d.viewer)
            .and_then(|v| v.accounts.into_iter().next())
            .and_then(|a| a.total.into_iter().next())
            .map(|g| g.count)
            .unwrap_or(0);

        Ok(count)
    }
}
