use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub counter: CounterConfig,
    /// `None` disables the analytics lookup and reconciliation
    pub analytics: Option<AnalyticsConfig>,
    pub reconcile_enabled: bool,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterConfig {
    pub backend: CounterBackend,
    /// Only used by the sqlite backend
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub endpoint: String,
    pub account_tag: String,
    pub credentials: AnalyticsCredentials,
    #[serde(default = "AnalyticsConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsCredentials {
    ApiToken(String),
    GlobalKey { email: String, key: String },
}

impl std::fmt::Debug for AnalyticsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiToken(_) => f.write_str("ApiToken(..)"),
            Self::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API with credentials. Empty disables CORS.
    pub allowed_origins: Vec<String>,
}

impl AnalyticsConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.cloudflare.com/client/v4/graphql";

    const fn default_timeout_secs() -> u64 {
        10
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// `ANALYTICS_TIMEOUT_SECS`: unset means the default, anything else must be a
/// positive integer.
fn parse_timeout_secs(raw: Option<String>) -> anyhow::Result<u64> {
    let Some(raw) = raw else {
        return Ok(AnalyticsConfig::default_timeout_secs());
    };

    let secs = raw
        .trim()
        .parse::<u64>()
        .context("ANALYTICS_TIMEOUT_SECS must be a positive integer")?;
    if secs == 0 {
        anyhow::bail!("ANALYTICS_TIMEOUT_SECS must be a positive integer");
    }
    Ok(secs)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./viewcount.db?mode=rwc".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port")?;

        let counter_backend = match std::env::var("COUNTER_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => CounterBackend::Memory,
            "sqlite" => CounterBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown COUNTER_BACKEND '{other}', falling back to 'memory'. Supported values: memory, sqlite"
                );
                CounterBackend::Memory
            }
        };
        let counter_url = std::env::var("COUNTER_URL")
            .unwrap_or_else(|_| "sqlite://./viewcount-counters.db?mode=rwc".to_string());

        let analytics = match std::env::var("CF_ACCOUNT_TAG").ok() {
            Some(account_tag) => {
                let credentials = match std::env::var("CF_API_TOKEN").ok() {
                    Some(token) => AnalyticsCredentials::ApiToken(token),
                    None => AnalyticsCredentials::GlobalKey {
                        email: std::env::var("CF_AUTH_EMAIL").context(
                            "CF_AUTH_EMAIL must be set when CF_ACCOUNT_TAG is set without CF_API_TOKEN",
                        )?,
                        key: std::env::var("CF_AUTH_KEY").context(
                            "CF_AUTH_KEY must be set when CF_ACCOUNT_TAG is set without CF_API_TOKEN",
                        )?,
                    },
                };
                let endpoint = std::env::var("CF_GRAPHQL_URL")
                    .unwrap_or_else(|_| AnalyticsConfig::DEFAULT_ENDPOINT.to_string());
                let timeout_secs =
                    parse_timeout_secs(std::env::var("ANALYTICS_TIMEOUT_SECS").ok())?;

                Some(AnalyticsConfig {
                    endpoint,
                    account_tag,
                    credentials,
                    timeout_secs,
                })
            }
            None => None,
        };

        let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            counter: CounterConfig {
                backend: counter_backend,
                url: counter_url,
            },
            analytics,
            reconcile_enabled: env_flag("RECONCILE_ENABLED", true),
            cors: CorsConfig { allowed_origins },
        })
    }
}
