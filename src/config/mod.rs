//! Configuration module for the recipe client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_PER_PAGE: u32 = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NOTICE_TTL_SECS: u64 = 8;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the recipe service, including the `/api` prefix
    pub api_base_url: String,
    /// Bearer token sent with every request
    pub api_key: Option<String>,
    /// Path to a SQLite file; when set the local store replaces the remote service
    pub local_db_path: Option<PathBuf>,
    /// Page size for paginated listings
    pub per_page: u32,
    /// Timeout applied to every remote request
    pub request_timeout: Duration,
    /// How long a failure notice stays visible
    pub notice_ttl: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            local_db_path: None,
            per_page: DEFAULT_PER_PAGE,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            notice_ttl: Duration::from_secs(DEFAULT_NOTICE_TTL_SECS),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("RECIPE_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let api_key = env::var("RECIPE_API_KEY").ok().filter(|k| !k.is_empty());

        let local_db_path = env::var("RECIPE_LOCAL_DB")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let per_page = parse_var("RECIPE_PER_PAGE")
            .filter(|n: &u32| *n > 0)
            .unwrap_or(DEFAULT_PER_PAGE);

        let request_timeout =
            Duration::from_secs(parse_var("RECIPE_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS));

        let notice_ttl = Duration::from_secs(
            parse_var("RECIPE_NOTICE_TTL_SECS").unwrap_or(DEFAULT_NOTICE_TTL_SECS),
        );

        let log_level = env::var("RECIPE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("RECIPE_LOG_JSON")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            api_base_url,
            api_key,
            local_db_path,
            per_page,
            request_timeout,
            notice_ttl,
            log_level,
            log_json,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
