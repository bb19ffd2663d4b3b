//! Client configuration.
//!
//! Settings come from environment variables (optionally seeded from a
//! `.env` file) and fall back to defaults:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `SOLVER_API_BASE_URL` | `http://localhost:8080/api` | Backend API root |
//! | `SOLVER_POLL_INTERVAL_MS` | `2000` | Delay between status queries |
//! | `SOLVER_SETTLE_DELAY_MS` | `2000` | Delay between `DONE` and the success signal |
//! | `SOLVER_REQUEST_TIMEOUT_SECS` | `30` | Per-request transport timeout |
//! | `SOLVER_SESSION_FILE` | unset | Durable session storage path |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Default backend API root.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Default interval between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default delay between observing `DONE` and emitting the success signal.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// Default per-request transport timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the solver client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Normalized API root, always ending in `/api` with no trailing slash.
    pub api_base_url: String,
    /// Fixed cadence of the polling loop.
    pub poll_interval: Duration,
    /// Settle delay before the success signal fires.
    pub settle_delay: Duration,
    /// Transport timeout for each request.
    pub request_timeout: Duration,
    /// Where the session is persisted, if anywhere.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given API root with default timings.
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: normalize_base_url(api_base_url),
            ..Self::default()
        }
    }

    /// Load configuration from the environment.
    pub fn from_env() -> ClientResult<Self> {
        let _ = dotenvy::dotenv();

        let api_base_url = optional_env("SOLVER_API_BASE_URL")
            .map(|url| normalize_base_url(&url))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let poll_interval = parse_optional_env::<u64>("SOLVER_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let settle_delay = parse_optional_env::<u64>("SOLVER_SETTLE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SETTLE_DELAY);
        let request_timeout = parse_optional_env::<u64>("SOLVER_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        if poll_interval.is_zero() {
            return Err(ClientError::Configuration(
                "SOLVER_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let config = Self {
            api_base_url,
            poll_interval,
            settle_delay,
            request_timeout,
            session_file: optional_env("SOLVER_SESSION_FILE").map(PathBuf::from),
        };

        if optional_env("SOLVER_ENV").as_deref() == Some("production") && config.is_localhost() {
            tracing::warn!(
                "SOLVER_ENV is production but the API base URL points to localhost: {}",
                config.api_base_url
            );
        }

        tracing::debug!(api_base_url = %config.api_base_url, "Loaded client configuration");
        Ok(config)
    }

    /// Build the full URL for an API path such as `/auth/login`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    /// Whether the API root points at the local machine.
    pub fn is_localhost(&self) -> bool {
        self.api_base_url.contains("localhost") || self.api_base_url.contains("127.0.0.1")
    }
}

/// Strip a trailing slash and make sure the root ends with `/api`.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api")
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_optional_env<T: FromStr>(key: &str) -> ClientResult<Option<T>> {
    optional_env(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                ClientError::Configuration(format!("{key} is not a valid number: {raw}"))
            })
        })
        .transpose()
}
