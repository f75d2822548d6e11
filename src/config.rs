//! Runtime configuration.
//!
//! Values come from built-in defaults, then the storage `config` table,
//! then `N8NTREE_*` environment variables.

use crate::error::{N8nTreeError, Result};
use crate::storage::LocalStorage;
use std::str::FromStr;
use std::time::Duration;

/// Settings for the tree mirror daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the n8n instance (no trailing slash).
    pub base_url: String,

    /// Project whose tree is mirrored. `None` lists across projects.
    pub project_id: Option<String>,

    /// Value of the `Cookie` header sent with REST calls.
    pub auth_cookie: Option<String>,

    /// Refresh interval while the user is active.
    pub poll_fast: Duration,

    /// Refresh interval after `idle_timeout` without input.
    pub poll_slow: Duration,

    /// Input-free time before the adaptive monitor slows down.
    pub idle_timeout: Duration,

    /// Minimum spacing between recorded input events.
    pub activity_throttle: Duration,

    /// Lifetime of API cache entries.
    pub cache_ttl: Duration,

    /// Port of the local sidebar API.
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5678".to_string(),
            project_id: None,
            auth_cookie: None,
            poll_fast: Duration::from_millis(2000),
            poll_slow: Duration::from_millis(30_000),
            idle_timeout: Duration::from_secs(60),
            activity_throttle: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(300),
            server_port: 13235,
        }
    }
}

impl Config {
    /// Loads config from storage, then applies environment overrides.
    pub fn load(storage: &LocalStorage) -> Result<Self> {
        let mut config = Self::default();
        config.apply_pairs(storage.get_all_config()?.into_iter().map(|(k, v, _)| (k, v)))?;

        let env_pairs = [
            ("N8NTREE_BASE_URL", "base_url"),
            ("N8NTREE_PROJECT_ID", "project_id"),
            ("N8NTREE_AUTH_COOKIE", "auth_cookie"),
            ("N8NTREE_PORT", "server_port"),
        ]
        .into_iter()
        .filter_map(|(var, key)| std::env::var(var).ok().map(|v| (key.to_string(), v)));
        config.apply_pairs(env_pairs)?;

        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Applies `(key, value)` overrides. Unknown keys are ignored.
    pub fn apply_pairs<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in pairs {
            match key.as_str() {
                "base_url" => self.base_url = value.trim_end_matches('/').to_string(),
                "project_id" => self.project_id = non_empty(value),
                "auth_cookie" => self.auth_cookie = non_empty(value),
                "poll_fast_ms" => self.poll_fast = parse_period(&key, &value)?,
                "poll_slow_ms" => self.poll_slow = parse_period(&key, &value)?,
                "idle_timeout_secs" => {
                    self.idle_timeout = Duration::from_secs(parse(&key, &value)?)
                }
                "activity_throttle_ms" => {
                    self.activity_throttle = Duration::from_millis(parse(&key, &value)?)
                }
                "cache_ttl_secs" => self.cache_ttl = Duration::from_secs(parse(&key, &value)?),
                "server_port" => self.server_port = parse(&key, &value)?,
                _ => tracing::trace!(key = %key, "Ignoring unknown config key"),
            }
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| N8nTreeError::config(format!("{key}: cannot parse {value:?}")))
}

/// Poll period in milliseconds. Zero is rejected.
fn parse_period(key: &str, value: &str) -> Result<Duration> {
    match parse::<u64>(key, value)? {
        0 => Err(N8nTreeError::config(format!("{key}: must be greater than zero"))),
        ms => Ok(Duration::from_millis(ms)),
    }
}
