//! Base URL and retry settings.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Checked in order; the first non-empty value wins
pub const BASE_URL_VARS: [&str; 3] = ["API_BASE_URL", "BACKEND_INTERNAL_URL", "NEXT_PUBLIC_API_URL"];

/// Path prefix of every versioned endpoint
pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server origin without the API prefix
    pub base_url: String,
    /// Attempts after the first for GET/HEAD
    pub max_retries: u32,
    /// First retry delay; doubles each attempt
    pub retry_base_delay: Duration,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(300),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Default::default()
        }
    }

    /// Resolve the base URL from the process environment.
    pub fn from_env() -> Self {
        Self::new(resolve_base_url(|name| std::env::var(name).ok()))
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// First configured base URL, falling back to the local server.
pub fn resolve_base_url(lookup: impl Fn(&str) -> Option<String>) -> String {
    BASE_URL_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Strip trailing slashes and a trailing API prefix.
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed.strip_suffix(API_PREFIX).unwrap_or(trimmed).to_string()
}
