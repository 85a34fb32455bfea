use anyhow::{Context, Result};
use cover_extraction::RateLimitPolicy;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Resolve hostnames and reject private addresses before fetching
    pub guard_resolve_dns: bool,
    pub proxy_rate_limit: RateLimitPolicy,
    pub extract_rate_limit: RateLimitPolicy,
    pub page_fetch_timeout: Duration,
    pub proxy_timeout: Duration,
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            guard_resolve_dns: false,
            proxy_rate_limit: RateLimitPolicy::new(Duration::from_millis(60_000), 120),
            extract_rate_limit: RateLimitPolicy::new(Duration::from_millis(60_000), 20),
            page_fetch_timeout: Duration::from_secs(15),
            proxy_timeout: Duration::from_secs(10),
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            port: parse_var("PORT", defaults.port)?,
            guard_resolve_dns: parse_var("GUARD_RESOLVE_DNS", defaults.guard_resolve_dns)?,
            proxy_rate_limit: RateLimitPolicy::new(
                Duration::from_millis(parse_var("PROXY_RATE_LIMIT_WINDOW_MS", 60_000u64)?),
                parse_var("PROXY_RATE_LIMIT_MAX", defaults.proxy_rate_limit.max)?,
            ),
            extract_rate_limit: RateLimitPolicy::new(
                Duration::from_millis(parse_var("EXTRACT_RATE_LIMIT_WINDOW_MS", 60_000u64)?),
                parse_var("EXTRACT_RATE_LIMIT_MAX", defaults.extract_rate_limit.max)?,
            ),
            page_fetch_timeout: Duration::from_secs(parse_var("PAGE_FETCH_TIMEOUT_SECS", 15u64)?),
            proxy_timeout: Duration::from_secs(parse_var("PROXY_TIMEOUT_SECS", 10u64)?),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
        })
    }
}

/// Parse `name` if set, else fall back to `default`.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid {}", name, std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
