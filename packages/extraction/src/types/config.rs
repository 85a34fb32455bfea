//! Configuration types for extraction, validation and proxying.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Desktop browser identification; many sites refuse non-browser clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";

/// Accept header sent when fetching HTML pages.
pub const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Accept header sent when fetching images.
pub const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Hard cap on proxied body bytes (8 MiB).
pub const MAX_PROXY_BYTES: u64 = 8 * 1024 * 1024;

/// Cache directive attached to proxied images.
pub const PROXY_CACHE_CONTROL: &str =
    "public, max-age=3600, s-maxage=3600, stale-while-revalidate=86400";

/// Extensions accepted by the validator's fallback check.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "svg", "avif"];

/// Extensions a user-submitted direct link may end in. No gif.
pub const DIRECT_LINK_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "svg", "avif"];

/// Configuration for page metadata extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Budget for the whole extraction (page fetch plus image check).
    ///
    /// Default: 15 seconds.
    pub page_timeout: Duration,

    /// Maximum HTML bytes read from the page. Default: 2 MiB.
    pub max_page_bytes: usize,

    /// Maximum redirects followed. Default: 10.
    pub max_redirects: usize,

    /// User agent sent with page requests
    pub user_agent: String,

    /// Settings for the image check run on the chosen candidate
    pub validator: ValidatorConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(15),
            max_page_bytes: 2 * 1024 * 1024,
            max_redirects: 10,
            user_agent: BROWSER_USER_AGENT.to_string(),
            validator: ValidatorConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the extraction timeout.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Set the maximum HTML bytes read.
    pub fn with_max_page_bytes(mut self, bytes: usize) -> Self {
        self.max_page_bytes = bytes;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the validator settings.
    pub fn with_validator(mut self, validator: ValidatorConfig) -> Self {
        self.validator = validator;
        self
    }
}

/// Configuration for the header-only image check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Timeout for the HEAD request. Default: 10 seconds.
    pub head_timeout: Duration,

    /// Maximum redirects followed. Default: 10.
    pub max_redirects: usize,

    /// User agent sent with HEAD requests
    pub user_agent: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            head_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl ValidatorConfig {
    /// Set the HEAD timeout.
    pub fn with_head_timeout(mut self, timeout: Duration) -> Self {
        self.head_timeout = timeout;
        self
    }
}

/// Configuration for the image proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Time allowed until upstream response headers arrive. Default: 10 seconds.
    pub timeout: Duration,

    /// Maximum body bytes forwarded. Default: [`MAX_PROXY_BYTES`].
    pub max_bytes: u64,

    /// Maximum redirects followed. Default: 10.
    pub max_redirects: usize,

    /// User agent sent upstream
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_bytes: MAX_PROXY_BYTES,
            max_redirects: 10,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl ProxyConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upstream timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the body cap.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}
