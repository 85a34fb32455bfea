//! Typed errors for the cover extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the HTTP layer can
//! map each failure onto its own status code.

use thiserror::Error;

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// Host is blocked (e.g., localhost, 127.0.0.1)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// Host literal matches a private network pattern (10.x, 172.16-31.x, 192.168.x)
    #[error("blocked private network host: {0}")]
    PrivateNetwork(String),

    /// Resolved address in a blocked CIDR range
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors from a single outbound HTTP operation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Target rejected by the host guard
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Request did not complete in time
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Streamed body grew past the configured cap
    #[error("body exceeded {limit} bytes")]
    BodyTooLarge { limit: u64 },

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Classify a reqwest error, keeping timeouts distinct.
    pub fn from_reqwest(error: reqwest::Error, url: &str) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Http(error)
        }
    }
}

/// Errors surfaced by the image proxy.
///
/// Display strings are safe to show to end users: they never name the
/// guard rule that fired or echo internal configuration.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No `url` parameter was supplied
    #[error("missing url parameter")]
    MissingUrl,

    /// The `url` parameter is not an absolute URL
    #[error("invalid url")]
    InvalidUrl,

    /// Scheme other than http/https
    #[error("only http and https URLs are supported")]
    DisallowedScheme(String),

    /// Host guard rejected the target
    #[error("host is not allowed")]
    Blocked(#[source] SecurityError),

    /// Upstream answered with a non-success status
    #[error("upstream fetch failed: {0}")]
    UpstreamStatus(u16),

    /// Upstream content-type is not `image/*`
    #[error("target is not an image")]
    NotAnImage { content_type: String },

    /// Upstream declared a body larger than the cap
    #[error("image exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge { declared: u64, limit: u64 },

    /// Network failure, timeout or anything else unexpected
    #[error("proxy request failed")]
    Fetch(#[source] FetchError),
}

/// An index source definition that cannot be used for harvesting.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid index URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid link pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
