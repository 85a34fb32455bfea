//! Cover Extraction Library
//!
//! Finds a representative cover image, title and source for an arbitrary web
//! page, and re-serves remote images to browsers without exposing the host
//! network to Server-Side Request Forgery.
//!
//! # Design Philosophy
//!
//! - Read markup, never run it: pages are parsed, no script is evaluated
//! - First match in a fixed priority order, not the "best" image
//! - Every outbound request passes the [`HostGuard`], redirects included
//! - Extraction degrades to an empty result; the proxy reports every failure
//!
//! # Usage
//!
//! ```rust,ignore
//! use cover_extraction::{ExtractorConfig, HostGuard, MetadataExtractor};
//!
//! let extractor = MetadataExtractor::new(HostGuard::new(), ExtractorConfig::default())?;
//! let result = extractor.extract("https://example.com/post").await;
//!
//! if let Some(image) = result.image_url {
//!     println!("cover: {image}");
//! }
//! ```
//!
//! # Modules
//!
//! - [`security`] - SSRF protection ([`HostGuard`])
//! - [`extractor`] - Page fetch and candidate search
//! - [`validator`] - Image confirmation and direct-link checks
//! - [`proxy`] - Streaming image proxy with size and type enforcement
//! - [`harvest`] - Bulk cover harvesting from publication indexes
//! - [`rate_limit`] - Keyed rate limiter collaborator
//! - [`types`] - Configuration and output types
//! - [`testing`] - Mock implementations for testing

pub mod client;
pub mod error;
pub mod extractor;
pub mod harvest;
pub mod proxy;
pub mod rate_limit;
pub mod security;
pub mod testing;
pub mod types;
pub mod validator;

// Re-export core types at crate root
pub use error::{
    FetchError, FetchResult, ProxyError, SecurityError, SecurityResult, SourceError,
};
pub use extractor::{MetadataExtractor, PageMetadata};
pub use harvest::{
    HarvestPage, HarvestedCover, IndexHarvester, IndexSource, HARVEST_CACHE_CONTROL,
};
pub use proxy::{ImageProxy, ProxyResult};
pub use rate_limit::{InMemoryRateLimiter, RateLimitPolicy, RateLimiter};
pub use security::{is_allowed_target, GuardVerdict, HostGuard};
pub use types::{
    config::{
        ExtractorConfig, ProxyConfig, ValidatorConfig, BROWSER_USER_AGENT, MAX_PROXY_BYTES,
        PROXY_CACHE_CONTROL,
    },
    extraction::{CandidateSource, ExtractionResult, ImageCandidate},
};
pub use validator::{has_image_extension, DirectLinkVerdict, ImageValidator};
