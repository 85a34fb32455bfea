//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use anyhow::{Context, Result};
use cover_extraction::{
    ExtractorConfig, HostGuard, ImageProxy, ImageValidator, IndexHarvester, IndexSource,
    MetadataExtractor, ProxyConfig, RateLimitPolicy, RateLimiter,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::server::middleware::extract_client_ip;
use crate::server::routes::{
    direct_link_handler, extract_handler, harvest_handler, health_handler, image_proxy_handler,
};

/// Per-endpoint rate limit policies
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// `image-proxy:{ip}`
    pub proxy: RateLimitPolicy,
    /// `covers:{ip}` for extraction and direct-link checks, `harvest:{ip}`
    /// for index harvesting
    pub covers: RateLimitPolicy,
}

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub extractor: Arc<MetadataExtractor>,
    pub validator: Arc<ImageValidator>,
    pub proxy: Arc<ImageProxy>,
    pub harvester: Arc<IndexHarvester>,
    /// Harvestable publications, looked up by name
    pub index_sources: Arc<Vec<IndexSource>>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub limits: RateLimits,
}

impl AxumAppState {
    /// Build the extraction, validation, proxy and harvest services under
    /// one guard.
    pub fn new(
        config: &Config,
        guard: HostGuard,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self> {
        let extractor_config = ExtractorConfig::default().with_page_timeout(config.page_fetch_timeout);
        let validator_config = extractor_config.validator.clone();
        let proxy_config = ProxyConfig::default().with_timeout(config.proxy_timeout);

        let index_sources = IndexSource::builtins().context("Invalid built-in index source")?;

        Ok(Self {
            extractor: Arc::new(
                MetadataExtractor::new(guard.clone(), extractor_config.clone())
                    .context("Failed to build extractor client")?,
            ),
            validator: Arc::new(
                ImageValidator::new(guard.clone(), validator_config)
                    .context("Failed to build validator client")?,
            ),
            harvester: Arc::new(
                IndexHarvester::new(guard.clone(), extractor_config)
                    .context("Failed to build harvester client")?,
            ),
            proxy: Arc::new(
                ImageProxy::new(guard, proxy_config).context("Failed to build proxy client")?,
            ),
            index_sources: Arc::new(index_sources),
            rate_limiter,
            limits: RateLimits {
                proxy: config.proxy_rate_limit,
                covers: config.extract_rate_limit,
            },
        })
    }

    /// Add a harvestable source, replacing any source with the same name.
    pub fn with_index_source(mut self, source: IndexSource) -> Self {
        let sources = Arc::make_mut(&mut self.index_sources);
        sources.retain(|existing| existing.name != source.name);
        sources.push(source);
        self
    }

    /// Source registered under `name`.
    pub fn index_source(&self, name: &str) -> Option<&IndexSource> {
        self.index_sources.iter().find(|source| source.name == name)
    }
}

/// Build the Axum application router
pub fn build_app(state: AxumAppState, allowed_origins: &[String]) -> Router {
    let app = Router::new()
        .route("/api/image-proxy", get(image_proxy_handler))
        .route("/api/extract", post(extract_handler))
        .route("/api/direct-link", post(direct_link_handler))
        .route("/api/harvest/:source", get(harvest_handler))
        .route("/health", get(health_handler));

    app
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS configuration; an empty origin list allows any origin
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
}
