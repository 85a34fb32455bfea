//! Image proxy endpoint.
//!
//! GET /api/image-proxy?url=<image url>
//!
//! Streams a remote image back to the browser. The rate limit is checked
//! before the URL is even parsed, so a throttled client never causes an
//! outbound request.

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Extension, Query},
    http::{
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
        StatusCode,
    },
    response::Response,
};
use cover_extraction::{ProxyError, PROXY_CACHE_CONTROL};
use serde::Deserialize;

use crate::server::app::AxumAppState;
use crate::server::error::ApiError;
use crate::server::middleware::{rate_limit_key, ClientIp};

/// Header carrying the upstream URL that was fetched
pub const PROXY_URL_HEADER: &str = "x-proxy-url";

#[derive(Debug, Deserialize)]
pub struct ImageProxyQuery {
    url: Option<String>,
}

pub async fn image_proxy_handler(
    Extension(state): Extension<AxumAppState>,
    client: Option<Extension<ClientIp>>,
    query: Result<Query<ImageProxyQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let key = rate_limit_key("image-proxy", client.map(|Extension(ip)| ip));
    if !state.limits.proxy.check(state.rate_limiter.as_ref(), &key) {
        return Err(ApiError::RateLimited);
    }

    let Query(query) = query.map_err(|e| {
        tracing::debug!(error = %e, "Unreadable proxy query string");
        ApiError::Proxy(ProxyError::InvalidUrl)
    })?;

    let image = state.proxy.fetch(query.url.as_deref()).await?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, image.content_type.as_str())
        .header(CACHE_CONTROL, PROXY_CACHE_CONTROL)
        .header(PROXY_URL_HEADER, image.upstream_url.as_str());
    if let Some(length) = image.content_length {
        response = response.header(CONTENT_LENGTH, length);
    }

    response
        .body(Body::from_stream(image.body))
        .map_err(|e| ApiError::Internal(format!("failed to build proxy response: {}", e)))
}
