//! Direct image link check.
//!
//! POST /api/direct-link  `{"url": "..."}`
//!
//! Lets a user save an image URL as-is instead of extracting from a page.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::server::app::AxumAppState;
use crate::server::error::ApiError;
use crate::server::middleware::{rate_limit_key, ClientIp};

#[derive(Debug, Deserialize)]
pub struct DirectLinkRequest {
    url: String,
}

#[derive(Debug, Serialize)]
pub struct DirectLinkResponse {
    accepted: bool,
}

pub async fn direct_link_handler(
    Extension(state): Extension<AxumAppState>,
    client: Option<Extension<ClientIp>>,
    payload: Result<Json<DirectLinkRequest>, JsonRejection>,
) -> Result<Json<DirectLinkResponse>, ApiError> {
    let key = rate_limit_key("covers", client.map(|Extension(ip)| ip));
    if !state.limits.covers.check(state.rate_limiter.as_ref(), &key) {
        return Err(ApiError::RateLimited);
    }

    let Json(request) = payload.map_err(|_| ApiError::BadRequest("url is required".to_string()))?;

    let verdict = state.validator.check_direct_link(&request.url).await;
    if verdict.is_accepted() {
        Ok(Json(DirectLinkResponse { accepted: true }))
    } else {
        tracing::debug!(url = %request.url, verdict = ?verdict, "Direct link rejected");
        Err(ApiError::BadRequest(verdict.message().to_string()))
    }
}
