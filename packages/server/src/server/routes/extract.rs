//! Page metadata extraction endpoint.
//!
//! POST /api/extract  `{"pageUrl": "..."}`
//!
//! Always answers 200 with whatever could be found; an unreachable or
//! blocked page simply yields `{"imageUrl": null}`.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use cover_extraction::ExtractionResult;
use serde::Deserialize;

use crate::server::app::AxumAppState;
use crate::server::error::ApiError;
use crate::server::middleware::{rate_limit_key, ClientIp};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    page_url: String,
}

pub async fn extract_handler(
    Extension(state): Extension<AxumAppState>,
    client: Option<Extension<ClientIp>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let key = rate_limit_key("covers", client.map(|Extension(ip)| ip));
    if !state.limits.covers.check(state.rate_limiter.as_ref(), &key) {
        return Err(ApiError::RateLimited);
    }

    let Json(request) =
        payload.map_err(|_| ApiError::BadRequest("pageUrl is required".to_string()))?;

    Ok(Json(state.extractor.extract(&request.page_url).await))
}
