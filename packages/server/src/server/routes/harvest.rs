//! Index harvesting endpoint.
//!
//! GET /api/harvest/{source}?offset=<n>&limit=<n>
//!
//! Answers 200 with the covers found on one window of the source's
//! articles. Unparseable numbers fall back to their defaults, and an index
//! that cannot be fetched yields `[]`.

use axum::{
    extract::{Extension, Path, Query},
    http::header::CACHE_CONTROL,
    response::{IntoResponse, Response},
    Json,
};
use cover_extraction::{HarvestPage, HARVEST_CACHE_CONTROL};
use serde::Deserialize;

use crate::server::app::AxumAppState;
use crate::server::error::ApiError;
use crate::server::middleware::{rate_limit_key, ClientIp};

#[derive(Debug, Default, Deserialize)]
pub struct HarvestQuery {
    offset: Option<String>,
    limit: Option<String>,
}

impl HarvestQuery {
    fn page(&self) -> HarvestPage {
        HarvestPage::from_query(lenient_number(&self.offset), lenient_number(&self.limit))
    }
}

fn lenient_number(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

pub async fn harvest_handler(
    Extension(state): Extension<AxumAppState>,
    client: Option<Extension<ClientIp>>,
    Path(source): Path<String>,
    query: Option<Query<HarvestQuery>>,
) -> Result<Response, ApiError> {
    let key = rate_limit_key("harvest", client.map(|Extension(ip)| ip));
    if !state.limits.covers.check(state.rate_limiter.as_ref(), &key) {
        return Err(ApiError::RateLimited);
    }

    let source = state
        .index_source(&source)
        .ok_or_else(|| ApiError::NotFound("unknown source".to_string()))?;
    let page = query.map(|Query(q)| q.page()).unwrap_or_default();

    let covers = state.harvester.harvest(source, page).await;
    Ok(([(CACHE_CONTROL, HARVEST_CACHE_CONTROL)], Json(covers)).into_response())
}
