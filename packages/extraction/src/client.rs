//! Shared HTTP client construction.
//!
//! Every client built here re-runs the host guard on each redirect hop so a
//! public URL cannot bounce the request onto an internal address.

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::redirect::Policy;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::security::HostGuard;
use crate::types::config::PAGE_ACCEPT;

/// Build a client for outbound fetches.
pub fn build_client(
    guard: &HostGuard,
    user_agent: &str,
    max_redirects: usize,
) -> FetchResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

    reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .redirect(guarded_redirects(guard.clone(), max_redirects))
        .build()
        .map_err(FetchError::Client)
}

fn guarded_redirects(guard: HostGuard, max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error("too many redirects");
        }

        match guard.validate(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(e) => {
                warn!(url = %attempt.url(), error = %e, "Redirect target rejected");
                attempt.error(e)
            }
        }
    })
}

/// GET an HTML page, reading at most `limit` bytes of it.
///
/// The caller is responsible for running the host guard on `page` first.
pub async fn fetch_page(client: &reqwest::Client, page: &Url, limit: usize) -> FetchResult<String> {
    debug!(url = %page, "Page fetch starting");
    let response = client
        .get(page.clone())
        .header(ACCEPT, PAGE_ACCEPT)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, page.as_str()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: page.to_string(),
        });
    }

    let mut body: Vec<u8> = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| FetchError::from_reqwest(e, page.as_str()))?;
        let room = limit.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= limit {
            debug!(url = %page, limit, "Page body truncated");
            break;
        }
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Whether a content-type header value denotes an image.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("image/"))
        .unwrap_or(false)
}
