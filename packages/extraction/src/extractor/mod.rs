//! Page metadata extraction.
//!
//! Fetches a page, scans its markup for a cover image, title and source,
//! and confirms the image with [`ImageValidator`]. Extraction is best-effort
//! enrichment: every failure degrades to an empty or partial result and is
//! never returned as an error.

pub mod json_ld;
pub mod markup;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{build_client, fetch_page};
use crate::error::{FetchError, FetchResult};
use crate::security::HostGuard;
use crate::types::config::ExtractorConfig;
use crate::types::extraction::ExtractionResult;
use crate::validator::ImageValidator;

pub use markup::PageMetadata;

/// Finds a cover image, title and source for a page URL.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    client: reqwest::Client,
    guard: HostGuard,
    validator: ImageValidator,
    config: ExtractorConfig,
}

impl MetadataExtractor {
    /// Create an extractor that applies `guard` to the page and its image.
    pub fn new(guard: HostGuard, config: ExtractorConfig) -> FetchResult<Self> {
        let client = build_client(&guard, &config.user_agent, config.max_redirects)?;
        let validator = ImageValidator::new(guard.clone(), config.validator.clone())?;
        Ok(Self {
            client,
            guard,
            validator,
            config,
        })
    }

    /// Extract metadata for `page_url`.
    pub async fn extract(&self, page_url: &str) -> ExtractionResult {
        self.extract_with_cancel(page_url, CancellationToken::new())
            .await
    }

    /// Extract with cancellation support.
    ///
    /// The whole operation (page fetch and image check) shares one time
    /// budget, `page_timeout`. Timeout and cancellation both yield an empty
    /// result.
    pub async fn extract_with_cancel(
        &self,
        page_url: &str,
        cancel: CancellationToken,
    ) -> ExtractionResult {
        let work = tokio::time::timeout(
            self.config.page_timeout,
            self.try_extract(page_url, cancel.clone()),
        );

        let outcome = tokio::select! {
            result = work => result.unwrap_or_else(|_| Err(FetchError::Timeout {
                url: page_url.to_string(),
            })),
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
        };

        match outcome {
            Ok(result) => {
                info!(
                    url = %page_url,
                    has_image = result.has_image(),
                    has_title = result.title.is_some(),
                    "Extraction completed"
                );
                result
            }
            Err(FetchError::Security(e)) => {
                debug!(url = %page_url, error = %e, "Page URL rejected by host guard");
                ExtractionResult::empty()
            }
            Err(e) => {
                warn!(url = %page_url, error = %e, "Extraction failed");
                ExtractionResult::empty()
            }
        }
    }

    async fn try_extract(
        &self,
        page_url: &str,
        cancel: CancellationToken,
    ) -> FetchResult<ExtractionResult> {
        let page = Url::parse(page_url).map_err(|_| FetchError::InvalidUrl {
            url: page_url.to_string(),
        })?;
        self.guard.enforce(&page).await?;

        let html = fetch_page(&self.client, &page, self.config.max_page_bytes).await?;

        // `scraper::Html` is not Send; keep it inside this synchronous call.
        let metadata = markup::scan(&html, &page);
        debug!(
            url = %page,
            candidate = ?metadata.image.as_ref().map(|c| (c.source, c.url.as_str())),
            "Candidate selected"
        );

        let image_url = match metadata.image {
            Some(candidate) => {
                if self
                    .validator
                    .is_image_with_cancel(&candidate.url, cancel)
                    .await
                {
                    Some(candidate.url)
                } else {
                    debug!(url = %candidate.url, "Candidate is not an image, dropping it");
                    None
                }
            }
            None => None,
        };

        let source = metadata
            .site_name
            .or_else(|| page.host_str().map(str::to_string));

        Ok(ExtractionResult {
            image_url,
            title: metadata.title,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::ValidatorConfig;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use std::time::Duration;

    fn local_extractor() -> MetadataExtractor {
        MetadataExtractor::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ExtractorConfig::default()
                .with_page_timeout(Duration::from_secs(5))
                .with_validator(
                    ValidatorConfig::default().with_head_timeout(Duration::from_secs(2)),
                ),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_graph_image_beats_twitter() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/post");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(
                    r#"<html><head>
                        <meta name="twitter:image" content="/twitter.jpg">
                        <meta property="og:image" content="/og.jpg">
                        <meta property="og:title" content="A Post">
                    </head></html>"#,
                );
        });
        server.mock(|when, then| {
            when.method(HEAD).path("/og.jpg");
            then.status(200).header("content-type", "image/jpeg");
        });

        let result = local_extractor().extract(&server.url("/post")).await;

        assert_eq!(result.image_url.unwrap().as_str(), server.url("/og.jpg"));
        assert_eq!(result.title.as_deref(), Some("A Post"));
        assert_eq!(result.source.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_json_ld_only_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/articles/one");
            then.status(200).body(
                r#"<html><head>
                    <script type="application/ld+json">{"@type":"Article","image":["media/hero.png"]}</script>
                    <meta property="og:site_name" content="Example Blog">
                </head></html>"#,
            );
        });
        server.mock(|when, then| {
            when.method(HEAD).path("/articles/media/hero.png");
            then.status(200).header("content-type", "image/png");
        });

        let result = local_extractor().extract(&server.url("/articles/one")).await;

        assert_eq!(
            result.image_url.unwrap().as_str(),
            server.url("/articles/media/hero.png")
        );
        assert_eq!(result.source.as_deref(), Some("Example Blog"));
    }

    #[tokio::test]
    async fn test_non_image_candidate_keeps_title() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/page");
            then.status(200).body(
                r#"<html><head>
                    <title>  Still Titled  </title>
                    <meta property="og:image" content="/not-an-image">
                    <meta name="twitter:image" content="/real.png">
                </head></html>"#,
            );
        });
        server.mock(|when, then| {
            when.method(HEAD).path("/not-an-image");
            then.status(200).header("content-type", "text/html");
        });

        let result = local_extractor().extract(&server.url("/page")).await;

        assert!(result.image_url.is_none());
        assert_eq!(result.title.as_deref(), Some("Still Titled"));
        assert_eq!(result.source.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_non_success_page_yields_empty_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404).body("<title>Not Found</title>");
        });

        let result = local_extractor().extract(&server.url("/gone")).await;
        assert_eq!(result, ExtractionResult::empty());
    }

    #[tokio::test]
    async fn test_blocked_page_is_never_fetched() {
        let server = MockServer::start();
        let page = server.mock(|when, then| {
            when.method(GET);
            then.status(200).body(r#"<meta property="og:image" content="/a.png">"#);
        });

        let extractor =
            MetadataExtractor::new(HostGuard::new(), ExtractorConfig::default()).unwrap();
        let result = extractor.extract(&server.url("/post")).await;

        assert_eq!(result, ExtractionResult::empty());
        assert_eq!(page.hits(), 0);
    }

    #[tokio::test]
    async fn test_invalid_and_non_http_urls() {
        let extractor = local_extractor();
        assert_eq!(extractor.extract("not a url").await, ExtractionResult::empty());
        assert_eq!(
            extractor.extract("file:///etc/passwd").await,
            ExtractionResult::empty()
        );
    }

    #[tokio::test]
    async fn test_timeout_yields_empty_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_secs(2))
                .body("<title>Too late</title>");
        });

        let extractor = MetadataExtractor::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ExtractorConfig::default().with_page_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let result = extractor.extract(&server.url("/slow")).await;
        assert_eq!(result, ExtractionResult::empty());
    }

    #[tokio::test]
    async fn test_cancelled_extraction_yields_empty_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/post");
            then.status(200)
                .delay(Duration::from_secs(2))
                .body("<title>Never seen</title>");
        });

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = local_extractor()
            .extract_with_cancel(&server.url("/post"), cancel)
            .await;
        assert_eq!(result, ExtractionResult::empty());
    }

    #[tokio::test]
    async fn test_page_body_is_capped() {
        let server = MockServer::start();
        let padding = "x".repeat(4096);
        server.mock(|when, then| {
            when.method(GET).path("/huge");
            then.status(200)
                .body(format!("<title>Early</title>{}<meta property=\"og:title\" content=\"Late\">", padding));
        });

        let extractor = MetadataExtractor::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ExtractorConfig::default().with_max_page_bytes(1024),
        )
        .unwrap();

        let result = extractor.extract(&server.url("/huge")).await;
        assert_eq!(result.title.as_deref(), Some("Early"));
    }
}
