//! Image validation.
//!
//! Two tiers: a `HEAD` request whose `content-type` must start with `image/`,
//! then, if that fails for any reason, a check of the URL path against
//! known image extensions. Some origins reject `HEAD` or mislabel their
//! content, so the extension tier keeps those images usable.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::client::{build_client, is_image_content_type};
use crate::error::{FetchError, FetchResult};
use crate::security::HostGuard;
use crate::types::config::{
    ValidatorConfig, DIRECT_LINK_EXTENSIONS, IMAGE_ACCEPT, IMAGE_EXTENSIONS,
};

/// Outcome of checking a user-submitted direct image link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum DirectLinkVerdict {
    /// Link looks like an image
    Accepted,
    /// Not an absolute http(s) URL, or the host is not allowed
    NotHttp,
    /// Path does not end in a known image extension
    NoImageExtension,
    /// HEAD answered with a non-image content-type
    NotAnImage { content_type: String },
}

impl DirectLinkVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// User-facing explanation of a rejection.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Accepted => "link accepted",
            Self::NotHttp => "link must be a public http or https URL",
            Self::NoImageExtension => "link must point directly at an image file",
            Self::NotAnImage { .. } => "link content is not an image",
        }
    }
}

/// Confirms that a URL serves image bytes.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    client: reqwest::Client,
    guard: HostGuard,
    config: ValidatorConfig,
}

impl ImageValidator {
    /// Create a validator using `guard` for every HEAD and redirect hop.
    pub fn new(guard: HostGuard, config: ValidatorConfig) -> FetchResult<Self> {
        let client = build_client(&guard, &config.user_agent, config.max_redirects)?;
        Ok(Self {
            client,
            guard,
            config,
        })
    }

    /// Whether `url` serves an image.
    pub async fn is_image(&self, url: &Url) -> bool {
        self.is_image_with_cancel(url, CancellationToken::new()).await
    }

    /// Like [`ImageValidator::is_image`], aborting the HEAD on cancellation.
    ///
    /// A cancelled HEAD counts as a failed one, so the extension
    /// fallback still applies.
    pub async fn is_image_with_cancel(&self, url: &Url, cancel: CancellationToken) -> bool {
        if let Err(e) = self.guard.enforce(url).await {
            debug!(url = %url, error = %e, "Image candidate rejected by host guard");
            return false;
        }

        let head = tokio::select! {
            result = self.head_content_type(url) => result,
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
        };

        match head {
            Ok(Some(content_type)) if is_image_content_type(&content_type) => {
                debug!(url = %url, content_type = %content_type, "HEAD confirmed image");
                true
            }
            outcome => {
                let matched = has_image_extension(url);
                debug!(
                    url = %url,
                    head = ?outcome.map_err(|e| e.to_string()),
                    extension_match = matched,
                    "HEAD inconclusive, using extension check"
                );
                matched
            }
        }
    }

    /// Check a link a user wants to save as-is.
    ///
    /// Stricter up front (a direct-link extension is required) but lenient
    /// on the HEAD: only an explicit non-image content-type rejects the
    /// link, whatever status it arrived with.
    pub async fn check_direct_link(&self, raw: &str) -> DirectLinkVerdict {
        let url = match Url::parse(raw.trim()) {
            Ok(url) => url,
            Err(_) => return DirectLinkVerdict::NotHttp,
        };

        if self.guard.enforce(&url).await.is_err() {
            return DirectLinkVerdict::NotHttp;
        }

        if !has_extension_in(&url, DIRECT_LINK_EXTENSIONS) {
            return DirectLinkVerdict::NoImageExtension;
        }

        match self.head(&url).await.map(|(_, content_type)| content_type) {
            Ok(Some(content_type))
                if !content_type.trim().is_empty() && !is_image_content_type(&content_type) =>
            {
                DirectLinkVerdict::NotAnImage { content_type }
            }
            Ok(_) => DirectLinkVerdict::Accepted,
            Err(e) => {
                debug!(url = %url, error = %e, "Direct link HEAD failed, accepting");
                DirectLinkVerdict::Accepted
            }
        }
    }

    /// Content-type of a successful `HEAD`; error statuses count as failure.
    async fn head_content_type(&self, url: &Url) -> FetchResult<Option<String>> {
        let (status, content_type) = self.head(url).await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(content_type)
    }

    /// Issue a `HEAD` and return the status with the declared content-type.
    async fn head(&self, url: &Url) -> FetchResult<(StatusCode, Option<String>)> {
        let response = self
            .client
            .head(url.clone())
            .header(ACCEPT, IMAGE_ACCEPT)
            .timeout(self.config.head_timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url.as_str()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((response.status(), content_type))
    }
}

/// Whether the URL path ends in a known image extension.
///
/// Query string and fragment are ignored.
pub fn has_image_extension(url: &Url) -> bool {
    has_extension_in(url, IMAGE_EXTENSIONS)
}

fn has_extension_in(url: &Url, extensions: &[&str]) -> bool {
    let path = url.path();
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => extensions
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn local_validator() -> ImageValidator {
        ImageValidator::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ValidatorConfig::default().with_head_timeout(Duration::from_secs(2)),
        )
        .unwrap()
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(&url("https://cdn.example.com/a/cover.JPG")));
        assert!(has_image_extension(&url("https://cdn.example.com/x.avif?w=800&h=600")));
        assert!(has_image_extension(&url("https://cdn.example.com/x.webp#frag")));
        assert!(!has_image_extension(&url("https://cdn.example.com/photo")));
        assert!(!has_image_extension(&url("https://cdn.example.com/page.html?f=a.png")));
        assert!(!has_image_extension(&url("https://cdn.example.com/images.png/")));
        assert!(!has_image_extension(&url("https://cdn.example.com/.png")));
    }

    #[tokio::test]
    async fn test_head_content_type_confirms_image() {
        let server = MockServer::start();
        let head = server.mock(|when, then| {
            when.method(HEAD).path("/render");
            then.status(200).header("content-type", "image/jpeg");
        });

        let validator = local_validator();
        assert!(validator.is_image(&url(&server.url("/render"))).await);
        head.assert();
    }

    #[tokio::test]
    async fn test_head_rejected_falls_back_to_extension() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD);
            then.status(405);
        });

        let validator = local_validator();
        assert!(validator.is_image(&url(&server.url("/img/cover.png?v=2"))).await);
        assert!(!validator.is_image(&url(&server.url("/img/cover"))).await);
    }

    #[tokio::test]
    async fn test_mislabelled_content_type_falls_back_to_extension() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD);
            then.status(200).header("content-type", "text/html");
        });

        let validator = local_validator();
        assert!(validator.is_image(&url(&server.url("/a.gif"))).await);
        assert!(!validator.is_image(&url(&server.url("/article"))).await);
    }

    #[tokio::test]
    async fn test_blocked_host_is_never_contacted() {
        let server = MockServer::start();
        let head = server.mock(|when, then| {
            when.method(HEAD);
            then.status(200).header("content-type", "image/png");
        });

        let validator =
            ImageValidator::new(HostGuard::new(), ValidatorConfig::default()).unwrap();
        assert!(!validator.is_image(&url(&server.url("/x.png"))).await);
        assert_eq!(head.hits(), 0);
    }

    #[tokio::test]
    async fn test_direct_link_verdicts() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD).path("/real.png");
            then.status(200).header("content-type", "image/png");
        });
        server.mock(|when, then| {
            when.method(HEAD).path("/fake.png");
            then.status(200).header("content-type", "text/html; charset=utf-8");
        });
        server.mock(|when, then| {
            when.method(HEAD).path("/unreachable.jpg");
            then.status(500);
        });

        let validator = local_validator();
        assert_eq!(
            validator.check_direct_link(&server.url("/real.png")).await,
            DirectLinkVerdict::Accepted
        );
        assert_eq!(
            validator.check_direct_link(&server.url("/fake.png")).await,
            DirectLinkVerdict::NotAnImage {
                content_type: "text/html; charset=utf-8".into()
            }
        );
        assert_eq!(
            validator.check_direct_link(&server.url("/unreachable.jpg")).await,
            DirectLinkVerdict::Accepted
        );
        assert_eq!(
            validator.check_direct_link(&server.url("/page")).await,
            DirectLinkVerdict::NoImageExtension
        );
        assert_eq!(
            validator.check_direct_link(&server.url("/anim.gif")).await,
            DirectLinkVerdict::NoImageExtension
        );
        assert_eq!(
            validator.check_direct_link("ftp://example.com/a.png").await,
            DirectLinkVerdict::NotHttp
        );
        assert_eq!(
            validator.check_direct_link("not a url").await,
            DirectLinkVerdict::NotHttp
        );
    }

    #[tokio::test]
    async fn test_direct_link_error_page_with_html_is_rejected() {
        let server = MockServer::start();
        let head = server.mock(|when, then| {
            when.method(HEAD).path("/missing.jpg");
            then.status(404).header("content-type", "text/html");
        });
        server.mock(|when, then| {
            when.method(HEAD).path("/forbidden.png");
            then.status(403);
        });

        let validator = local_validator();
        assert_eq!(
            validator.check_direct_link(&server.url("/missing.jpg")).await,
            DirectLinkVerdict::NotAnImage {
                content_type: "text/html".into()
            }
        );
        head.assert();

        // No content-type to judge by, so the link stands.
        assert_eq!(
            validator.check_direct_link(&server.url("/forbidden.png")).await,
            DirectLinkVerdict::Accepted
        );
    }
}
