//! Image proxy streamer.
//!
//! Fetches a remote image under the host guard and hands the body back as a
//! stream, so bytes reach the client without being buffered in full. Size
//! and content-type are enforced before any body byte is forwarded.

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use tracing::{debug, info};
use url::Url;

use crate::client::{build_client, is_image_content_type};
use crate::error::{FetchError, FetchResult, ProxyError};
use crate::security::HostGuard;
use crate::types::config::{ProxyConfig, IMAGE_ACCEPT};

/// Content-type assumed when upstream sends none.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A validated upstream image, ready to stream.
pub struct ProxyResult {
    /// Upstream content-type, forwarded verbatim
    pub content_type: String,

    /// Declared length, when upstream sent one
    pub content_length: Option<u64>,

    /// Target URL after parsing
    pub upstream_url: Url,

    /// Image bytes, capped at the configured maximum
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl std::fmt::Debug for ProxyResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyResult")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("upstream_url", &self.upstream_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Fetches remote images on behalf of browser clients.
#[derive(Debug, Clone)]
pub struct ImageProxy {
    client: reqwest::Client,
    guard: HostGuard,
    config: ProxyConfig,
}

impl ImageProxy {
    pub fn new(guard: HostGuard, config: ProxyConfig) -> FetchResult<Self> {
        let client = build_client(&guard, &config.user_agent, config.max_redirects)?;
        Ok(Self {
            client,
            guard,
            config,
        })
    }

    /// Validate `raw_url` and open the upstream image.
    ///
    /// No outbound request is made unless the URL passes the host guard.
    pub async fn fetch(&self, raw_url: Option<&str>) -> Result<ProxyResult, ProxyError> {
        let raw = raw_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ProxyError::MissingUrl)?;

        let target = Url::parse(raw).map_err(|_| ProxyError::InvalidUrl)?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ProxyError::DisallowedScheme(target.scheme().to_string()));
        }

        self.guard.enforce(&target).await.map_err(|e| {
            debug!(url = %target, error = %e, "Proxy target rejected by host guard");
            ProxyError::Blocked(e)
        })?;

        // The timeout covers connect and headers; a slow body keeps streaming.
        let request = self
            .client
            .get(target.clone())
            .header(ACCEPT, IMAGE_ACCEPT)
            .header(REFERER, target.origin().ascii_serialization())
            .send();
        let response = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| {
                ProxyError::Fetch(FetchError::Timeout {
                    url: target.to_string(),
                })
            })?
            .map_err(|e| ProxyError::Fetch(FetchError::from_reqwest(e, target.as_str())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        if !is_image_content_type(&content_type) {
            return Err(ProxyError::NotAnImage { content_type });
        }

        let content_length = response.content_length();
        if let Some(declared) = content_length {
            if declared > self.config.max_bytes {
                return Err(ProxyError::PayloadTooLarge {
                    declared,
                    limit: self.config.max_bytes,
                });
            }
        }

        info!(
            url = %target,
            content_type = %content_type,
            content_length = ?content_length,
            "Proxying image"
        );

        let body = cap_stream(
            response.bytes_stream(),
            self.config.max_bytes,
            target.as_str(),
        );

        Ok(ProxyResult {
            content_type,
            content_length,
            upstream_url: target,
            body,
        })
    }
}

/// Forward chunks until more than `limit` bytes have passed, then end with
/// [`FetchError::BodyTooLarge`].
fn cap_stream<S>(stream: S, limit: u64, url: &str) -> BoxStream<'static, Result<Bytes, FetchError>>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let url = url.to_string();
    stream
        .scan((0u64, false), move |(seen, done), chunk| {
            if *done {
                return futures::future::ready(None);
            }

            let item = match chunk {
                Ok(bytes) => {
                    *seen += bytes.len() as u64;
                    if *seen > limit {
                        debug!(url = %url, limit, "Undeclared body exceeded cap");
                        Err(FetchError::BodyTooLarge { limit })
                    } else {
                        Ok(bytes)
                    }
                }
                Err(e) => Err(FetchError::from_reqwest(e, &url)),
            };

            *done = item.is_err();
            futures::future::ready(Some(item))
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use httpmock::prelude::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_proxy() -> ImageProxy {
        ImageProxy::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ProxyConfig::default(),
        )
        .unwrap()
    }

    async fn collect(body: BoxStream<'static, Result<Bytes, FetchError>>) -> FetchResult<Vec<u8>> {
        let chunks: Vec<Bytes> = body.try_collect().await?;
        Ok(chunks.concat())
    }

    #[tokio::test]
    async fn test_streams_image_unmodified() {
        let server = MockServer::start();
        let png: Vec<u8> = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 1, 2, 3];
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/cover.png")
                .header_exists("referer");
            then.status(200)
                .header("content-type", "image/png")
                .body(png.clone());
        });

        let result = local_proxy()
            .fetch(Some(&server.url("/cover.png")))
            .await
            .unwrap();

        assert_eq!(result.content_type, "image/png");
        assert_eq!(result.content_length, Some(png.len() as u64));
        assert_eq!(result.upstream_url.as_str(), server.url("/cover.png"));
        assert_eq!(collect(result.body).await.unwrap(), png);
        mock.assert();
    }

    #[tokio::test]
    async fn test_missing_and_invalid_urls() {
        let proxy = local_proxy();
        assert!(matches!(proxy.fetch(None).await, Err(ProxyError::MissingUrl)));
        assert!(matches!(proxy.fetch(Some("  ")).await, Err(ProxyError::MissingUrl)));
        assert!(matches!(
            proxy.fetch(Some("not a url")).await,
            Err(ProxyError::InvalidUrl)
        ));
        assert!(matches!(
            proxy.fetch(Some("ftp://example.com/a.png")).await,
            Err(ProxyError::DisallowedScheme(scheme)) if scheme == "ftp"
        ));
    }

    #[tokio::test]
    async fn test_blocked_host_makes_no_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200).header("content-type", "image/png").body("x");
        });

        let proxy = ImageProxy::new(HostGuard::new(), ProxyConfig::default()).unwrap();
        let err = proxy.fetch(Some(&server.url("/a.png"))).await.unwrap_err();

        assert!(matches!(err, ProxyError::Blocked(_)));
        assert_eq!(err.to_string(), "host is not allowed");
        assert_eq!(mock.hits(), 0);
    }

    #[tokio::test]
    async fn test_upstream_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.png");
            then.status(404);
        });

        let err = local_proxy()
            .fetch(Some(&server.url("/missing.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamStatus(404)));
        assert_eq!(err.to_string(), "upstream fetch failed: 404");
    }

    #[tokio::test]
    async fn test_html_upstream_is_not_an_image() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html></html>");
        });

        let err = local_proxy()
            .fetch(Some(&server.url("/page")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProxyError::NotAnImage { ref content_type } if content_type.starts_with("text/html")
        ));
    }

    #[tokio::test]
    async fn test_declared_length_over_cap_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/big.jpg");
            then.status(200)
                .header("content-type", "image/jpeg")
                .body(vec![0u8; 2048]);
        });

        let proxy = ImageProxy::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ProxyConfig::default().with_max_bytes(1024),
        )
        .unwrap();

        let err = proxy.fetch(Some(&server.url("/big.jpg"))).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::PayloadTooLarge {
                declared: 2048,
                limit: 1024
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_a_fetch_error() {
        // Nothing listens on port 1.
        let err = local_proxy()
            .fetch(Some("http://127.0.0.1:1/a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Fetch(_)));
        assert_eq!(err.to_string(), "proxy request failed");
    }

    #[tokio::test]
    async fn test_cap_stream_stops_after_limit() {
        let chunks = vec![
            Ok::<_, reqwest::Error>(Bytes::from_static(b"1234")),
            Ok(Bytes::from_static(b"5678")),
            Ok(Bytes::from_static(b"9")),
            Ok(Bytes::from_static(b"never")),
        ];
        let capped = cap_stream(futures::stream::iter(chunks), 8, "http://img.test/a.png");
        let items: Vec<Result<Bytes, FetchError>> = capped.collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &Bytes::from_static(b"1234"));
        assert_eq!(items[1].as_ref().unwrap(), &Bytes::from_static(b"5678"));
        assert!(matches!(items[2], Err(FetchError::BodyTooLarge { limit: 8 })));
    }

    #[tokio::test]
    async fn test_cap_stream_passes_small_bodies() {
        let chunks = vec![Ok::<_, reqwest::Error>(Bytes::from_static(b"abc"))];
        let capped = cap_stream(futures::stream::iter(chunks), 3, "http://img.test/a.png");
        assert_eq!(collect(capped).await.unwrap(), b"abc".to_vec());
    }

    #[tokio::test]
    async fn test_slow_headers_time_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow.png");
            then.status(200)
                .header("content-type", "image/png")
                .delay(Duration::from_millis(1500))
                .body("png");
        });

        let proxy = ImageProxy::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ProxyConfig::default().with_timeout(Duration::from_millis(300)),
        )
        .unwrap();

        let err = proxy
            .fetch(Some(&server.url("/slow.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Fetch(FetchError::Timeout { .. })), "{:?}", err);
    }

    #[tokio::test]
    async fn test_slow_body_outlives_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: image/png\r\ncontent-length: 8\r\nconnection: close\r\n\r\nslow")
                .await
                .unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(600)).await;
            socket.write_all(b"body").await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let proxy = ImageProxy::new(
            HostGuard::new().allow_host("127.0.0.1"),
            ProxyConfig::default().with_timeout(Duration::from_millis(200)),
        )
        .unwrap();

        let result = proxy
            .fetch(Some(&format!("http://{}/drip.png", addr)))
            .await
            .unwrap();
        assert_eq!(collect(result.body).await.unwrap(), b"slowbody");
    }
}
