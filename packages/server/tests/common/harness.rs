//! Test harness driving the router in-process.
//!
//! Requests go through `tower::ServiceExt::oneshot`, so no socket is bound
//! for the server itself; upstream sites are played by `httpmock`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, Response},
    Router,
};
use cover_extraction::{HostGuard, InMemoryRateLimiter, IndexSource, RateLimiter};
use server_core::{
    server::{build_app, AxumAppState},
    Config,
};
use tower::ServiceExt;

/// Address tests claim to come from.
pub const CLIENT_IP: &str = "203.0.113.7";

/// Router plus the knobs tests need.
pub struct TestApp {
    router: Router,
}

impl TestApp {
    /// App whose guard admits the loopback mock servers.
    pub fn local() -> Self {
        Self::with_limiter(Arc::new(InMemoryRateLimiter::new()))
    }

    /// Local app consulting the given limiter.
    pub fn with_limiter(limiter: Arc<dyn RateLimiter>) -> Self {
        Self::build(HostGuard::new().allow_host("127.0.0.1"), limiter, &Config::default())
    }

    /// App with the production guard; loopback targets are refused.
    pub fn strict() -> Self {
        Self::build(
            HostGuard::new(),
            Arc::new(InMemoryRateLimiter::new()),
            &Config::default(),
        )
    }

    pub fn build(guard: HostGuard, limiter: Arc<dyn RateLimiter>, config: &Config) -> Self {
        Self::from_state(
            AxumAppState::new(config, guard, limiter).expect("Failed to build app state"),
            config,
        )
    }

    /// Local app that can also harvest `source`.
    pub fn with_index_source(source: IndexSource, limiter: Arc<dyn RateLimiter>) -> Self {
        let config = Config::default();
        let state = AxumAppState::new(&config, HostGuard::new().allow_host("127.0.0.1"), limiter)
            .expect("Failed to build app state")
            .with_index_source(source);
        Self::from_state(state, &config)
    }

    fn from_state(state: AxumAppState, config: &Config) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            router: build_app(state, &config.allowed_origins),
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::get(uri)
            .header("x-forwarded-for", CLIENT_IP)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        let request = Request::post(uri)
            .header("x-forwarded-for", CLIENT_IP)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

/// Proxy URI for an upstream image URL.
pub fn proxy_uri(target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/api/image-proxy?url={}", encoded)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Body is not JSON")
}
