// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use cover_extraction::{HostGuard, InMemoryRateLimiter, RateLimiter};
use server_core::{
    server::{build_app, AxumAppState},
    Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cover_extraction=debug,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cover extraction API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        guard_resolve_dns = config.guard_resolve_dns,
        "Configuration loaded"
    );

    let guard = HostGuard::new().with_dns_resolution(config.guard_resolve_dns);

    // Rate limiter shared by all endpoints; idle keys are dropped periodically
    let limiter = Arc::new(InMemoryRateLimiter::new());
    let retain_interval = config
        .proxy_rate_limit
        .window
        .max(config.extract_rate_limit.window)
        .max(std::time::Duration::from_secs(1));
    spawn_retain_task(limiter.clone(), retain_interval);

    let rate_limiter: Arc<dyn RateLimiter> = limiter;
    let state = AxumAppState::new(&config, guard, rate_limiter)
        .context("Failed to build application state")?;

    // Build application
    let app = build_app(state, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn spawn_retain_task(limiter: Arc<InMemoryRateLimiter>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            limiter.retain_recent();
            tracing::debug!(
                tracked_keys = limiter.tracked_keys(),
                "Dropped idle rate limit keys"
            );
        }
    });
}
