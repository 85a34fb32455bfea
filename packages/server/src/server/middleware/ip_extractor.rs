use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Extension key for storing extracted IP address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Middleware to extract client IP address from request
///
/// Priority:
/// 1. X-Forwarded-For header (for requests through proxies)
/// 2. X-Real-IP header (for Nginx)
/// 3. ConnectInfo socket address (direct connection)
///
/// Nothing is stored when none of these yields an address.
pub async fn extract_client_ip(mut request: Request, next: Next) -> Response {
    let socket = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = client_ip_from_headers(request.headers()).or(socket) {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}

fn client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    // X-Forwarded-For is a comma-separated list; the first entry is the client
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// Rate-limit key for `scope`, e.g. `covers:203.0.113.7`.
pub fn rate_limit_key(scope: &str, client: Option<ClientIp>) -> String {
    match client {
        Some(ClientIp(ip)) => format!("{}:{}", scope, ip),
        None => format!("{}:unknown", scope),
    }
}
