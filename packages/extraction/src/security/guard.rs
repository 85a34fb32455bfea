//! Host guard for SSRF protection.
//!
//! The default check is lexical: it looks at the scheme and at the host
//! exactly as written in the URL, without touching the network. Callers that
//! need protection against hostnames resolving to private addresses turn on
//! DNS resolution with [`HostGuard::with_dns_resolution`].

use std::collections::HashSet;
use std::net::IpAddr;

use url::{Host, Url};

use crate::error::{SecurityError, SecurityResult};

/// Ranges checked against resolved addresses in DNS mode.
const DEFAULT_BLOCKED_CIDRS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16", // Link-local / cloud metadata
    "127.0.0.0/8",    // Loopback
    "::/128",
    "::1/128",   // IPv6 loopback
    "fc00::/7",  // IPv6 private
    "fe80::/10", // IPv6 link-local
];

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardVerdict {
    pub allowed: bool,
    pub reason: Option<SecurityError>,
}

impl GuardVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: SecurityError) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    fn from_result(result: SecurityResult<()>) -> Self {
        match result {
            Ok(()) => Self::allow(),
            Err(reason) => Self::deny(reason),
        }
    }
}

/// URL guard applied before every outbound fetch.
///
/// Blocks:
/// - Non-HTTP(S) schemes (file://, ftp://, data:)
/// - Loopback and wildcard hosts (localhost, 127.0.0.1, ::1, 0.0.0.0)
/// - Private IPv4 literals (10.x, 172.16-31.x, 192.168.x), matched by octet pattern
#[derive(Debug, Clone)]
pub struct HostGuard {
    /// Allowed URL schemes
    allowed_schemes: HashSet<String>,

    /// Blocked hostnames
    blocked_hosts: HashSet<String>,

    /// Hosts that bypass every other check
    allowed_hosts: HashSet<String>,

    /// Ranges checked against resolved addresses
    blocked_cidrs: Vec<ipnet::IpNet>,

    /// Resolve hostnames and check the resulting addresses
    resolve_dns: bool,
}

impl Default for HostGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl HostGuard {
    /// Create a guard with the default lexical rules.
    pub fn new() -> Self {
        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: ["localhost", "127.0.0.1", "::1", "0.0.0.0"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_hosts: HashSet::new(),
            blocked_cidrs: DEFAULT_BLOCKED_CIDRS
                .iter()
                .filter_map(|cidr| cidr.parse().ok())
                .collect(),
            resolve_dns: false,
        }
    }

    /// Add an allowed host (bypasses validation).
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(normalize_host(&host.into()));
        self
    }

    /// Block an additional host.
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(normalize_host(&host.into()));
        self
    }

    /// Stop blocking a host by name.
    ///
    /// The host then passes the lexical check but is still resolved and
    /// checked against the blocked ranges in DNS mode.
    pub fn unblock_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.remove(&normalize_host(&host.into()));
        self
    }

    /// Block an additional CIDR range (only consulted in DNS mode).
    pub fn block_cidr(mut self, cidr: ipnet::IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    /// Check resolved addresses as well as the literal host.
    pub fn with_dns_resolution(mut self, enabled: bool) -> Self {
        self.resolve_dns = enabled;
        self
    }

    /// Whether [`HostGuard::enforce`] resolves hostnames.
    pub fn resolves_dns(&self) -> bool {
        self.resolve_dns
    }

    /// Pure lexical check. No I/O.
    pub fn check(&self, url: &Url) -> GuardVerdict {
        GuardVerdict::from_result(self.validate(url))
    }

    /// Lexical check followed by DNS resolution of the host.
    pub async fn check_resolved(&self, url: &Url) -> GuardVerdict {
        GuardVerdict::from_result(self.validate_with_dns(url).await)
    }

    /// Apply whichever mode this guard is configured for.
    pub async fn enforce(&self, url: &Url) -> SecurityResult<()> {
        if self.resolve_dns {
            self.validate_with_dns(url).await
        } else {
            self.validate(url)
        }
    }

    /// Validate scheme and host literal.
    pub fn validate(&self, url: &Url) -> SecurityResult<()> {
        if !self.allowed_schemes.contains(url.scheme()) {
            return Err(SecurityError::DisallowedScheme(url.scheme().to_string()));
        }

        let host = normalize_host(url.host_str().ok_or(SecurityError::NoHost)?);

        if self.allowed_hosts.contains(&host) {
            return Ok(());
        }

        if self.blocked_hosts.contains(&host) {
            return Err(SecurityError::BlockedHost(host));
        }

        if is_private_literal(&host) {
            return Err(SecurityError::PrivateNetwork(host));
        }

        Ok(())
    }

    /// Validate a URL and resolve DNS to check the actual IP.
    ///
    /// This catches hostnames that resolve to internal addresses, which the
    /// lexical check cannot see.
    pub async fn validate_with_dns(&self, url: &Url) -> SecurityResult<()> {
        self.validate(url)?;

        let host = normalize_host(url.host_str().ok_or(SecurityError::NoHost)?);
        if self.allowed_hosts.contains(&host) {
            return Ok(());
        }

        match url.host() {
            Some(Host::Ipv4(ip)) => return self.check_ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => return self.check_ip(IpAddr::V6(ip)),
            _ => {}
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let addrs = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in addrs {
            self.check_ip(addr.ip()).map_err(|_| {
                SecurityError::BlockedCidr(format!(
                    "DNS for {} resolved to blocked IP {}",
                    host,
                    addr.ip()
                ))
            })?;
        }

        Ok(())
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        if self.blocked_cidrs.iter().any(|cidr| cidr.contains(&ip)) {
            return Err(SecurityError::BlockedCidr(ip.to_string()));
        }
        Ok(())
    }
}

/// Check a URL against the default guard.
pub fn is_allowed_target(url: &Url) -> GuardVerdict {
    HostGuard::new().check(url)
}

/// Lowercase, unbracket, and drop one trailing root dot (`localhost.`).
fn normalize_host(host: &str) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase()
}

/// Octet-pattern match: `10.*`, `192.168.*`, `172.16.*` through `172.31.*`.
fn is_private_literal(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    match labels[0] {
        "10" => true,
        "192" => labels.len() > 2 && labels[1] == "168",
        "172" => {
            let second = labels[1];
            labels.len() > 2
                && second.len() == 2
                && second
                    .parse::<u8>()
                    .map(|octet| (16..=31).contains(&octet))
                    .unwrap_or(false)
        }
        _ => false,
    }
}
