//! SSRF protection applied before every outbound request.

pub mod guard;

pub use guard::{is_allowed_target, GuardVerdict, HostGuard};
