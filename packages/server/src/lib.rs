// Cover Extraction Server - API Core
//
// HTTP surface for the cover extraction library: page metadata extraction,
// direct image link checks, and the SSRF-guarded image proxy.

pub mod config;
pub mod server;

pub use config::*;
