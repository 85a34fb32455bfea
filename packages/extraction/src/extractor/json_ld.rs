//! JSON-LD `image` lookup.
//!
//! Blocks are parsed as plain JSON data. Malformed blocks are skipped.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::markup::non_empty;

/// First usable `image` reference across all JSON-LD blocks, in document order.
pub fn find_image(document: &Html) -> Option<String> {
    let selector = Selector::parse("script").ok()?;
    document
        .select(&selector)
        .filter(|script| {
            script
                .value()
                .attr("type")
                .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
                .unwrap_or(false)
        })
        .find_map(|script| image_from_block(&script.text().collect::<String>()))
}

/// Parse one block and return its first `image` reference.
pub fn image_from_block(text: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(text.trim()) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Skipping malformed JSON-LD block");
            return None;
        }
    };

    items(&value).into_iter().find_map(image_field)
}

/// Top-level items plus any `@graph` members, in order.
fn items(value: &Value) -> Vec<&Value> {
    let top: Vec<&Value> = match value {
        Value::Array(entries) => entries.iter().collect(),
        other => vec![other],
    };

    top.into_iter()
        .flat_map(|item| {
            let mut expanded = vec![item];
            if let Some(Value::Array(graph)) = item.get("@graph") {
                expanded.extend(graph.iter());
            }
            expanded
        })
        .collect()
}

fn image_field(item: &Value) -> Option<String> {
    match item.get("image")? {
        Value::Array(entries) => entries.first().and_then(image_reference),
        other => image_reference(other),
    }
}

/// A string, or an `ImageObject` carrying `url`.
fn image_reference(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(Some(s.as_str())),
        Value::Object(_) => non_empty(value.get("url").and_then(Value::as_str)),
        _ => None,
    }
}
