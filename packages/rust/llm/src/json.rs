//! Tolerant JSON extraction from model output.
//!
//! Models wrap JSON in a fenced ```` ```json ```` block about as often as they
//! emit it bare. Both shapes are accepted; anything else is a decode error
//! for the caller to retry on.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use researchkit_shared::Result;

/// Matches the first ```` ```json ... ``` ```` block, body captured lazily.
static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("fenced json regex")
});

/// Extract and parse the JSON payload of `text`.
///
/// The first fenced `json` block wins; without one the whole input is parsed.
/// Objects and arrays are both valid top-level shapes.
pub fn extract_json(text: &str) -> Result<Value> {
    let payload = match FENCED_JSON_RE.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => text.trim(),
    };
    Ok(serde_json::from_str(payload)?)
}

/// [`extract_json`] followed by typed deserialization.
pub fn extract_json_as<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json(text)?;
    Ok(serde_json::from_value(value)?)
}
