//! Reading the admission block out of a Homebridge config file.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::types::AdmissionConfig;

/// Key of the admission block inside a platform entry.
const RATE_LIMIT_KEY: &str = "rateLimit";

/// Loads and validates an `AdmissionConfig` from a JSON file.
///
/// Accepts either a bare admission block or a full Homebridge `config.json`.
/// In the latter case the first platform entry with a `rateLimit` object is
/// used; if no platform has one, the first platform entry itself is read.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, does not
/// deserialize into an `AdmissionConfig`, or fails validation.
pub fn load_config(path: &Path) -> Result<AdmissionConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("Invalid config in {}", path.display()))
}

/// Parses and validates an `AdmissionConfig` from a JSON string.
///
/// # Errors
///
/// See [`load_config`].
pub fn parse_config(raw: &str) -> Result<AdmissionConfig> {
    let document: Value = serde_json::from_str(raw).context("Config is not valid JSON")?;
    let block = select_block(document);

    let config: AdmissionConfig =
        serde_json::from_value(block).context("Failed to deserialize admission config")?;
    config.validate().context("Admission config failed validation")?;

    log::debug!(
        "Loaded admission config: strategy={}, max_requests_per_minute={}, safety_margin={}",
        config.strategy,
        config.max_requests_per_minute,
        config.safety_margin
    );
    Ok(config)
}

fn select_block(document: Value) -> Value {
    let Some(platforms) = document.get("platforms").and_then(Value::as_array) else {
        return document;
    };

    if let Some(block) = platforms
        .iter()
        .find_map(|platform| platform.get(RATE_LIMIT_KEY))
    {
        return block.clone();
    }

    // Platform entries carry unrelated keys (name, credentials); serde ignores them
    platforms.first().cloned().unwrap_or(Value::Object(Default::default()))
}
