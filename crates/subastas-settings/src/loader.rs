//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SubastasSettings::default()`]
//! 2. If `~/.subastas/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::SubastasSettings;

/// Resolve the path to the settings file (`~/.subastas/settings.json`).
pub fn settings_path() -> PathBuf {
    crate::subastas_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SubastasSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or values that fail
/// [`SubastasSettings::validate`] are errors.
pub fn load_settings_from_path(path: &Path) -> Result<SubastasSettings> {
    let defaults = serde_json::to_value(SubastasSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SubastasSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (the file/default stays).
pub fn apply_env_overrides(settings: &mut SubastasSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Same as [`apply_env_overrides`] with an injectable variable lookup.
pub fn apply_overrides_from(
    settings: &mut SubastasSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: u64, max: u64| {
        let val = lookup(name)?;
        let parsed = parse_u64_range(&val, min, max);
        if parsed.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        parsed
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("SUBASTAS_HTTP_BASE_URL") {
        settings.server.http_base_url = v;
    }
    if let Some(v) = string("SUBASTAS_SOCKET_URL") {
        settings.server.socket_url = v;
    }
    if let Some(v) = ranged("SUBASTAS_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.server.connect_timeout_ms = v;
    }

    // ── Registration ────────────────────────────────────────────────
    if let Some(v) = ranged("SUBASTAS_REPLY_TIMEOUT_MS", 0, 3_600_000) {
        settings.registration.reply_timeout_ms = v;
    }
    if let Some(v) = ranged("SUBASTAS_ADMIN_TIMEOUT_MS", 100, 600_000) {
        settings.registration.admin_request_timeout_ms = v;
    }

    // ── Storage / logging ───────────────────────────────────────────
    if let Some(v) = string("SUBASTAS_STORAGE_PATH") {
        settings.storage.path = Some(v);
    }
    if let Some(v) = string("SUBASTAS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(val) = lookup("SUBASTAS_LOG_JSON") {
        match parse_bool(&val) {
            Some(v) => settings.logging.json = v,
            None => tracing::warn!(key = "SUBASTAS_LOG_JSON", value = %val, "invalid boolean env var, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
