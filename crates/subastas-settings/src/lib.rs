//! # subastas-settings
//!
//! Configuration for the auction client, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`SubastasSettings::default()`]
//! 2. **User file**: `~/.subastas/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SUBASTAS_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::PathBuf;

/// `~/.subastas`, or `/tmp/.subastas` when `HOME` is unset.
pub fn subastas_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".subastas")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_live_under_subastas_home() {
        assert!(settings_path().starts_with(subastas_home()));
        assert!(settings_path().ends_with("settings.json"));
    }
}
