//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so a partial user file only needs
//! the keys it overrides.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubastasSettings {
    /// Auction server endpoints.
    pub server: ServerSettings,
    /// Registration flow tuning.
    pub registration: RegistrationSettings,
    /// Local persistence.
    pub storage: StorageSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl SubastasSettings {
    /// Reject values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        let http = &self.server.http_base_url;
        if !(http.starts_with("http://") || http.starts_with("https://")) {
            return Err(SettingsError::InvalidValue(format!(
                "server.httpBaseUrl must be an http(s) URL, got {http:?}"
            )));
        }
        let ws = &self.server.socket_url;
        if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
            return Err(SettingsError::InvalidValue(format!(
                "server.socketUrl must be a ws(s) URL, got {ws:?}"
            )));
        }
        Ok(())
    }
}

/// Auction server endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Base URL for HTTP calls (admin login).
    pub http_base_url: String,
    /// Socket.IO WebSocket endpoint.
    pub socket_url: String,
    /// How long to wait for the socket connection to open, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_base_url: "http://localhost:3001".to_string(),
            socket_url: "ws://localhost:3001/socket.io/?EIO=4&transport=websocket".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl ServerSettings {
    /// Limit on the socket connect plus namespace handshake.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Registration flow tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationSettings {
    /// How long a bidder registration waits for its reply. `0` waits forever.
    pub reply_timeout_ms: u64,
    /// Timeout of the admin login HTTP call.
    pub admin_request_timeout_ms: u64,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 30_000,
            admin_request_timeout_ms: 15_000,
        }
    }
}

impl RegistrationSettings {
    /// `None` when the wait is unbounded.
    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }

    /// Limit on one admin login call.
    pub fn admin_request_timeout(&self) -> Duration {
        Duration::from_millis(self.admin_request_timeout_ms)
    }
}

/// Local persistence.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// SQLite file holding the session identity. Defaults to
    /// `~/.subastas/session.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StorageSettings {
    /// Configured path, or the default under the subastas home.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map_or_else(|| crate::subastas_home().join("session.db"), PathBuf::from)
    }
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`..`error`). `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module overrides, e.g. `{"subastas_transport": "debug"}`.
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            module_levels: BTreeMap::new(),
        }
    }
}
