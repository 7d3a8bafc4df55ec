//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so partial JSON files work — missing fields get their compiled default.

use serde::{Deserialize, Serialize};

/// Root settings type for the moot service.
///
/// Loaded from `~/.moot/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MootSettings {
    /// Server network and persistence settings.
    pub server: ServerSettings,
    /// Agent overrides passed through to the LLM layer (opaque here).
    pub agent: AgentSettings,
}

/// Server network and persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address for browser session servers and the control plane.
    pub host: String,
    /// Control-plane port (`0` for auto-assign).
    pub port: u16,
    /// Port for per-session browser servers (`0` for ephemeral, the default).
    pub session_port: u16,
    /// Directory holding persisted brainstorm state files.
    pub state_dir: String,
    /// Skip launching the platform browser (testing only).
    pub skip_browser: bool,
    /// Maximum concurrent control-plane WebSocket connections.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            session_port: 0,
            state_dir: format!("{home}/.moot/state"),
            skip_browser: false,
            max_connections: 50,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// Agent overrides (model, temperature, anything else the LLM layer
/// understands). Opaque to the coordination core.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Model identifier override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Any further overrides, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
