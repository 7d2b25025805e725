/// Config schema types (server, sessions, dispatch, media, sidecar).
use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub server: ServerConfig,
    pub sessions: SessionsConfig,
    pub dispatch: DispatchConfig,
    pub media: MediaConfig,
    pub whatsapp: WhatsAppSidecarConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 3000.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Session registry and lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Directory holding one sub-directory of auth material per session.
    /// Defaults to `<data_dir>/sessions`.
    pub auth_dir: Option<PathBuf>,
    /// Seconds a session may stay `initializing` before it is marked `timeout`.
    pub init_timeout_secs: u64,
    /// Recreate a session for every auth directory found at startup.
    pub restore_on_startup: bool,
    /// Legacy names that map to a historical internal id.
    ///
    /// Consulted only after exact and normalized lookups miss, and only if the
    /// target id is currently registered.
    pub aliases: HashMap<String, String>,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            auth_dir: None,
            init_timeout_secs: 60,
            restore_on_startup: false,
            aliases: HashMap::new(),
        }
    }
}

/// Outbound message policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Country code prefixed to bare national numbers.
    pub default_country_code: String,
    /// Digits in a national number without its country code.
    pub national_number_length: usize,
    /// Suffix appended to a normalized number to form a chat address.
    pub address_suffix: String,
    /// Upper bound on a single send call to the messaging client.
    pub send_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_country_code: "91".into(),
            national_number_length: 10,
            address_suffix: "@c.us".into(),
            send_timeout_secs: 60,
        }
    }
}

/// Remote media download limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Largest accepted body, in bytes.
    pub max_bytes: u64,
    /// Whole-request timeout for a media download.
    pub fetch_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            fetch_timeout_secs: 30,
        }
    }
}

/// WhatsApp Web sidecar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppSidecarConfig {
    /// Directory containing the sidecar's `package.json`.
    pub sidecar_dir: Option<PathBuf>,
    /// Local port the sidecar WebSocket server listens on.
    pub port: u16,
    /// Spawn and supervise the sidecar process. Disable to run it by hand.
    pub auto_start: bool,
    /// Timeout for a single request/response exchange with the sidecar.
    pub request_timeout_secs: u64,
}

impl Default for WhatsAppSidecarConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: None,
            port: 18_802,
            auto_start: true,
            request_timeout_secs: 30,
        }
    }
}
