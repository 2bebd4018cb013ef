use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / chat_relay.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   chat_relay.toml:  [server]
//                     port = 9000
//
//   env var:          CHAT_SERVER__PORT=9000   (double underscore = nesting)
//
//   (single underscore stays within field names: CHAT_WEBSOCKET__IDLE_TIMEOUT_SECS)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
    #[serde(default)]
    pub store: StoreFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Per-connection tunables (lives under `[websocket]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
    /// 0 disables the idle timeout
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            send_channel_capacity: default_send_channel_capacity(),
            idle_timeout_secs: 0,
        }
    }
}

/// Message history tunables (lives under `[store]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreFileConfig {
    /// 0 keeps every message
    #[serde(default)]
    pub max_messages: usize,
    #[serde(default = "default_seed_demo_history")]
    pub seed_demo_history: bool,
}

impl Default for StoreFileConfig {
    fn default() -> Self {
        Self {
            max_messages: 0,
            seed_demo_history: default_seed_demo_history(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_send_channel_capacity() -> usize {
    256
}
fn default_seed_demo_history() -> bool {
    true
}

/// Build a figment that layers: defaults → config file → CHAT_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CHAT_SERVER__PORT=9000`  →  `server.port = 9000`
///   `CHAT_STORE__MAX_MESSAGES=500`  →  `store.max_messages = 500`
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("CHAT_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Server configuration for runtime behavior.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// WebSocket-related settings
    pub websocket: WebSocketConfig,
    /// Message history settings
    pub store: StoreConfig,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Outbound queue depth per session
    pub send_channel_capacity: usize,
    /// Close idle sessions after this long (None = disabled)
    pub idle_timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Oldest messages are evicted past this count (None = unbounded)
    pub max_messages: Option<usize>,
    /// Start with the demo conversation
    pub seed_demo_history: bool,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            websocket: WebSocketConfig {
                send_channel_capacity: fc.websocket.send_channel_capacity.max(1),
                idle_timeout: if fc.websocket.idle_timeout_secs == 0 {
                    None
                } else {
                    Some(Duration::from_secs(fc.websocket.idle_timeout_secs))
                },
            },
            store: StoreConfig {
                max_messages: if fc.store.max_messages == 0 {
                    None
                } else {
                    Some(fc.store.max_messages)
                },
                seed_demo_history: fc.store.seed_demo_history,
            },
        }
    }
}
