use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::hub::DEFAULT_OUTBOX_CAPACITY;

// =============================================================================
// File config (figment-deserialized from defaults / chat_relay.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   chat_relay.toml:  [server]
//                     port = 9000
//
//   env var:          CHAT_RELAY_SERVER__PORT=9000   (double underscore = nesting)
//
//   CLI flag:         --port 9000                    (wins over both)

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "chat_relay.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
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

/// Chat tunables (lives under `[chat]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFileConfig {
    /// Frames a connection may have queued before it counts as too slow
    /// and is dropped.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Default for ChatFileConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_outbox_capacity() -> usize {
    DEFAULT_OUTBOX_CAPACITY
}

/// Build a figment that layers: defaults → config file → CHAT_RELAY_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CHAT_RELAY_SERVER__HOST=0.0.0.0`  →  `server.host = "0.0.0.0"`
///   `CHAT_RELAY_CHAT__OUTBOX_CAPACITY=64`  →  `chat.outbox_capacity = 64`
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("CHAT_RELAY_").split("__"))
}

/// Values given on the command line. They override every other layer.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub outbox_capacity: Option<usize>,
}

// =============================================================================
// Runtime config (derived from FileConfig + overrides)
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen_addr: SocketAddr,
    pub outbox_capacity: usize,
}

impl RelayConfig {
    pub fn from_file(fc: &FileConfig, overrides: &ConfigOverrides) -> Result<Self> {
        let host = overrides.host.as_deref().unwrap_or(&fc.server.host);
        let port = overrides.port.unwrap_or(fc.server.port);
        let listen_addr = format!("{}:{}", host, port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        let outbox_capacity = overrides
            .outbox_capacity
            .unwrap_or(fc.chat.outbox_capacity);
        if outbox_capacity == 0 {
            bail!("chat.outbox_capacity must be at least 1");
        }

        Ok(Self {
            listen_addr,
            outbox_capacity,
        })
    }

    /// Resolve the full configuration.
    ///
    /// An explicitly requested config file must exist; the default one is
    /// optional.
    pub fn load(config_path: Option<PathBuf>, overrides: &ConfigOverrides) -> Result<Self> {
        let path = match config_path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {:?}", path);
                }
                path
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let fc: FileConfig = load_config(&path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        let config = Self::from_file(&fc, overrides)?;
        info!(
            "Configuration: listen={} outbox_capacity={}",
            config.listen_addr, config.outbox_capacity
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_file_config_defaults() {
        let d = FileConfig::default();
        assert_eq!(d.server.host, "127.0.0.1");
        assert_eq!(d.server.port, 8000);
        assert_eq!(d.chat.outbox_capacity, 256);
    }

    // ── RelayConfig::from_file ──────────────────────────────────────────

    #[test]
    fn test_relay_config_from_defaults() {
        let rc = RelayConfig::from_file(&FileConfig::default(), &ConfigOverrides::default())
            .unwrap();
        assert_eq!(rc.listen_addr, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(rc.outbox_capacity, 256);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = ConfigOverrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(9000),
            outbox_capacity: Some(16),
        };
        let rc = RelayConfig::from_file(&FileConfig::default(), &overrides).unwrap();
        assert_eq!(rc.listen_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(rc.outbox_capacity, 16);
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let overrides = ConfigOverrides {
            host: Some("not a host".to_string()),
            ..Default::default()
        };
        assert!(RelayConfig::from_file(&FileConfig::default(), &overrides).is_err());
    }

    #[test]
    fn test_zero_outbox_is_rejected() {
        let overrides = ConfigOverrides {
            outbox_capacity: Some(0),
            ..Default::default()
        };
        assert!(RelayConfig::from_file(&FileConfig::default(), &overrides).is_err());
    }

    // ── load_config ─────────────────────────────────────────────────────

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(&tmp.path().join("absent.toml"))
            .extract()
            .unwrap();
        assert_eq!(fc.server.port, 8000);
        assert_eq!(fc.chat.outbox_capacity, 256);
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chat_relay.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"0.0.0.0\"\nport = 8080\n\n[chat]\noutbox_capacity = 32\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(&path).extract().unwrap();
        assert_eq!(fc.server.host, "0.0.0.0");
        assert_eq!(fc.server.port, 8080);
        assert_eq!(fc.chat.outbox_capacity, 32);
    }

    #[test]
    fn test_load_config_partial_toml_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chat_relay.toml");
        std::fs::write(&path, "[server]\nport = 9001\n").unwrap();
        let fc: FileConfig = load_config(&path).extract().unwrap();
        assert_eq!(fc.server.host, "127.0.0.1");
        assert_eq!(fc.server.port, 9001);
        assert_eq!(fc.chat.outbox_capacity, 256);
    }

    #[test]
    fn test_load_requires_explicit_file_to_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let result = RelayConfig::load(
            Some(tmp.path().join("missing.toml")),
            &ConfigOverrides::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_file_with_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("relay.toml");
        std::fs::write(&path, "[server]\nport = 7000\n").unwrap();
        let overrides = ConfigOverrides {
            port: Some(7001),
            ..Default::default()
        };
        let rc = RelayConfig::load(Some(path), &overrides).unwrap();
        assert_eq!(rc.listen_addr.port(), 7001);
    }
}
