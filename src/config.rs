use crate::input::PollerSettings;
use crate::mapping::store::MAPPING_FILE;
use crate::relay::HeartbeatSettings;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "rc-relay";
const CONFIG_FILE: &str = "relay.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub heartbeat: HeartbeatConfig,
    pub gamepad: GamepadConfig,
    pub ui: UiConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub tick_interval_ms: u64,
    pub liveness_window_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            liveness_window_ms: 5000,
        }
    }
}

impl HeartbeatConfig {
    pub fn settings(&self) -> HeartbeatSettings {
        HeartbeatSettings {
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            liveness_window: Duration::from_millis(self.liveness_window_ms),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub poll_interval_ms: u64,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16,
        }
    }
}

impl GamepadConfig {
    pub fn settings(&self) -> PollerSettings {
        PollerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl RelayConfig {
    /// `<config dir>/rc-relay`, or `./rc-relay` when the platform has none.
    pub fn default_dir() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        base.join(CONFIG_DIR)
    }

    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }

    /// The mapping file sits next to the relay config.
    pub fn mapping_path(dir: &Path) -> PathBuf {
        dir.join(MAPPING_FILE)
    }

    /// `server.host` must be an IPv4 or IPv6 literal.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|e| eyre!("Invalid listen host {}: {}", self.server.host, e))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Writes the default config if `dir` has none yet.
    pub async fn ensure_default(dir: &Path) -> Result<()> {
        let path = Self::file_path(dir);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        Self::default().save(&path).await
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Reads `relay.toml` from `dir`. A missing, unreadable or corrupt file
    /// yields the defaults.
    pub async fn load_or_default(dir: &Path) -> Self {
        let path = Self::file_path(dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {} does not exist, using default", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read config file {}: {}, using default", path.display(), e);
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse config file {}: {}, using default", path.display(), e);
                Self::default()
            }
        }
    }
}
