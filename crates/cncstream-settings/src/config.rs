//! Configuration for cncstream
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats; the default file lives in the
//! platform configuration directory.
//!
//! Configuration is organized into logical sections:
//! - Network servers (one optional section per streaming protocol)
//! - Runtime settings (tick interval, log forwarding buffer)

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default status report period
pub const DEFAULT_REPORT_PERIOD_MS: u32 = 1000;

/// Settings shared by the batch, realtime and log servers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// TCP port; 0 leaves the server disabled
    pub port: u16,
}

/// Status server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusServerSettings {
    /// TCP port; 0 leaves the server disabled
    pub port: u16,
    /// Interval between status snapshots in milliseconds
    pub report_period_ms: u32,
}

impl Default for StatusServerSettings {
    fn default() -> Self {
        Self {
            port: 0,
            report_period_ms: DEFAULT_REPORT_PERIOD_MS,
        }
    }
}

/// Upload server settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadServerSettings {
    /// TCP port; 0 leaves the server disabled
    pub port: u16,
    /// Directory uploaded files are stored under
    pub root: PathBuf,
    /// Optional cap on the bytes stored under `root`
    pub quota_bytes: Option<u64>,
}

/// Network server sections
///
/// Each present section with a non-zero port starts one listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Streams G-code lines through repeated POST requests
    pub http_batch_server: Option<ServerSettings>,
    /// Accepts realtime control codes
    pub http_realtime_server: Option<ServerSettings>,
    /// Pushes log output to the peer
    pub http_log_server: Option<ServerSettings>,
    /// Pushes periodic status snapshots to the peer
    pub http_status_server: Option<StatusServerSettings>,
    /// Stores uploads on the SD card
    pub http_sd_upload_server: Option<UploadServerSettings>,
    /// Stores uploads on the local flash filesystem
    pub http_localfs_upload_server: Option<UploadServerSettings>,
}

impl NetworkSettings {
    /// Enabled servers and their ports, in dispatch order
    pub fn enabled_ports(&self) -> Vec<(&'static str, u16)> {
        let candidates = [
            ("http_batch_server", self.http_batch_server.as_ref().map(|s| s.port)),
            ("http_log_server", self.http_log_server.as_ref().map(|s| s.port)),
            ("http_realtime_server", self.http_realtime_server.as_ref().map(|s| s.port)),
            ("http_status_server", self.http_status_server.as_ref().map(|s| s.port)),
            ("http_sd_upload_server", self.http_sd_upload_server.as_ref().map(|s| s.port)),
            (
                "http_localfs_upload_server",
                self.http_localfs_upload_server.as_ref().map(|s| s.port),
            ),
        ];
        candidates
            .into_iter()
            .filter_map(|(name, port)| port.filter(|p| *p != 0).map(|p| (name, p)))
            .collect()
    }

    /// Validate the network sections
    pub fn validate(&self) -> ConfigResult<()> {
        let enabled = self.enabled_ports();
        for (i, (first, port)) in enabled.iter().enumerate() {
            if let Some((second, _)) = enabled[i + 1..].iter().find(|(_, p)| p == port) {
                return Err(ConfigError::PortConflict {
                    port: *port,
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }

        for (name, upload) in [
            ("http_sd_upload_server", &self.http_sd_upload_server),
            ("http_localfs_upload_server", &self.http_localfs_upload_server),
        ] {
            if let Some(upload) = upload {
                if upload.port != 0 && upload.root.as_os_str().is_empty() {
                    return Err(ConfigError::MissingKey(format!("network.{}.root", name)));
                }
            }
        }

        Ok(())
    }
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Interval between cooperative ticks in milliseconds
    pub tick_interval_ms: u64,
    /// Bytes of log output buffered for log channels between ticks
    pub log_buffer_bytes: usize,
    /// Default log filter when RUST_LOG is not set
    pub log_level: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5,
            log_buffer_bytes: 16 * 1024,
            log_level: "info".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network servers
    pub network: NetworkSettings,
    /// Runtime settings
    pub runtime: RuntimeSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/cncstream/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("cncstream").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".into())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()).into());
        };

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()).into());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.runtime.tick_interval_ms == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "runtime.tick_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }

        self.network.validate()
    }
}
