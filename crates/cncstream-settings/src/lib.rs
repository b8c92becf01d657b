//! cncstream Settings Crate
//!
//! Handles configuration of the network servers and the runtime loop.

pub mod config;
pub mod error;

pub use config::{
    Config, NetworkSettings, RuntimeSettings, ServerSettings, StatusServerSettings,
    UploadServerSettings, DEFAULT_REPORT_PERIOD_MS,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
