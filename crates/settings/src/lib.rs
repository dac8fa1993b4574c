//! CraftNet Settings
//!
//! Configuration for the client supervisor: where the managed client and
//! its helpers live, how the OS service is named, and how often the client
//! is probed.
//!
//! ## Usage
//!
//! ```no_run
//! use craftnet_settings::Settings;
//!
//! // Load or create default settings
//! let mut settings = Settings::load_or_default()?;
//!
//! // Probe the client less aggressively
//! settings.health.interval_ms = 3000;
//!
//! settings.save()?;
//! # Ok::<(), craftnet_settings::SettingsError>(())
//! ```

mod config;

pub use config::{ClientSettings, HealthSettings, MonitoringSettings, ServiceSettings, Settings};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Platform configuration directory for CraftNet
///
/// `%APPDATA%\CraftNet` on Windows, `$XDG_CONFIG_HOME/craftnet` or
/// `~/.config/craftnet` elsewhere.
pub fn default_config_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        let base = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        return PathBuf::from(base).join("CraftNet");
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("craftnet");
        }
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".config").join("craftnet")
}

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("supervisor.json")
}
