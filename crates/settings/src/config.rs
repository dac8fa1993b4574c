//! Configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{default_config_dir, default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Managed client binaries and directories
    #[serde(default)]
    pub client: ClientSettings,

    /// OS service registration
    #[serde(default)]
    pub service: ServiceSettings,

    /// Health-check loop timing
    #[serde(default)]
    pub health: HealthSettings,

    /// Status monitoring
    #[serde(default)]
    pub monitoring: MonitoringSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.to_path_buf());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.to_path_buf());
            Ok(settings)
        }
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Path these settings were loaded from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Where the CraftNet client binaries are installed
fn default_install_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        let base =
            std::env::var("ProgramFiles").unwrap_or_else(|_| "C:\\Program Files".to_string());
        PathBuf::from(base).join("CraftNet")
    } else {
        PathBuf::from("/opt/craftnet")
    }
}

fn exe(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Managed client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Client executable run by the service
    #[serde(default = "default_client_bin")]
    pub client_bin: PathBuf,

    /// Client configuration directory
    #[serde(default = "default_client_config_dir")]
    pub config_dir: PathBuf,

    /// Client data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Client runtime directory (sockets, pid files)
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,

    /// Directory for the service's stdout/stderr logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// OpenVPN binary used by the client and for adapter listing
    #[serde(default = "default_openvpn_bin")]
    pub openvpn_bin: PathBuf,

    /// Port of the client's local API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_stderr_file_name")]
    pub stderr_file_name: String,

    #[serde(default = "default_stdout_file_name")]
    pub stdout_file_name: String,

    /// Adapter name expected in `--show-adapters` output once drivers are installed
    #[serde(default = "default_tap_adapter_name")]
    pub tap_adapter_name: String,
}

fn default_client_bin() -> PathBuf {
    default_install_dir().join("bin").join(exe("craftnet-client"))
}

fn default_client_config_dir() -> PathBuf {
    default_config_dir().join("client")
}

fn default_data_dir() -> PathBuf {
    default_config_dir().join("data")
}

fn default_runtime_dir() -> PathBuf {
    default_config_dir().join("run")
}

fn default_log_dir() -> PathBuf {
    default_config_dir().join("logs")
}

fn default_openvpn_bin() -> PathBuf {
    default_install_dir().join("bin").join(exe("openvpn"))
}

fn default_api_port() -> u16 {
    4050
}

fn default_stderr_file_name() -> String {
    "stderr.log".to_string()
}

fn default_stdout_file_name() -> String {
    "stdout.log".to_string()
}

fn default_tap_adapter_name() -> String {
    "Ethernet".to_string()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            client_bin: default_client_bin(),
            config_dir: default_client_config_dir(),
            data_dir: default_data_dir(),
            runtime_dir: default_runtime_dir(),
            log_dir: default_log_dir(),
            openvpn_bin: default_openvpn_bin(),
            api_port: default_api_port(),
            stderr_file_name: default_stderr_file_name(),
            stdout_file_name: default_stdout_file_name(),
            tap_adapter_name: default_tap_adapter_name(),
        }
    }
}

impl ClientSettings {
    pub fn stderr_log_path(&self) -> PathBuf {
        self.log_dir.join(&self.stderr_file_name)
    }

    pub fn stdout_log_path(&self) -> PathBuf {
        self.log_dir.join(&self.stdout_file_name)
    }
}

/// OS service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service registry name
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_display_name")]
    pub display_name: String,

    #[serde(default = "default_description")]
    pub description: String,

    /// Directory holding the service-manager executable, its config and the TAP installer
    #[serde(default = "default_manager_dir")]
    pub manager_dir: PathBuf,
}

fn default_service_name() -> String {
    "CraftNetClient".to_string()
}

fn default_display_name() -> String {
    "CraftNet Client".to_string()
}

fn default_description() -> String {
    "CraftNet Client service".to_string()
}

fn default_manager_dir() -> PathBuf {
    default_install_dir().join("service-manager")
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            display_name: default_display_name(),
            description: default_description(),
            manager_dir: default_manager_dir(),
        }
    }
}

impl ServiceSettings {
    /// Service-manager executable
    pub fn manager_path(&self) -> PathBuf {
        self.manager_dir.join("servicemanager.exe")
    }

    /// Service-manager config file, read by the executable at install time
    pub fn manager_config_path(&self) -> PathBuf {
        self.manager_dir.join("servicemanager.json")
    }

    /// TAP driver installer shipped next to the service manager
    pub fn tap_installer_path(&self) -> PathBuf {
        self.manager_dir.join("tap-windows.exe")
    }
}

/// Health-check loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Delay between the end of one probe and the start of the next
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Hard timeout for a single probe
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_interval_ms() -> u64 {
    1500
}

fn default_probe_timeout_ms() -> u64 {
    500
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Status monitoring settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    /// How long the `wait_for_*` helpers wait before giving up
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl MonitoringSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}
