use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with {}: {stderr}", exit_code_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Health probe failed: {0}")]
    Probe(String),

    #[error("Timed out after {0:?} waiting for status")]
    WaitTimeout(Duration),

    #[error("Status source closed before an event arrived")]
    StatusSourceClosed,

    #[error("Installation failed: {}", InstallFailures(.0))]
    Installation(Vec<InstallStepError>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] craftnet_settings::SettingsError),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

impl SupervisorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure usually needs an administrator to resolve
    pub fn needs_elevation(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::PermissionDenied,
            Self::CommandFailed { .. } | Self::CommandSpawn { .. } => true,
            Self::Installation(steps) => steps.iter().any(|s| s.error.needs_elevation()),
            _ => false,
        }
    }
}

impl From<craftnet_ipc_client::IpcError> for SupervisorError {
    fn from(e: craftnet_ipc_client::IpcError) -> Self {
        Self::Probe(e.to_string())
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code".to_string(),
    }
}

/// Corrective action attempted by the installer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    WriteConfig,
    InstallService,
    InstallDrivers,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::WriteConfig => "write service-manager config",
            Self::InstallService => "install service",
            Self::InstallDrivers => "install network drivers",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
#[error("{step}: {error}")]
pub struct InstallStepError {
    pub step: InstallStep,
    #[source]
    pub error: Box<SupervisorError>,
}

struct InstallFailures<'a>(&'a [InstallStepError]);

impl fmt::Display for InstallFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}
