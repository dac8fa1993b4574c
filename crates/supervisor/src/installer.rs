//! Reconciles the machine with the desired service installation
//!
//! Three independent conditions make an installation complete:
//!
//! 1. the service-manager config file matches the canonical config exactly
//! 2. the client service is registered and running
//! 3. the TAP network drivers are present
//!
//! A condition that cannot be evaluated (unreadable file, failing command)
//! counts as not satisfied.

use std::path::PathBuf;
use std::sync::Arc;

use craftnet_settings::{ClientSettings, ServiceSettings};
use tracing::{debug, info, warn};

use crate::config::ServiceManagerConfig;
use crate::error::{InstallStep, InstallStepError};
use crate::service_manager::ServiceManager;
use crate::system::System;
use crate::{Result, SupervisorError};

/// Result of evaluating the three conditions, computed fresh on every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledServiceState {
    pub config_matches: bool,
    pub service_installed: bool,
    pub drivers_installed: bool,
}

impl InstalledServiceState {
    pub fn is_complete(&self) -> bool {
        self.config_matches && self.service_installed && self.drivers_installed
    }
}

pub struct Installer {
    system: Arc<dyn System>,
    service_manager: Arc<ServiceManager>,
    config_path: PathBuf,
    canonical_config: String,
    openvpn_bin: PathBuf,
    adapter_name: String,
    tap_installer: PathBuf,
}

impl Installer {
    pub fn new(
        system: Arc<dyn System>,
        client: &ClientSettings,
        service: &ServiceSettings,
        service_manager: Arc<ServiceManager>,
    ) -> Result<Self> {
        let canonical_config =
            ServiceManagerConfig::from_settings(client, service).to_canonical_json()?;

        Ok(Self {
            system,
            service_manager,
            config_path: service.manager_config_path(),
            canonical_config,
            openvpn_bin: client.openvpn_bin.clone(),
            adapter_name: client.tap_adapter_name.clone(),
            tap_installer: service.tap_installer_path(),
        })
    }

    /// Exact bytes the config file is expected to hold
    pub fn canonical_config(&self) -> &str {
        &self.canonical_config
    }

    pub fn service_manager(&self) -> &Arc<ServiceManager> {
        &self.service_manager
    }

    fn adapters_command(&self) -> String {
        format!("\"{}\" --show-adapters", self.openvpn_bin.display())
    }

    fn tap_installer_command(&self) -> String {
        format!("\"{}\"", self.tap_installer.display())
    }

    async fn config_matches(&self) -> bool {
        match self.system.read_file(&self.config_path).await {
            Ok(Some(content)) => content == self.canonical_config,
            Ok(None) => {
                debug!("Service-manager config {:?} is missing", self.config_path);
                false
            }
            Err(e) => {
                debug!("Could not read service-manager config: {}", e);
                false
            }
        }
    }

    async fn drivers_installed(&self) -> bool {
        match self.system.exec_as_user(&self.adapters_command()).await {
            Ok(output) => output.contains(&self.adapter_name),
            Err(e) => {
                debug!("Adapter listing failed: {}", e);
                false
            }
        }
    }

    /// Evaluate every condition, in order, without changing anything
    pub async fn inspect(&self) -> InstalledServiceState {
        let state = InstalledServiceState {
            config_matches: self.config_matches().await,
            service_installed: self.service_manager.is_installed().await,
            drivers_installed: self.drivers_installed().await,
        };
        debug!("Installation state: {:?}", state);
        state
    }

    pub async fn needs_installation(&self) -> bool {
        !self.inspect().await.is_complete()
    }

    /// Fix every unsatisfied condition
    ///
    /// Each needed step is attempted even when an earlier one failed. On
    /// success returns the state found before any step ran; otherwise fails
    /// with [`SupervisorError::Installation`] listing every failed step.
    pub async fn install(&self) -> Result<InstalledServiceState> {
        let state = self.inspect().await;
        if state.is_complete() {
            info!("Service installation is up to date");
            return Ok(state);
        }

        let mut failures = Vec::new();

        if !state.config_matches {
            info!("Writing service-manager config to {:?}", self.config_path);
            if let Err(e) = self
                .system
                .write_file(&self.config_path, &self.canonical_config)
                .await
            {
                failures.push(step_failed(InstallStep::WriteConfig, e));
            }
        }

        if !state.service_installed {
            if let Err(e) = self.service_manager.install().await {
                failures.push(step_failed(InstallStep::InstallService, e));
            }
        }

        if !state.drivers_installed {
            info!("Installing TAP drivers");
            if let Err(e) = self
                .system
                .exec_elevated(&self.tap_installer_command())
                .await
            {
                failures.push(step_failed(InstallStep::InstallDrivers, e));
            }
        }

        if failures.is_empty() {
            Ok(state)
        } else {
            Err(SupervisorError::Installation(failures))
        }
    }
}

fn step_failed(step: InstallStep, error: SupervisorError) -> InstallStepError {
    warn!("Installation step '{}' failed: {}", step, error);
    InstallStepError {
        step,
        error: Box::new(error),
    }
}
