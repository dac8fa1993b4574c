//! Wiring of the supervisor components from settings

use std::sync::Arc;

use craftnet_ipc_client::{Endpoint, IpcClient};
use craftnet_settings::Settings;
use tracing::debug;

use crate::installer::Installer;
use crate::monitoring::{HealthCheckLoop, IpcStatusProbe, Monitoring, StatusNotifier};
use crate::service_manager::ServiceManager;
use crate::system::System;
use crate::Result;

/// Installer, service manager and monitoring sharing one [`System`]
pub struct Supervisor {
    installer: Installer,
    service_manager: Arc<ServiceManager>,
}

impl Supervisor {
    /// Probe the client's local API on the configured port
    pub fn from_settings(settings: &Settings, system: Arc<dyn System>) -> Result<Self> {
        let endpoint = Endpoint::loopback(settings.client.api_port);
        debug!("Monitoring client at {}", endpoint);

        let probe = Arc::new(IpcStatusProbe::new(IpcClient::new(endpoint)));
        let notifier = Arc::new(HealthCheckLoop::new(
            probe,
            settings.health.interval(),
            settings.health.timeout(),
        ));
        Self::with_notifier(settings, system, notifier)
    }

    /// Use `notifier` instead of the health-check loop
    pub fn with_notifier(
        settings: &Settings,
        system: Arc<dyn System>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Result<Self> {
        let monitoring = Monitoring::with_wait_timeout(notifier, settings.monitoring.wait_timeout());
        let service_manager = Arc::new(ServiceManager::new(
            settings.service.manager_path(),
            settings.service.name.clone(),
            system.clone(),
            monitoring,
        ));
        let installer = Installer::new(
            system,
            &settings.client,
            &settings.service,
            service_manager.clone(),
        )?;

        Ok(Self {
            installer,
            service_manager,
        })
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    pub fn service_manager(&self) -> &ServiceManager {
        &self.service_manager
    }

    pub fn monitoring(&self) -> &Monitoring {
        self.service_manager.monitoring()
    }
}
