//! OS service registration for the managed client

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::monitoring::Monitoring;
use crate::system::System;
use crate::Result;

const RUNNING_MARKER: &str = "RUNNING";

/// Registers and starts the client service through the service-manager
/// executable, and owns the [`Monitoring`] watching the service's client
pub struct ServiceManager {
    manager_path: PathBuf,
    service_name: String,
    system: Arc<dyn System>,
    monitoring: Monitoring,
}

impl ServiceManager {
    pub fn new(
        manager_path: impl Into<PathBuf>,
        service_name: impl Into<String>,
        system: Arc<dyn System>,
        monitoring: Monitoring,
    ) -> Self {
        Self {
            manager_path: manager_path.into(),
            service_name: service_name.into(),
            system,
            monitoring,
        }
    }

    pub fn manager_path(&self) -> &Path {
        &self.manager_path
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn monitoring(&self) -> &Monitoring {
        &self.monitoring
    }

    pub(crate) fn query_command(&self) -> String {
        format!("sc.exe query \"{}\"", self.service_name)
    }

    pub(crate) fn install_command(&self) -> String {
        let manager = self.manager_path.display();
        format!("\"{manager}\" --do=install && \"{manager}\" --do=start")
    }

    pub(crate) fn start_command(&self) -> String {
        format!("\"{}\" --do=start", self.manager_path.display())
    }

    /// Whether the service is registered and running
    ///
    /// A failing query counts as not installed.
    pub async fn is_installed(&self) -> bool {
        match self.system.exec(&self.query_command()).await {
            Ok(output) => {
                output.contains(&self.service_name) && output.contains(RUNNING_MARKER)
            }
            Err(e) => {
                debug!("Service query for {} failed: {}", self.service_name, e);
                false
            }
        }
    }

    /// Register the service and start it, as one elevated command
    pub async fn install(&self) -> Result<()> {
        info!("Installing service {}", self.service_name);
        self.system.exec_elevated(&self.install_command()).await?;
        Ok(())
    }

    /// Start an already registered service
    pub async fn start(&self) -> Result<()> {
        info!("Starting service {}", self.service_name);
        self.system.exec_elevated(&self.start_command()).await?;
        Ok(())
    }
}
