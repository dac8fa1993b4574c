//! CraftNet Client Supervisor
//!
//! Keeps the CraftNet client installed as an OS service and watches whether
//! it is alive.
//!
//! ## Components
//!
//! - **Installer**: reconciles the service-manager config file, the service
//!   registration and the TAP drivers with the desired state
//! - **ServiceManager**: queries, installs and starts the client service
//! - **Monitoring**: turns periodic health probes into up/down/change events
//! - **HealthCheckLoop**: probes the client's local API (`status` method)
//! - **Publisher**: typed event channel with unsubscribe handles
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use craftnet_settings::Settings;
//! use craftnet_supervisor::{OsSystem, Supervisor};
//!
//! # async fn run() -> craftnet_supervisor::Result<()> {
//! let settings = Settings::load_or_default()?;
//! let supervisor = Supervisor::from_settings(&settings, Arc::new(OsSystem::new()))?;
//!
//! if supervisor.installer().needs_installation().await {
//!     supervisor.installer().install().await?;
//! }
//!
//! supervisor.monitoring().start();
//! supervisor.monitoring().wait_for_status_up_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod installer;
pub mod monitoring;
mod publisher;
mod service_manager;
mod supervisor;
mod system;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{client_arguments, LoggingConfig, ServiceManagerConfig};
pub use error::{InstallStep, InstallStepError, Result, SupervisorError};
pub use events::{first_event, first_event_or_timeout, subscribe_once, EventCallback, EventFuture};
pub use installer::{InstalledServiceState, Installer};
pub use monitoring::{Monitoring, ServiceStatus};
pub use publisher::{Callback, Publisher, Subscription};
pub use service_manager::ServiceManager;
pub use supervisor::Supervisor;
pub use system::{OsSystem, System};
