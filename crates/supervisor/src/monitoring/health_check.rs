//! Periodic health probing of the managed client
//!
//! A single task runs probe → report → sleep. The next probe is armed only
//! after the previous one resolved, so probes never overlap. Stopping wakes
//! the sleeping task; a probe already in flight finishes but its result is
//! dropped. Once `stop()` returns no further result is delivered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use craftnet_ipc_client::IpcClient;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::notifier::{StatusCallback, StatusNotifier};
use crate::Result;

/// One liveness check against the managed client
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn check(&self) -> Result<()>;
}

/// Probe calling the client's `status` method over its local API
pub struct IpcStatusProbe {
    client: IpcClient,
}

impl IpcStatusProbe {
    pub fn new(client: IpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusProbe for IpcStatusProbe {
    async fn check(&self) -> Result<()> {
        let status = self.client.status().await?;
        debug!("Client at {} reports state {}", self.client.endpoint(), status.state);
        Ok(())
    }
}

type SharedCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Default)]
struct Shared {
    callback: Mutex<Option<SharedCallback>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    /// Held while checking the stop flag and running the callback.
    /// Reentrant so a callback may stop its own loop.
    delivery: ReentrantMutex<()>,
}

/// [`StatusNotifier`] driven by a [`StatusProbe`]
pub struct HealthCheckLoop {
    probe: Arc<dyn StatusProbe>,
    interval: Duration,
    timeout: Duration,
    shared: Arc<Shared>,
}

impl HealthCheckLoop {
    pub fn new(probe: Arc<dyn StatusProbe>, interval: Duration, timeout: Duration) -> Self {
        Self {
            probe,
            interval,
            timeout,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.stop_tx.lock().is_some()
    }
}

impl StatusNotifier for HealthCheckLoop {
    /// Probe immediately, then every `interval` after each probe resolves
    ///
    /// Must be called from within a tokio runtime. Starting twice is a no-op.
    fn start(&self) {
        let mut stop_tx = self.shared.stop_tx.lock();
        if stop_tx.is_some() {
            warn!("Health check loop already running");
            return;
        }

        let (tx, rx) = watch::channel(false);
        *stop_tx = Some(tx);
        drop(stop_tx);

        debug!(
            "Starting health checks every {:?} (timeout {:?})",
            self.interval, self.timeout
        );
        tokio::spawn(run_loop(
            self.probe.clone(),
            self.shared.clone(),
            self.interval,
            self.timeout,
            rx,
        ));
    }

    /// Blocks while a result is being delivered on another thread
    fn stop(&self) {
        let Some(tx) = self.shared.stop_tx.lock().take() else {
            return;
        };
        let _ = tx.send(true);
        drop(self.shared.delivery.lock());
        debug!("Health check loop stopped");
    }

    fn on_status(&self, callback: StatusCallback) {
        *self.shared.callback.lock() = Some(Arc::from(callback));
    }
}

impl Drop for HealthCheckLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn probe_once(probe: &dyn StatusProbe, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, probe.check()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("Health probe failed: {}", e);
            false
        }
        Err(_) => {
            debug!("Health probe timed out after {:?}", timeout);
            false
        }
    }
}

async fn run_loop(
    probe: Arc<dyn StatusProbe>,
    shared: Arc<Shared>,
    interval: Duration,
    timeout: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let alive = probe_once(probe.as_ref(), timeout).await;

        {
            let _delivery = shared.delivery.lock();
            if *stop_rx.borrow() {
                debug!("Discarding health probe result after stop");
                break;
            }

            let callback = shared.callback.lock().clone();
            if let Some(callback) = callback {
                callback(alive);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => break,
        }
    }
}
