//! Client status monitoring
//!
//! Turns the boolean stream of a [`StatusNotifier`] into five channels:
//!
//! | Channel      | Fires on                                   |
//! |--------------|--------------------------------------------|
//! | level        | every observation, with the value          |
//! | up           | every observation while alive              |
//! | down         | every observation while dead               |
//! | change up    | transition to alive (including from unknown) |
//! | change down  | transition to dead (including from unknown)  |
//!
//! Within one observation the order is level, then up/down, then change.

mod health_check;
mod notifier;

pub use health_check::{HealthCheckLoop, IpcStatusProbe, StatusProbe};
pub use notifier::{StatusCallback, StatusNotifier};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::events::{first_event_or_timeout, EventFuture};
use crate::publisher::{call_isolated, Publisher, Subscription};

/// Default time the `wait_for_*` helpers wait for a qualifying event
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Future returned by the `wait_for_*` helpers
pub type StatusWait = EventFuture<()>;

/// Last known state of the managed process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    /// No probe result yet
    #[default]
    Unknown,
    Up,
    Down,
}

impl From<bool> for ServiceStatus {
    fn from(alive: bool) -> Self {
        if alive {
            Self::Up
        } else {
            Self::Down
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Up => "up",
            Self::Down => "down",
        };
        f.write_str(label)
    }
}

struct Channels {
    status: Publisher<bool>,
    up: Publisher<()>,
    down: Publisher<()>,
    change_up: Publisher<()>,
    change_down: Publisher<()>,
}

struct Inner {
    notifier: Arc<dyn StatusNotifier>,
    last_status: Mutex<ServiceStatus>,
    active: AtomicBool,
    wait_timeout: Duration,
    channels: Channels,
}

impl Inner {
    fn update_status(&self, alive: bool) {
        if !self.active.load(Ordering::SeqCst) {
            debug!("Ignoring status {} after monitoring stopped", alive);
            return;
        }

        let previous = *self.last_status.lock();
        let current = ServiceStatus::from(alive);

        self.channels.status.publish(&alive);

        if alive {
            self.channels.up.publish(&());
        } else {
            self.channels.down.publish(&());
        }

        if current != previous {
            info!("Client status changed: {} -> {}", previous, current);
            if alive {
                self.channels.change_up.publish(&());
            } else {
                self.channels.change_down.publish(&());
            }
        }

        *self.last_status.lock() = current;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.notifier.stop();
        }
    }
}

/// Status monitoring for the managed client process
///
/// Cheap to clone; clones share the same channels and status.
#[derive(Clone)]
pub struct Monitoring {
    inner: Arc<Inner>,
}

impl Monitoring {
    pub fn new(notifier: Arc<dyn StatusNotifier>) -> Self {
        Self::with_wait_timeout(notifier, DEFAULT_WAIT_TIMEOUT)
    }

    pub fn with_wait_timeout(notifier: Arc<dyn StatusNotifier>, wait_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                notifier,
                last_status: Mutex::new(ServiceStatus::Unknown),
                active: AtomicBool::new(false),
                wait_timeout,
                channels: Channels {
                    status: Publisher::new(),
                    up: Publisher::new(),
                    down: Publisher::new(),
                    change_up: Publisher::new(),
                    change_down: Publisher::new(),
                },
            }),
        }
    }

    /// Wire the notifier into the channels and start it
    ///
    /// The notifier only holds a weak reference, so once every `Monitoring`
    /// clone is gone no callback can fire.
    pub fn start(&self) {
        self.inner.active.store(true, Ordering::SeqCst);

        let weak = Arc::downgrade(&self.inner);
        self.inner.notifier.on_status(Box::new(move |alive| {
            if let Some(inner) = weak.upgrade() {
                inner.update_status(alive);
            }
        }));
        self.inner.notifier.start();
    }

    /// Stop the notifier; subscribers stay registered but receive nothing more
    pub fn stop(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.notifier.stop();
    }

    pub fn status(&self) -> ServiceStatus {
        *self.inner.last_status.lock()
    }

    /// Whether the last probe found the client alive
    pub fn is_running(&self) -> bool {
        self.status() == ServiceStatus::Up
    }

    /// Every observation, with its value
    pub fn on_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.channels.status.subscribe(move |alive: &bool| callback(*alive))
    }

    /// Every "up" observation. Fires immediately if the client is already up.
    ///
    /// A panic in the immediate call is logged like one during a publish,
    /// and the callback is still subscribed.
    pub fn on_status_up<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.status() == ServiceStatus::Up {
            replay(&callback);
        }
        self.on_new_status_up(callback)
    }

    /// Every future "up" observation, without replaying the current state
    pub fn on_new_status_up<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.channels.up.subscribe(move |_: &()| callback())
    }

    /// Transitions to up only
    pub fn on_status_change_up<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.channels.change_up.subscribe(move |_: &()| callback())
    }

    /// Every "down" observation. Fires immediately if the client is already down.
    pub fn on_status_down<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.status() == ServiceStatus::Down {
            replay(&callback);
        }
        self.on_new_status_down(callback)
    }

    pub fn on_new_status_down<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.channels.down.subscribe(move |_: &()| callback())
    }

    /// Transitions to down only
    pub fn on_status_change_down<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.channels.change_down.subscribe(move |_: &()| callback())
    }

    /// Resolves once the client is up, immediately if it already is
    pub fn wait_for_status_up_with_timeout(&self) -> StatusWait {
        first_event_or_timeout::<(), _>(
            |cb| self.on_status_up(move || cb(&())),
            self.inner.wait_timeout,
        )
    }

    /// Resolves on the next "up" observation
    pub fn wait_for_new_status_up_with_timeout(&self) -> StatusWait {
        first_event_or_timeout::<(), _>(
            |cb| self.on_new_status_up(move || cb(&())),
            self.inner.wait_timeout,
        )
    }

    /// Resolves once the client is down, immediately if it already is
    pub fn wait_for_status_down_with_timeout(&self) -> StatusWait {
        first_event_or_timeout::<(), _>(
            |cb| self.on_status_down(move || cb(&())),
            self.inner.wait_timeout,
        )
    }

    /// Resolves on the next "down" observation
    pub fn wait_for_new_status_down_with_timeout(&self) -> StatusWait {
        first_event_or_timeout::<(), _>(
            |cb| self.on_new_status_down(move || cb(&())),
            self.inner.wait_timeout,
        )
    }
}

fn replay<F: Fn()>(callback: &F) {
    if !call_isolated(callback) {
        error!("Subscriber panicked while handling the current status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStatusNotifier;
    use crate::SupervisorError;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        (count, move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn started() -> (Arc<MockStatusNotifier>, Monitoring) {
        let notifier = Arc::new(MockStatusNotifier::new());
        let monitoring = Monitoring::new(notifier.clone());
        monitoring.start();
        (notifier, monitoring)
    }

    #[test]
    fn test_start_registers_and_starts_notifier() {
        let (notifier, monitoring) = started();
        assert!(notifier.is_started());
        assert_eq!(monitoring.status(), ServiceStatus::Unknown);

        monitoring.stop();
        assert!(!notifier.is_started());
    }

    #[test]
    fn test_level_channel_sees_every_value() {
        let (notifier, monitoring) = started();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        monitoring.on_status(move |alive| seen_clone.lock().push(alive));

        notifier.report(true);
        notifier.report(true);
        notifier.report(false);

        assert_eq!(*seen.lock(), vec![true, true, false]);
        assert_eq!(monitoring.status(), ServiceStatus::Down);
    }

    #[test]
    fn test_on_status_up_replays_when_already_up() {
        let (notifier, monitoring) = started();
        notifier.report(true);

        let (count, callback) = counter();
        monitoring.on_status_up(callback);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        notifier.report(true);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_on_status_up_does_not_replay_when_down() {
        let (notifier, monitoring) = started();
        notifier.report(false);

        let (count, callback) = counter();
        monitoring.on_status_up(callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_on_new_status_up_skips_current_state() {
        let (notifier, monitoring) = started();
        notifier.report(true);

        let (count, callback) = counter();
        monitoring.on_new_status_up(callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        notifier.report(true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_status_down_replays_when_already_down() {
        let (notifier, monitoring) = started();
        notifier.report(false);

        let (count, callback) = counter();
        monitoring.on_status_down(callback);
        notifier.report(false);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_replay_still_subscribes() {
        let (notifier, monitoring) = started();
        notifier.report(true);
        notifier.report(false);

        let (count, callback) = counter();
        monitoring.on_status_down(move || {
            callback();
            panic!("subscriber failure");
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(monitoring.inner.channels.down.subscriber_count(), 1);

        notifier.report(false);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        let (ups, up_cb) = counter();
        monitoring.on_status_change_up(up_cb);
        notifier.report(true);
        assert_eq!(ups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_change_up_fires_once_per_transition() {
        let (notifier, monitoring) = started();
        let (ups, up_cb) = counter();
        let (downs, down_cb) = counter();
        monitoring.on_status_change_up(up_cb);
        monitoring.on_status_change_down(down_cb);

        notifier.report(false);
        notifier.report(true);
        notifier.report(true);
        notifier.report(true);

        assert_eq!(ups.load(Ordering::SeqCst), 1);
        assert_eq!(downs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_observation_counts_as_change() {
        let (notifier, monitoring) = started();
        let (ups, up_cb) = counter();
        monitoring.on_status_change_up(up_cb);

        notifier.report(true);
        assert_eq!(ups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_edge_channels_fire_on_every_observation() {
        let (notifier, monitoring) = started();
        let (downs, down_cb) = counter();
        monitoring.on_new_status_down(down_cb);

        notifier.report(false);
        notifier.report(false);
        notifier.report(false);

        assert_eq!(downs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_level_then_edge_then_change_order() {
        let (notifier, monitoring) = started();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        monitoring.on_status_change_up(move || o.lock().push("change"));
        let o = order.clone();
        monitoring.on_new_status_up(move || o.lock().push("edge"));
        let o = order.clone();
        monitoring.on_status(move |_| o.lock().push("level"));

        notifier.report(true);
        assert_eq!(*order.lock(), vec!["level", "edge", "change"]);
    }

    #[test]
    fn test_unsubscribe_only_affects_one_channel() {
        let (notifier, monitoring) = started();
        let (edge, edge_cb) = counter();
        let (change, change_cb) = counter();
        let edge_sub = monitoring.on_new_status_up(edge_cb);
        monitoring.on_status_change_up(change_cb);

        edge_sub.unsubscribe();
        edge_sub.unsubscribe();
        notifier.report(true);

        assert_eq!(edge.load(Ordering::SeqCst), 0);
        assert_eq!(change.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_suppresses_late_deliveries() {
        let (notifier, monitoring) = started();
        let (count, callback) = counter();
        monitoring.on_status_change_up(callback);

        monitoring.stop();
        notifier.report(true);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(monitoring.status(), ServiceStatus::Unknown);
    }

    #[test]
    fn test_panicking_subscriber_keeps_state_consistent() {
        let (notifier, monitoring) = started();
        monitoring.on_new_status_up(|| panic!("subscriber failure"));
        let (count, callback) = counter();
        monitoring.on_status_change_up(callback);

        notifier.report(true);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(monitoring.is_running());
    }

    #[test]
    fn test_dropped_monitoring_stops_notifier() {
        let (notifier, monitoring) = started();
        drop(monitoring);

        assert!(!notifier.is_started());
        notifier.report(true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_status_up_resolves_immediately_when_up() {
        let (notifier, monitoring) = started();
        notifier.report(true);

        let started_at = tokio::time::Instant::now();
        monitoring.wait_for_status_up_with_timeout().await.unwrap();
        assert_eq!(started_at.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_status_up_times_out() {
        let (notifier, monitoring) = started();
        notifier.report(false);

        let started_at = tokio::time::Instant::now();
        let result = monitoring.wait_for_status_up_with_timeout().await;

        assert!(matches!(result, Err(SupervisorError::WaitTimeout(_))));
        assert_eq!(started_at.elapsed(), DEFAULT_WAIT_TIMEOUT);
        assert_eq!(monitoring.inner.channels.up.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_new_status_down_resolves_on_event() {
        let (notifier, monitoring) = started();
        notifier.report(false);

        let waiting = monitoring.wait_for_new_status_down_with_timeout();
        notifier.report(false);

        waiting.await.unwrap();
        assert_eq!(monitoring.inner.channels.down.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_new_status_up_ignores_current_state() {
        let notifier = Arc::new(MockStatusNotifier::new());
        let monitoring = Monitoring::with_wait_timeout(notifier.clone(), Duration::from_secs(2));
        monitoring.start();
        notifier.report(true);

        let result = monitoring.wait_for_new_status_up_with_timeout().await;
        assert!(matches!(result, Err(SupervisorError::WaitTimeout(d)) if d == Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_status_down_when_already_down() {
        let (notifier, monitoring) = started();
        notifier.report(false);

        monitoring.wait_for_status_down_with_timeout().await.unwrap();
    }
}
