//! Source of raw alive/dead observations

/// Callback receiving the latest probe outcome
pub type StatusCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Something that periodically learns whether the managed process is alive
///
/// Exactly one callback is expected; registering again replaces it. Values
/// are the latest observation, not a history.
pub trait StatusNotifier: Send + Sync {
    fn start(&self);

    /// Must be safe to call at any time, including when not started
    fn stop(&self);

    fn on_status(&self, callback: StatusCallback);
}
