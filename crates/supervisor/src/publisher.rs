//! Typed publish/subscribe channel
//!
//! Delivery is synchronous and in registration order. A publish works on a
//! snapshot of the subscriber list, so callbacks added while it runs are not
//! called by it, while callbacks removed while it runs are skipped from the
//! moment of removal.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

/// Subscriber callback
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    subscribers: Vec<(u64, Callback<T>)>,
}

impl<T> Registry<T> {
    fn contains(&self, id: u64) -> bool {
        self.subscribers.iter().any(|(sub_id, _)| *sub_id == id)
    }

    fn remove(&mut self, id: u64) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }
}

/// Publish/subscribe channel for values of type `T`
pub struct Publisher<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Publisher<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register a callback for every future publish
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    pub(crate) fn subscribe_arc(&self, callback: Callback<T>) -> Subscription {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.push((id, callback));
            id
        };

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.lock().remove(id);
            }
        })
    }

    /// Deliver `value` to every current subscriber
    ///
    /// A panicking subscriber is logged and skipped; the rest still run.
    pub fn publish(&self, value: &T) {
        let snapshot: Vec<(u64, Callback<T>)> = self.registry.lock().subscribers.clone();

        for (id, callback) in snapshot {
            if !self.registry.lock().contains(id) {
                continue;
            }
            if !call_isolated(|| callback(value)) {
                error!("Subscriber {} panicked while handling an event", id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}

/// Run a subscriber callback, containing a panic. False if it panicked.
pub(crate) fn call_isolated<F: FnOnce()>(callback: F) -> bool {
    catch_unwind(AssertUnwindSafe(callback)).is_ok()
}

impl<T: 'static> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle removing one callback registration
///
/// Dropping the handle keeps the callback registered. `unsubscribe` may be
/// called any number of times; only the first call has an effect.
#[derive(Clone)]
pub struct Subscription {
    cancel: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
