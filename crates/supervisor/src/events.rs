//! Combinators over subscribe functions
//!
//! Each combinator takes a "subscribe function": anything that registers a
//! callback and hands back a [`Subscription`], such as
//! `|cb| publisher.subscribe(cb)` or one of the `Monitoring::on_*` methods.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::publisher::Subscription;
use crate::{Result, SupervisorError};

/// Callback handed to a subscribe function
pub type EventCallback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Future resolving with the first event
pub type EventFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Register `callback` to run for the first event only, then remove itself
///
/// Works when the subscribe function invokes the callback synchronously
/// before returning (instant replay): the registration is removed as soon as
/// the handle is known. The returned handle cancels the listener if it has
/// not fired yet.
pub fn subscribe_once<T, S, F>(subscribe: S, callback: F) -> Subscription
where
    T: 'static,
    S: FnOnce(EventCallback<T>) -> Subscription,
    F: FnOnce(&T) + Send + 'static,
{
    let pending = Arc::new(Mutex::new(Some(callback)));
    let handle: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let wrapper_pending = pending.clone();
    let wrapper_handle = handle.clone();
    let subscription = subscribe(Box::new(move |value: &T| {
        let callback = wrapper_pending.lock().take();
        if let Some(callback) = callback {
            callback(value);
            let registered = wrapper_handle.lock().take();
            if let Some(registered) = registered {
                registered.unsubscribe();
            }
        }
    }));

    *handle.lock() = Some(subscription.clone());
    if pending.lock().is_none() {
        let registered = handle.lock().take();
        if let Some(registered) = registered {
            registered.unsubscribe();
        }
    }

    subscription
}

struct UnsubscribeOnDrop(Subscription);

impl Drop for UnsubscribeOnDrop {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

/// Resolve with the first event delivered through `subscribe`
///
/// The listener is registered immediately, before the future is polled.
pub fn first_event<T, S>(subscribe: S) -> EventFuture<T>
where
    T: Clone + Send + 'static,
    S: FnOnce(EventCallback<T>) -> Subscription,
{
    let (tx, rx) = oneshot::channel();
    let subscription = subscribe_once(subscribe, move |value: &T| {
        let _ = tx.send(value.clone());
    });

    let guard = UnsubscribeOnDrop(subscription);
    Box::pin(async move {
        let _guard = guard;
        rx.await.map_err(|_| SupervisorError::StatusSourceClosed)
    })
}

/// Like [`first_event`], failing with `WaitTimeout` if nothing arrives in time
///
/// The listener is removed on both paths, and when the future is dropped.
pub fn first_event_or_timeout<T, S>(
    subscribe: S,
    timeout: Duration,
) -> EventFuture<T>
where
    T: Clone + Send + 'static,
    S: FnOnce(EventCallback<T>) -> Subscription,
{
    let (tx, rx) = oneshot::channel();
    let subscription = subscribe_once(subscribe, move |value: &T| {
        let _ = tx.send(value.clone());
    });

    let guard = UnsubscribeOnDrop(subscription);
    Box::pin(async move {
        let _guard = guard;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(SupervisorError::StatusSourceClosed),
            Err(_) => Err(SupervisorError::WaitTimeout(timeout)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::Publisher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_once_fires_once() {
        let publisher = Publisher::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        subscribe_once(
            |cb| publisher.subscribe(cb),
            move |v: &u32| seen_clone.lock().push(*v),
        );

        publisher.publish(&1);
        publisher.publish(&2);

        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_once_with_instant_replay() {
        let publisher = Publisher::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let sub = subscribe_once(
            |cb: EventCallback<u32>| {
                cb(&0);
                publisher.subscribe(cb)
            },
            move |_: &u32| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
        assert_eq!(publisher.subscriber_count(), 0);

        publisher.publish(&1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_once_cancel_before_fire() {
        let publisher = Publisher::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let sub = subscribe_once(
            |cb| publisher.subscribe(cb),
            move |_: &u32| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        sub.unsubscribe();
        publisher.publish(&1);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_event_resolves_with_value() {
        let publisher = Publisher::<u32>::new();
        let waiting = first_event::<u32, _>(|cb| publisher.subscribe(cb));

        publisher.publish(&42);
        assert_eq!(waiting.await.unwrap(), 42);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_first_event_closed_publisher() {
        let publisher = Publisher::<u32>::new();
        let waiting = first_event::<u32, _>(|cb| publisher.subscribe(cb));
        drop(publisher);

        assert!(matches!(
            waiting.await,
            Err(SupervisorError::StatusSourceClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_event_or_timeout_times_out_and_unsubscribes() {
        let publisher = Publisher::<u32>::new();
        let result =
            first_event_or_timeout::<u32, _>(|cb| publisher.subscribe(cb), Duration::from_secs(10))
                .await;

        assert!(matches!(result, Err(SupervisorError::WaitTimeout(_))));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_unsubscribes() {
        let publisher = Publisher::<u32>::new();
        let waiting =
            first_event_or_timeout::<u32, _>(|cb| publisher.subscribe(cb), Duration::from_secs(10));
        assert_eq!(publisher.subscriber_count(), 1);

        drop(waiting);
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
