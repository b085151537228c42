/*!
 * Event dispatch for Astroflow.
 *
 * This module provides a synchronous, typed event dispatcher. Listeners are
 * invoked on the publishing thread in registration order, and a listener
 * that panics is isolated from the others. [`ChannelListener`] bridges the
 * dispatcher onto a `tokio` broadcast channel for consumers that want to
 * process events asynchronously.
 */
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{error, trace};

use crate::error::{Error, Result};

/// Default capacity of the broadcast channel behind a [`ChannelListener`]
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A receiver of events of type `E`
///
/// Any `Fn(&E) + Send + Sync` closure is a listener.
pub trait Listener<E>: Send + Sync {
    /// Handle a single event
    fn on_event(&self, event: &E);
}

impl<E, F> Listener<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// A shared, type-erased listener
pub type SharedListener<E> = Arc<dyn Listener<E>>;

/// Ordered set of listeners with synchronous fan-out
pub struct EventDispatcher<E> {
    listeners: RwLock<Vec<SharedListener<E>>>,
}

fn same_listener<E>(a: &SharedListener<E>, b: &SharedListener<E>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl<E> EventDispatcher<E> {
    /// Create a dispatcher with no listeners
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener
    ///
    /// Returns `false` if the same listener instance is already registered.
    pub fn register(&self, listener: SharedListener<E>) -> Result<bool> {
        let mut listeners = self
            .listeners
            .write()
            .map_err(|_| Error::event("Failed to lock listeners"))?;

        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return Ok(false);
        }

        listeners.push(listener);
        trace!("Registered listener, {} total", listeners.len());
        Ok(true)
    }

    /// Unregister a listener, returning whether it was registered
    pub fn unregister(&self, listener: &SharedListener<E>) -> Result<bool> {
        let mut listeners = self
            .listeners
            .write()
            .map_err(|_| Error::event("Failed to lock listeners"))?;

        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        Ok(listeners.len() != before)
    }

    /// Deliver an event to every registered listener
    ///
    /// Listeners run in registration order on the calling thread. Returns the
    /// number of listeners that handled the event without panicking.
    pub fn publish(&self, event: &E) -> usize {
        let snapshot: Vec<SharedListener<E>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for listener in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            match outcome {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(reason = %reason, "Event listener panicked");
                }
            }
        }

        delivered
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}

/// A listener that forwards events into a `tokio` broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelListener<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> ChannelListener<E> {
    /// Create a channel listener with the default capacity
    pub fn new() -> (Self, broadcast::Receiver<E>) {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a channel listener with a specific capacity
    pub fn with_capacity(capacity: usize) -> (Self, broadcast::Receiver<E>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Subscribe another receiver to the forwarded events
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

impl<E: Clone + Send + Sync + 'static> Listener<E> for ChannelListener<E> {
    fn on_event(&self, event: &E) {
        if self.sender.send(event.clone()).is_err() {
            trace!("No receivers for forwarded event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct TestEvent {
        id: u32,
    }

    #[test]
    fn test_listeners_run_in_registration_order() -> Result<()> {
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            dispatcher.register(Arc::new(move |e: &TestEvent| {
                seen.lock().unwrap().push((tag, e.id));
            }))?;
        }

        assert_eq!(dispatcher.publish(&TestEvent { id: 7 }), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
        Ok(())
    }

    #[test]
    fn test_register_is_idempotent_per_instance() -> Result<()> {
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let listener: SharedListener<TestEvent> = Arc::new(move |_: &TestEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatcher.register(listener.clone())?);
        assert!(!dispatcher.register(listener.clone())?);
        assert_eq!(dispatcher.len(), 1);

        dispatcher.publish(&TestEvent { id: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(dispatcher.unregister(&listener)?);
        assert!(!dispatcher.unregister(&listener)?);
        assert!(dispatcher.is_empty());

        dispatcher.publish(&TestEvent { id: 2 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test_log::test]
    fn test_panicking_listener_is_isolated() -> Result<()> {
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let count = Arc::new(AtomicUsize::new(0));

        dispatcher.register(Arc::new(|_: &TestEvent| panic!("listener failure")))?;
        let counter = count.clone();
        dispatcher.register(Arc::new(move |_: &TestEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))?;

        assert_eq!(dispatcher.publish(&TestEvent { id: 3 }), 1);
        assert_eq!(dispatcher.publish(&TestEvent { id: 4 }), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn test_publish_without_listeners() {
        let dispatcher = EventDispatcher::<TestEvent>::default();
        assert_eq!(dispatcher.publish(&TestEvent { id: 5 }), 0);
    }

    #[test]
    fn test_channel_listener_forwards_events() -> Result<()> {
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let (listener, mut rx) = ChannelListener::<TestEvent>::new();
        let mut rx2 = listener.subscribe();
        dispatcher.register(Arc::new(listener))?;

        dispatcher.publish(&TestEvent { id: 9 });

        let received = tokio_test::block_on(rx.recv()).map_err(|e| Error::event(e.to_string()))?;
        assert_eq!(received, TestEvent { id: 9 });
        let received = tokio_test::block_on(rx2.recv()).map_err(|e| Error::event(e.to_string()))?;
        assert_eq!(received.id, 9);
        Ok(())
    }
}
