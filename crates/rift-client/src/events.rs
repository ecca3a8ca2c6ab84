//! Local publish/subscribe notifications for control-plane lifecycle events.
//!
//! In-process listeners (for example local callback handlers) register on the
//! bus of an endpoint port and are told about `Stop` and `Reset` before the
//! corresponding remote call is made.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Lifecycle events published to local listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Stop,
    Reset,
}

type Listener = Arc<dyn Fn(EventType) + Send + Sync>;

struct Subscription {
    id: u64,
    events: Vec<EventType>,
    listener: Listener,
}

/// Identifies a subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Notification channel for a single endpoint.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.read().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for the given event types.
    pub fn subscribe<F>(&self, events: &[EventType], listener: F) -> SubscriptionId
    where
        F: Fn(EventType) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.write().push(Subscription {
            id,
            events: events.to_vec(),
            listener: Arc::new(listener),
        });
        SubscriptionId(id)
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id.0);
        subscriptions.len() != before
    }

    /// Notify every listener subscribed to `event`, synchronously.
    pub fn publish(&self, event: EventType) {
        // Listeners run outside the lock so they may (un)subscribe themselves.
        let listeners: Vec<Listener> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.events.contains(&event))
            .map(|s| Arc::clone(&s.listener))
            .collect();

        trace!("Publishing {:?} to {} local listener(s)", event, listeners.len());
        for listener in listeners {
            listener(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

/// Registry of event buses keyed by endpoint port.
///
/// Clones share the same table, so clients that should see each other's
/// events (for example several clients of one server) must share a registry.
#[derive(Debug, Clone, Default)]
pub struct EventBusRegistry {
    buses: Arc<Mutex<HashMap<u16, Arc<EventBus>>>>,
}

impl EventBusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bus for `port`, creating it on first use.
    pub fn bus_for(&self, port: u16) -> Arc<EventBus> {
        let mut buses = self.buses.lock();
        Arc::clone(buses.entry(port).or_insert_with(|| {
            trace!("Creating local event bus for port {}", port);
            Arc::new(EventBus::new())
        }))
    }

    /// Get the bus for `port` without creating one.
    pub fn get(&self, port: u16) -> Option<Arc<EventBus>> {
        self.buses.lock().get(&port).cloned()
    }

    /// Publish `event` on the bus for `port`.
    pub fn publish(&self, port: u16, event: EventType) {
        self.bus_for(port).publish(event);
    }

    /// Drop the bus for `port`; later lookups create a fresh one.
    pub fn remove(&self, port: u16) -> Option<Arc<EventBus>> {
        self.buses.lock().remove(&port)
    }

    pub fn len(&self) -> usize {
        self.buses.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.lock().is_empty()
    }
}
