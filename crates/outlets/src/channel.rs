//! A minimal named-event publish/subscribe primitive.
//!
//! Each [`crate::Outlet`] owns exactly one [`EventChannel`]; channels are never shared.
//!
//! The channel itself is not synchronized, the owning outlet keeps it behind its state lock.
//! To deliver without holding that lock, take a [`Dispatch`] snapshot under the lock and call
//! [`Dispatch::deliver`] after releasing it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strum_macros::{AsRefStr, Display};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Event {
    Update,
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Handler<T> = dyn Fn(&T) + Send + Sync;

/// A handler paired with an identity, so the same registration can be found again by [`EventChannel::off`].
///
/// Clones share the identity; two listeners built from the same closure via separate
/// [`Listener::new`] calls do not.
pub struct Listener<T> {
    id: ListenerId,
    handler: Arc<Handler<T>>,
}

impl<T> Listener<T> {
    pub fn new(handler: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            id: ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed)),
            handler: Arc::new(handler),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<T> PartialEq for Listener<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Listener<T> {}

impl<T> Debug for Listener<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

pub struct EventChannel<T> {
    listeners: HashMap<Event, Vec<Listener<T>>>,
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }
}

impl<T> Debug for EventChannel<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&Event, usize> = self
            .listeners
            .iter()
            .map(|(event, listeners)| (event, listeners.len()))
            .collect();
        f.debug_struct("EventChannel")
            .field("listeners", &counts)
            .finish()
    }
}

impl<T> EventChannel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener`; delivery follows registration order.
    pub fn on(&mut self, event: Event, listener: Listener<T>) {
        self.listeners
            .entry(event)
            .or_default()
            .push(listener);
    }

    /// Removes the first registration matching `listener`.
    ///
    /// Returns `false`, and does nothing else, if it was not registered.
    pub fn off(&mut self, event: Event, listener: &Listener<T>) -> bool {
        let Some(listeners) = self.listeners.get_mut(&event) else {
            return false;
        };

        let Some(index) = listeners
            .iter()
            .position(|candidate| candidate == listener)
        else {
            return false;
        };

        listeners.remove(index);
        if listeners.is_empty() {
            self.listeners.remove(&event);
        }
        true
    }

    /// Invokes every listener for `event`, in registration order.
    ///
    /// A panicking listener is logged and skipped, the remaining listeners are still invoked.
    pub fn emit(&self, event: Event, value: &T) {
        self.snapshot(event).deliver(value);
    }

    pub fn listener_count(&self, event: Event) -> usize {
        self.listeners
            .get(&event)
            .map_or(0, Vec::len)
    }

    /// Captures the listeners currently registered for `event`.
    pub fn snapshot(&self, event: Event) -> Dispatch<T> {
        Dispatch {
            event,
            listeners: self
                .listeners
                .get(&event)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// The listeners of one event, captured at a point in time.
#[must_use = "a dispatch does nothing until delivered"]
pub struct Dispatch<T> {
    event: Event,
    listeners: Vec<Listener<T>>,
}

impl<T> Dispatch<T> {
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners that panicked.
    pub fn deliver(self, value: &T) -> usize {
        let mut failures = 0;
        for listener in &self.listeners {
            let handler = &listener.handler;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(value))) {
                failures += 1;
                error!(
                    "Listener panicked, continuing delivery. event: {}, listener: {:?}, panic: {}",
                    self.event,
                    listener.id,
                    panic_message(payload.as_ref())
                );
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
