use chrono::Utc;
use log::*;
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::Result;
use crate::event::{Event, EventDraft, EventId};

/// Listener count above which the bus warns about a probable leak.
pub const DEFAULT_MAX_LISTENERS: usize = 1000;

/// What a listener reports back when it fails to handle an event.
pub type ListenerError = Box<dyn StdError + Send + Sync>;

type ListenerFn = dyn Fn(&Event) -> core::result::Result<(), ListenerError> + Send + Sync;

struct Registration {
    id: u64,
    active: AtomicBool,
    listener: Box<ListenerFn>,
}

struct Inner {
    listeners: Mutex<Vec<Arc<Registration>>>,
    next_listener_id: AtomicU64,
    last_created_at: AtomicI64,
    max_listeners: usize,
}

impl Inner {
    fn listeners(&self) -> MutexGuard<'_, Vec<Arc<Registration>>> {
        // Listeners never run while the lock is held, so a poisoned registry
        // is still consistent.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, registration: &Registration) {
        if registration.active.swap(false, Ordering::SeqCst) {
            self.listeners().retain(|entry| entry.id != registration.id);
            trace!("Removed event bus listener {}", registration.id);
        }
    }
}

/// In-memory publish/subscribe bus fanning events out to every registered
/// listener.
///
/// Cloning is cheap and every clone shares the same listener registry. The
/// server constructs one bus for its whole lifetime and hands clones to the
/// components that publish or subscribe.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    /// Creates a bus that warns once more than `max_listeners` are registered.
    /// The ceiling is advisory: subscriptions above it are still accepted.
    pub fn with_max_listeners(max_listeners: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                last_created_at: AtomicI64::new(0),
                max_listeners,
            }),
        }
    }

    /// Stamps `draft` and synchronously hands the resulting event to every
    /// registered listener, in registration order.
    ///
    /// Listener failures (errors and panics) are logged and never stop the
    /// fan-out or reach the caller. The only error returned is a construction
    /// error for a malformed draft.
    pub fn publish(&self, draft: EventDraft) -> Result<Event> {
        let event = self.seal(draft)?;

        if event.target().is_dead() {
            debug!(
                "Publishing {} event {} with a target that matches nobody",
                event.event_type(),
                event.event_id()
            );
        }

        let snapshot: Vec<Arc<Registration>> = self.inner.listeners().clone();
        for registration in snapshot {
            // Skip listeners removed earlier in this same fan-out.
            if !registration.active.load(Ordering::SeqCst) {
                continue;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| (registration.listener)(&event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(
                    "Listener {} failed to handle {} event {}: {e}",
                    registration.id,
                    event.event_type(),
                    event.event_id()
                ),
                Err(_) => error!(
                    "Listener {} panicked while handling {} event {}",
                    registration.id,
                    event.event_type(),
                    event.event_id()
                ),
            }
        }

        Ok(event)
    }

    /// Publishes `draft`, logging and dropping it if it cannot be constructed.
    ///
    /// Business operations that emit notifications use this so a bad event
    /// never fails the operation that triggered it.
    pub fn notify(&self, draft: EventDraft) -> Option<Event> {
        let event_type = draft.event_type();
        match self.publish(draft) {
            Ok(event) => Some(event),
            Err(e) => {
                error!("Dropping {event_type} event that could not be constructed: {e}");
                None
            }
        }
    }

    /// Assigns identity and a timestamp to `draft` without delivering it.
    pub fn seal(&self, draft: EventDraft) -> Result<Event> {
        Event::stamp(draft, EventId::new(), self.next_timestamp())
    }

    /// Registers `listener` and returns the handle that removes it again.
    ///
    /// Dropping the returned [`Subscription`] also removes the listener.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Event) -> core::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        let registration = Arc::new(Registration {
            id: self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            listener: Box::new(listener),
        });

        let count = {
            let mut listeners = self.inner.listeners();
            listeners.push(Arc::clone(&registration));
            listeners.len()
        };

        if count > self.inner.max_listeners {
            warn!(
                "Event bus has {count} listeners (advisory limit {}); possible listener leak",
                self.inner.max_listeners
            );
        }
        trace!("Added event bus listener {}", registration.id);

        Subscription {
            bus: Arc::downgrade(&self.inner),
            registration,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    // Wall-clock millis, clamped so stamps never go backwards on this bus.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.inner.last_created_at.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener registration. Removing it is idempotent and also happens on drop.
pub struct Subscription {
    bus: Weak<Inner>,
    registration: Arc<Registration>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        match self.bus.upgrade() {
            Some(inner) => inner.remove(&self.registration),
            None => self.registration.active.store(false, Ordering::SeqCst),
        }
    }

    pub fn is_active(&self) -> bool {
        self.registration.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
