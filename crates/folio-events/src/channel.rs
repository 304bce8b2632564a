//! Synchronous fan-out channel with per-listener isolation

use crate::topic::{Notification, Topic};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Error reported by a listener; logged and otherwise ignored
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

pub type ListenerResult = Result<(), ListenerError>;

type Listener = Arc<dyn Fn(&Notification) -> ListenerResult + Send + Sync>;

/// Identity of one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Registration {
    id: SubscriptionId,
    topic: Topic,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    registrations: Mutex<Vec<Registration>>,
}

impl Registry {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut registrations = self.registrations.lock();
        match registrations.iter().position(|r| r.id == id) {
            Some(idx) => {
                registrations.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// Outcome of one `publish` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Listeners invoked
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

/// Process-wide publish/subscribe bus
///
/// Cloning is cheap; clones share the same registrations.
#[derive(Clone, Default)]
pub struct EventChannel {
    registry: Arc<Registry>,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.registry.registrations.lock().len())
            .finish()
    }
}

impl EventChannel {
    /// Create a channel with no listeners
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `topic`
    ///
    /// Registering the same closure twice creates two independent
    /// registrations. The registration lives until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, listener: F) -> Subscription
    where
        F: Fn(&Notification) -> ListenerResult + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%topic, %id, "listener registered");
        self.registry.registrations.lock().push(Registration {
            id,
            topic,
            listener: Arc::new(listener),
        });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: true,
        }
    }

    /// Deliver a notification to every listener currently registered for
    /// `topic`, in registration order
    ///
    /// Listeners registered or removed while the fan-out is running take
    /// effect from the next publish. Listener errors and panics are logged
    /// and counted, never propagated.
    pub fn publish(&self, topic: impl Into<Topic>, payload: Option<String>) -> PublishReport {
        let notification = Notification::new(topic.into(), payload);
        let listeners: Vec<(SubscriptionId, Listener)> = self
            .registry
            .registrations
            .lock()
            .iter()
            .filter(|r| r.topic == notification.topic)
            .map(|r| (r.id, Arc::clone(&r.listener)))
            .collect();

        let mut report = PublishReport::default();
        for (id, listener) in listeners {
            report.delivered += 1;
            match catch_unwind(AssertUnwindSafe(|| listener(&notification))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(topic = %notification.topic, %id, error = %e, "listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(topic = %notification.topic, %id, "listener panicked");
                }
            }
        }

        tracing::debug!(
            topic = %notification.topic,
            delivered = report.delivered,
            failed = report.failed,
            "notification published"
        );
        report
    }

    /// Number of listeners registered for `topic`
    #[must_use]
    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.registry
            .registrations
            .lock()
            .iter()
            .filter(|r| &r.topic == topic)
            .count()
    }

    /// Remove every registration
    pub fn reset(&self) {
        self.registry.registrations.lock().clear();
    }
}

/// Handle to one registration
///
/// Dropping the handle removes the registration.
#[must_use = "dropping a Subscription unsubscribes the listener"]
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Registry>,
    active: bool,
}

impl Subscription {
    /// Registration identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove this registration
    ///
    /// Returns `false` if it was already gone (channel reset or dropped).
    pub fn unsubscribe(mut self) -> bool {
        self.remove()
    }

    fn remove(&mut self) -> bool {
        if !std::mem::replace(&mut self.active, false) {
            return false;
        }
        let removed = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id));
        if removed {
            tracing::debug!(id = %self.id, "listener removed");
        }
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
