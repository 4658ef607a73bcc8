// ── Event subscription registry ──
//
// Callback fan-out keyed by OBS event name. Registering returns a guard;
// dropping the guard removes the handler, so a subscriber that goes away
// can never leak a callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use cuecast_api::ObsEvent;
use tracing::trace;

/// Subscribe to every event regardless of name.
pub const ALL_EVENTS: &str = "*";

pub type EventHandler = Arc<dyn Fn(&ObsEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    handlers: Mutex<HashMap<String, Vec<(u64, EventHandler)>>>,
    next_id: AtomicU64,
}

/// Shared handler table. Cheap to clone.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Registry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every event named `event` (or every event, for
    /// [`ALL_EVENTS`]) until the returned guard is dropped.
    pub fn subscribe<F>(&self, event: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&ObsEvent) + Send + Sync + 'static,
    {
        let event = event.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .entry(event.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        trace!(event = %event, id, "handler registered");
        Subscription {
            registry: Arc::downgrade(&self.inner),
            event,
            id,
        }
    }

    /// Invoke every handler for `event`. Handlers run outside the lock, so
    /// they may subscribe or unsubscribe freely.
    pub fn dispatch(&self, event: &ObsEvent) {
        let handlers: Vec<EventHandler> = {
            let table = self.inner.lock();
            [event.event_type.as_str(), ALL_EVENTS]
                .iter()
                .filter_map(|name| table.get(*name))
                .flatten()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in handlers {
            handler(event);
        }
    }

    /// Number of live handlers for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.inner.lock().get(event).map_or(0, Vec::len)
    }
}

impl Registry {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<(u64, EventHandler)>>> {
        // Handlers never run under this lock.
        self.handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn remove(&self, event: &str, id: u64) {
        let mut table = self.lock();
        if let Some(list) = table.get_mut(event) {
            list.retain(|(hid, _)| *hid != id);
            if list.is_empty() {
                table.remove(event);
            }
        }
    }
}

/// Registration guard. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Registry>,
    event: String,
    id: u64,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Explicit form of dropping the guard.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event, self.id);
            trace!(event = %self.event, id = self.id, "handler removed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;

    fn counter(
        registry: &SubscriptionRegistry,
        event: &str,
    ) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let sub = registry.subscribe(event, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn dispatches_by_name_and_wildcard() {
        let registry = SubscriptionRegistry::new();
        let (scene_hits, _scene) = counter(&registry, "CurrentProgramSceneChanged");
        let (all_hits, _all) = counter(&registry, ALL_EVENTS);

        registry.dispatch(&ObsEvent::new("CurrentProgramSceneChanged", Value::Null));
        registry.dispatch(&ObsEvent::new("StreamStateChanged", Value::Null));

        assert_eq!(scene_hits.load(Ordering::SeqCst), 1);
        assert_eq!(all_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_guard_removes_handler() {
        let registry = SubscriptionRegistry::new();
        let (hits, sub) = counter(&registry, "SceneCreated");
        assert_eq!(registry.handler_count("SceneCreated"), 1);

        sub.unsubscribe();
        assert_eq!(registry.handler_count("SceneCreated"), 0);

        registry.dispatch(&ObsEvent::new("SceneCreated", Value::Null));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn guard_outliving_registry_is_harmless() {
        let registry = SubscriptionRegistry::new();
        let (_hits, sub) = counter(&registry, "SceneCreated");
        drop(registry);
        drop(sub);
    }
}
