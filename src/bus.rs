//! Multi-agent message bus.
//!
//! Each agent keeps its own `hubSubscribers: map<hubId, list<Agent>>`. After an agent's
//! `PostCall` pipeline completes, the core broadcasts the final message to every subscriber
//! across every hub by calling `observe` on it, flattened in the hubs' iteration order. A
//! subscriber's `observe` failure never fails the originating call (see `DESIGN.md`'s
//! Open-Question decision on this); it is logged on the subscriber instead.

use crate::types::Message;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Anything that can receive a broadcast message from a hub it subscribes to.
///
/// `Agent` implements this; the bus only depends on the trait so agents can be composed and
/// tested without a full `Agent` construction.
pub trait Observer: Send + Sync {
    /// Human-readable name, used in log messages when observation fails.
    fn observer_name(&self) -> String;

    /// Delivers `message` to this observer. Errors are caught by the bus and logged against
    /// [`Observer::observer_name`]; they never propagate to the broadcaster.
    fn observe<'a>(
        &'a self,
        message: &'a Message,
    ) -> Pin<Box<dyn Future<Output = crate::Result<()>> + Send + 'a>>;
}

/// Shorthand for a reference-counted, dynamically dispatched [`Observer`].
pub type SharedObserver = Arc<dyn Observer>;

/// A per-agent registry of hub subscriptions, mapping a hub id to the list of agents
/// subscribed to broadcasts on that hub.
#[derive(Clone, Default)]
pub struct SubscriberMap {
    hubs: Arc<RwLock<HashMap<String, Vec<SharedObserver>>>>,
}

impl SubscriberMap {
    /// Creates an empty subscriber map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the subscriber list for `hub_id` wholesale.
    pub async fn reset_subscribers(&self, hub_id: impl Into<String>, subscribers: Vec<SharedObserver>) {
        self.hubs.write().await.insert(hub_id.into(), subscribers);
    }

    /// Appends a single subscriber to `hub_id`'s list, creating it if absent.
    pub async fn add_subscriber(&self, hub_id: impl Into<String>, subscriber: SharedObserver) {
        self.hubs.write().await.entry(hub_id.into()).or_default().push(subscriber);
    }

    /// Drops a hub's subscriber list entirely.
    pub async fn remove_subscribers(&self, hub_id: &str) {
        self.hubs.write().await.remove(hub_id);
    }

    /// Returns the number of hubs with at least one subscriber.
    pub async fn hub_count(&self) -> usize {
        self.hubs.read().await.len()
    }

    /// Returns the total number of subscribers across every hub.
    pub async fn subscriber_count(&self) -> usize {
        self.hubs.read().await.values().map(Vec::len).sum()
    }

    /// Delivers `message` to every subscriber across every hub, in the hubs' iteration order,
    /// flattened. Each delivery is awaited in turn; a failing delivery is logged against the
    /// subscriber and does not stop delivery to the rest.
    pub async fn broadcast(&self, message: &Message) {
        let hubs = self.hubs.read().await;
        for subscribers in hubs.values() {
            for subscriber in subscribers {
                if let Err(err) = subscriber.observe(message).await {
                    log::warn!(
                        "subscriber '{}' failed to observe broadcast message: {err}",
                        subscriber.observer_name()
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for SubscriberMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberMap").finish_non_exhaustive()
    }
}
