//! Subscription bookkeeping.
//!
//! Tracks two sets: the task ids the application currently wants updates
//! for (`desired`) and the ids the server is believed to be pushing
//! (`subscribed`). The connection manager converges the two by emitting the
//! control messages this registry computes. The `subscribed` set is only
//! valid for the lifetime of one transport: the server forgets everything on
//! a fresh connection, so the set is reset whenever a connection ends.

use std::collections::HashSet;

/// Desired-vs-actual subscription state for one channel.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    desired: HashSet<String>,
    subscribed: HashSet<String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of task ids the application cares about.
    pub fn set_desired(&mut self, desired: HashSet<String>) {
        self.desired = desired;
    }

    pub fn desired(&self) -> &HashSet<String> {
        &self.desired
    }

    pub fn subscribed(&self) -> &HashSet<String> {
        &self.subscribed
    }

    /// Ids that need a `subscribe` sent, in deterministic order.
    pub fn to_subscribe(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.desired.difference(&self.subscribed).cloned().collect();
        ids.sort();
        ids
    }

    /// Ids that need an `unsubscribe` sent, in deterministic order.
    pub fn to_unsubscribe(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.subscribed.difference(&self.desired).cloned().collect();
        ids.sort();
        ids
    }

    /// Record that a `subscribe` was sent for `id`.
    pub fn mark_subscribed(&mut self, id: &str) {
        self.subscribed.insert(id.to_string());
    }

    /// Record that an `unsubscribe` was sent for `id`.
    pub fn mark_unsubscribed(&mut self, id: &str) {
        self.subscribed.remove(id);
    }

    /// The transport went away; the server no longer knows about any of our
    /// subscriptions. Keeps `desired` so the next open re-subscribes.
    pub fn mark_connection_reset(&mut self) {
        self.subscribed.clear();
    }

    /// Take every id we still hold a server-side subscription for, clearing
    /// all local state. Used on teardown to emit final unsubscribes.
    pub fn drain_for_teardown(&mut self) -> Vec<String> {
        self.desired.clear();
        let mut ids: Vec<String> = self.subscribed.drain().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_computes_minimal_changes() {
        let mut registry = SubscriptionRegistry::new();
        registry.set_desired(ids(&["a", "b"]));
        assert_eq!(registry.to_subscribe(), vec!["a", "b"]);
        assert!(registry.to_unsubscribe().is_empty());

        registry.mark_subscribed("a");
        registry.mark_subscribed("b");
        registry.set_desired(ids(&["b", "c"]));
        assert_eq!(registry.to_subscribe(), vec!["c"]);
        assert_eq!(registry.to_unsubscribe(), vec!["a"]);
    }

    #[test]
    fn test_reconcile_is_idempotent_once_marked() {
        let mut registry = SubscriptionRegistry::new();
        registry.set_desired(ids(&["a", "b"]));
        for id in registry.to_subscribe() {
            registry.mark_subscribed(&id);
        }

        registry.set_desired(ids(&["a", "b"]));
        assert!(registry.to_subscribe().is_empty());
        assert!(registry.to_unsubscribe().is_empty());
    }

    #[test]
    fn test_empty_desired_drops_everything() {
        let mut registry = SubscriptionRegistry::new();
        registry.set_desired(ids(&["a", "b"]));
        registry.mark_subscribed("a");
        registry.mark_subscribed("b");

        registry.set_desired(HashSet::new());
        assert_eq!(registry.to_unsubscribe(), vec!["a", "b"]);
        registry.mark_unsubscribed("a");
        registry.mark_unsubscribed("b");
        assert!(registry.subscribed().is_empty());
    }

    #[test]
    fn test_connection_reset_keeps_desired() {
        let mut registry = SubscriptionRegistry::new();
        registry.set_desired(ids(&["a", "b"]));
        registry.mark_subscribed("a");
        registry.mark_subscribed("b");

        registry.mark_connection_reset();
        assert!(registry.subscribed().is_empty());
        // Everything desired needs subscribing again on the new connection.
        assert_eq!(registry.to_subscribe(), vec!["a", "b"]);
    }

    #[test]
    fn test_teardown_drains_subscribed() {
        let mut registry = SubscriptionRegistry::new();
        registry.set_desired(ids(&["a", "b", "c"]));
        registry.mark_subscribed("a");
        registry.mark_subscribed("b");

        assert_eq!(registry.drain_for_teardown(), vec!["a", "b"]);
        assert!(registry.subscribed().is_empty());
        assert!(registry.desired().is_empty());
    }
}
