//! Collaborator interfaces consumed by the engine.
//!
//! Favorites/subscriptions and notification delivery live outside this
//! crate. The engine calls them at well-defined points of an operation.

use crate::error::Result;
use crate::forum::types::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Per-user favorites and subscriptions.
pub trait EngagementRegistry: Send + Sync {
    /// Drops `topic` from every user's favorites and subscriptions.
    fn remove_topic_everywhere(&self, topic: NodeId) -> Result<()>;

    /// Re-points every favorite/subscription of `from` at `to` (merge).
    fn transfer_topic(&self, _from: NodeId, _to: NodeId) -> Result<()> {
        Ok(())
    }

    /// Adds `to` wherever `from` is favorited/subscribed (split).
    fn copy_topic(&self, _from: NodeId, _to: NodeId) -> Result<()> {
        Ok(())
    }
}

/// Subscriber notification delivery. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify_subscribers(&self, topic: NodeId, reply: NodeId) -> Result<()>;
}

/// Registry that tracks nothing.
#[derive(Debug, Default)]
pub struct NoopRegistry;

impl EngagementRegistry for NoopRegistry {
    fn remove_topic_everywhere(&self, _topic: NodeId) -> Result<()> {
        Ok(())
    }
}

/// Notifier that delivers nothing.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify_subscribers(&self, _topic: NodeId, _reply: NodeId) -> Result<()> {
        Ok(())
    }
}

/// In-memory favorites and subscriptions keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    favorites: Mutex<BTreeMap<u64, BTreeSet<NodeId>>>,
    subscriptions: Mutex<BTreeMap<u64, BTreeSet<NodeId>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_favorite(&self, user: u64, topic: NodeId) {
        if let Ok(mut map) = self.favorites.lock() {
            map.entry(user).or_default().insert(topic);
        }
    }

    pub fn subscribe(&self, user: u64, topic: NodeId) {
        if let Ok(mut map) = self.subscriptions.lock() {
            map.entry(user).or_default().insert(topic);
        }
    }

    pub fn favorites_of(&self, user: u64) -> BTreeSet<NodeId> {
        self.favorites
            .lock()
            .ok()
            .and_then(|m| m.get(&user).cloned())
            .unwrap_or_default()
    }

    pub fn subscriptions_of(&self, user: u64) -> BTreeSet<NodeId> {
        self.subscriptions
            .lock()
            .ok()
            .and_then(|m| m.get(&user).cloned())
            .unwrap_or_default()
    }

    fn rewrite<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut BTreeSet<NodeId>),
    {
        for map in [&self.favorites, &self.subscriptions] {
            let mut map = map
                .lock()
                .map_err(|_| crate::error::ForumError::storage("registry lock poisoned"))?;
            for set in map.values_mut() {
                f(set);
            }
        }
        Ok(())
    }
}

impl EngagementRegistry for MemoryRegistry {
    fn remove_topic_everywhere(&self, topic: NodeId) -> Result<()> {
        self.rewrite(|set| {
            set.remove(&topic);
        })
    }

    fn transfer_topic(&self, from: NodeId, to: NodeId) -> Result<()> {
        self.rewrite(|set| {
            if set.remove(&from) {
                set.insert(to);
            }
        })
    }

    fn copy_topic(&self, from: NodeId, to: NodeId) -> Result<()> {
        self.rewrite(|set| {
            if set.contains(&from) {
                set.insert(to);
            }
        })
    }
}

/// Notifier that records every delivery request.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NodeId, NodeId)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(NodeId, NodeId)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_subscribers(&self, topic: NodeId, reply: NodeId) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((topic, reply));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_everywhere() {
        let registry = MemoryRegistry::new();
        registry.add_favorite(1, NodeId(10));
        registry.add_favorite(2, NodeId(10));
        registry.subscribe(2, NodeId(10));
        registry.subscribe(2, NodeId(11));

        registry.remove_topic_everywhere(NodeId(10)).unwrap();

        assert!(registry.favorites_of(1).is_empty());
        assert!(registry.favorites_of(2).is_empty());
        assert_eq!(registry.subscriptions_of(2).len(), 1);
    }

    #[test]
    fn test_transfer_and_copy() {
        let registry = MemoryRegistry::new();
        registry.subscribe(1, NodeId(10));
        registry.transfer_topic(NodeId(10), NodeId(20)).unwrap();
        assert!(registry.subscriptions_of(1).contains(&NodeId(20)));
        assert!(!registry.subscriptions_of(1).contains(&NodeId(10)));

        registry.copy_topic(NodeId(20), NodeId(30)).unwrap();
        assert_eq!(registry.subscriptions_of(1).len(), 2);
    }
}
