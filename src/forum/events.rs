//! Lifecycle events and the listener bus.
//!
//! Listeners are registered once when the engine is built and are invoked
//! synchronously, in registration order, after an operation's mutations and
//! recomputation have completed. Listener behavior never affects the outcome
//! of the operation that emitted the event.

use crate::forum::types::{NodeId, NodeKind, StickyScope, UserId};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    ForumCreated { forum: NodeId },
    TopicCreated { topic: NodeId, forum: NodeId },
    ReplyCreated { reply: NodeId, topic: NodeId },
    TopicEdited { topic: NodeId },
    ReplyEdited { reply: NodeId },
    Trashed { kind: NodeKind, node: NodeId },
    Untrashed { kind: NodeKind, node: NodeId },
    Spammed { kind: NodeKind, node: NodeId },
    Unspammed { kind: NodeKind, node: NodeId },
    /// Hard delete; `removed` counts every node removed by the cascade.
    Deleted { kind: NodeKind, node: NodeId, removed: usize },
    TopicClosed { topic: NodeId },
    TopicOpened { topic: NodeId },
    TopicStuck { topic: NodeId, scope: StickyScope },
    TopicUnstuck { topic: NodeId },
    TopicMoved { topic: NodeId, from: NodeId, to: NodeId },
    ForumMoved { forum: NodeId, from: Option<NodeId>, to: Option<NodeId> },
    TopicMerged { source: NodeId, destination: NodeId, moved: usize },
    TopicSplit { source: NodeId, destination: NodeId, moved: usize },
    AuthorSpammed { author: UserId, affected: usize },
    AuthorUnspammed { author: UserId, affected: usize },
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::ForumCreated { forum } => write!(f, "forum created {}", forum),
            LifecycleEvent::TopicCreated { topic, .. } => write!(f, "topic created {}", topic),
            LifecycleEvent::ReplyCreated { reply, .. } => write!(f, "reply created {}", reply),
            LifecycleEvent::TopicEdited { topic } => write!(f, "topic edited {}", topic),
            LifecycleEvent::ReplyEdited { reply } => write!(f, "reply edited {}", reply),
            LifecycleEvent::Trashed { kind, node } => write!(f, "{} trashed {}", kind, node),
            LifecycleEvent::Untrashed { kind, node } => write!(f, "{} untrashed {}", kind, node),
            LifecycleEvent::Spammed { kind, node } => write!(f, "{} spammed {}", kind, node),
            LifecycleEvent::Unspammed { kind, node } => write!(f, "{} unspammed {}", kind, node),
            LifecycleEvent::Deleted { kind, node, .. } => write!(f, "{} deleted {}", kind, node),
            LifecycleEvent::TopicClosed { topic } => write!(f, "topic closed {}", topic),
            LifecycleEvent::TopicOpened { topic } => write!(f, "topic opened {}", topic),
            LifecycleEvent::TopicStuck { topic, scope } => {
                write!(f, "topic stuck {} ({})", topic, scope)
            }
            LifecycleEvent::TopicUnstuck { topic } => write!(f, "topic unstuck {}", topic),
            LifecycleEvent::TopicMoved { topic, to, .. } => {
                write!(f, "topic moved {} -> {}", topic, to)
            }
            LifecycleEvent::ForumMoved { forum, .. } => write!(f, "forum moved {}", forum),
            LifecycleEvent::TopicMerged {
                source,
                destination,
                ..
            } => write!(f, "topic merged {} -> {}", source, destination),
            LifecycleEvent::TopicSplit {
                source,
                destination,
                ..
            } => write!(f, "topic split {} -> {}", source, destination),
            LifecycleEvent::AuthorSpammed { author, .. } => write!(f, "author spammed {}", author),
            LifecycleEvent::AuthorUnspammed { author, .. } => {
                write!(f, "author unspammed {}", author)
            }
        }
    }
}

/// An event plus its audit context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub actor: UserId,
    pub at: u64,
    pub event: LifecycleEvent,
}

/// Subscriber to lifecycle events (search indexing, audit log, ...).
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, envelope: &EventEnvelope);
}

/// Ordered, fixed set of listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener; it will run after every listener added before it.
    pub fn register(&mut self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers each envelope to every listener in order.
    pub fn emit_all(&self, envelopes: &[EventEnvelope]) {
        for envelope in envelopes {
            trace!(event = %envelope.event, actor = %envelope.actor, "event: emit");
            for listener in &self.listeners {
                listener.on_event(envelope);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Listener that records every envelope it receives.
#[derive(Debug, Default)]
pub struct EventRecorder {
    seen: Mutex<Vec<EventEnvelope>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded envelopes.
    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Snapshot of recorded events without their envelopes.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.envelopes().into_iter().map(|e| e.event).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.clear();
        }
    }
}

impl LifecycleListener for EventRecorder {
    fn on_event(&self, envelope: &EventEnvelope) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(envelope.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagger {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl LifecycleListener for Tagger {
        fn on_event(&self, _envelope: &EventEnvelope) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.register(Arc::new(Tagger {
            tag: "search",
            log: log.clone(),
        }));
        bus.register(Arc::new(Tagger {
            tag: "audit",
            log: log.clone(),
        }));

        let envelope = EventEnvelope {
            actor: UserId(1),
            at: 0,
            event: LifecycleEvent::ForumCreated { forum: NodeId(1) },
        };
        bus.emit_all(&[envelope.clone(), envelope]);

        assert_eq!(*log.lock().unwrap(), vec!["search", "audit", "search", "audit"]);
    }

    #[test]
    fn test_recorder_collects() {
        let recorder = EventRecorder::new();
        recorder.on_event(&EventEnvelope {
            actor: UserId(2),
            at: 5,
            event: LifecycleEvent::TopicClosed { topic: NodeId(3) },
        });
        assert_eq!(
            recorder.events(),
            vec![LifecycleEvent::TopicClosed { topic: NodeId(3) }]
        );
        recorder.clear();
        assert!(recorder.envelopes().is_empty());
    }
}
