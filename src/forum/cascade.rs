//! Cascade Orchestrator.
//!
//! A compound operation runs in two phases:
//!
//! 1. **Mutation**: status and structural writes are applied through a
//!    [`Cascade`], which records every touched topic and forum in a
//!    [`RecountPlan`] and buffers lifecycle events.
//! 2. **Recount**: the plan recomputes every dirty topic, then every dirty
//!    forum and all of their ancestors deepest-first, each exactly once.
//!
//! Recount failures never fail the operation. They are logged, returned in
//! the [`RecountOutcome`] and retried later (see `ForumEngine`).

use crate::error::{ForumError, Result};
use crate::forum::activity::{recompute_forum_last_active, recompute_topic_last_active};
use crate::forum::config::EngineConfig;
use crate::forum::counters::{recompute_forum_counts, recompute_topic_counts};
use crate::forum::events::{EventEnvelope, LifecycleEvent};
use crate::forum::node::{ContentNode, Forum};
use crate::forum::registry::EngagementRegistry;
use crate::forum::storage::{ContentStore, StatusFilter, StoreExt};
use crate::forum::types::{NodeId, NodeKind, OpContext};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

// ============================================================================
// Ancestor and subtree walks
// ============================================================================

/// Returns `[forum, parent, grandparent, .., root]`.
///
/// Stops early at a missing ancestor. An empty chain means `forum` itself is
/// gone. Fails with `InvalidTransition` if the parent edges form a cycle.
pub fn ancestor_chain<S: ContentStore + ?Sized>(store: &S, forum: NodeId) -> Result<Vec<NodeId>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(forum);

    while let Some(id) = cursor {
        if !seen.insert(id) {
            return Err(ForumError::invalid_transition(format!(
                "forum parent cycle through {}",
                id
            )));
        }
        match store.load(id)? {
            Some(ContentNode::Forum(f)) => {
                chain.push(id);
                cursor = f.parent;
            }
            _ => break,
        }
    }
    Ok(chain)
}

/// Resolves the advisory lock key for any node: the root forum of its
/// subtree, or the topic/reply id itself when it has no live forum.
pub fn root_key<S: ContentStore + ?Sized>(store: &S, id: NodeId) -> Result<NodeId> {
    let forum = match store.load_node(id)? {
        ContentNode::Forum(f) => f.id,
        ContentNode::Topic(t) => t.forum_id,
        ContentNode::Reply(r) => match store.load(r.topic_id)? {
            Some(ContentNode::Topic(t)) => t.forum_id,
            _ => return Ok(id),
        },
    };
    Ok(ancestor_chain(store, forum)?.last().copied().unwrap_or(id))
}

/// Every forum in the subtree rooted at `root`, parents before children.
pub fn descendant_forums<S: ContentStore + ?Sized>(store: &S, root: Forum) -> Result<Vec<Forum>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];

    while let Some(forum) = stack.pop() {
        if !seen.insert(forum.id) {
            continue;
        }
        let mut children = store.child_forums(forum.id, StatusFilter::All)?;
        children.reverse();
        stack.extend(children);
        out.push(forum);
    }
    Ok(out)
}

/// Height of the subtree rooted at `forum` (a leaf forum has height 1).
pub fn subtree_height<S: ContentStore + ?Sized>(store: &S, forum: NodeId) -> Result<usize> {
    let mut height = 0;
    let mut level = vec![forum];
    let mut seen = HashSet::new();

    while !level.is_empty() {
        height += 1;
        let mut next = Vec::new();
        for id in level {
            if !seen.insert(id) {
                continue;
            }
            next.extend(
                store
                    .child_forums(id, StatusFilter::All)?
                    .into_iter()
                    .map(|f| f.id),
            );
        }
        level = next;
    }
    Ok(height)
}

// ============================================================================
// Recount plan
// ============================================================================

/// Result of executing a [`RecountPlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecountOutcome {
    /// Topics recomputed.
    pub topics: usize,
    /// Forums recomputed, ancestors included.
    pub forums: usize,
    /// Nodes whose recomputation failed and should be retried.
    pub failed: Vec<(NodeKind, NodeId)>,
}

/// Dirty set collected while a cascade mutates the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecountPlan {
    topics: BTreeSet<NodeId>,
    forums: BTreeSet<NodeId>,
}

impl RecountPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_topic(&mut self, id: NodeId) {
        self.topics.insert(id);
    }

    pub fn touch_forum(&mut self, id: NodeId) {
        self.forums.insert(id);
    }

    pub fn touch(&mut self, kind: NodeKind, id: NodeId) {
        match kind {
            NodeKind::Topic => self.touch_topic(id),
            NodeKind::Forum => self.touch_forum(id),
            NodeKind::Reply => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.forums.is_empty()
    }

    /// Every queued node, topics first.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeKind, NodeId)> + '_ {
        self.topics
            .iter()
            .map(|id| (NodeKind::Topic, *id))
            .chain(self.forums.iter().map(|id| (NodeKind::Forum, *id)))
    }

    /// Recomputes counts and last-active pointers bottom-up.
    ///
    /// Nodes that no longer exist are skipped. A topic's forum is added to
    /// the forum set, and every forum pulls in its ancestor chain.
    pub fn execute<S: ContentStore + ?Sized>(&self, store: &S) -> RecountOutcome {
        let mut outcome = RecountOutcome::default();
        let mut forums = self.forums.clone();

        for &topic in &self.topics {
            match recount_topic(store, topic) {
                Ok(Some(forum)) => {
                    forums.insert(forum);
                    outcome.topics += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(topic = %topic, error = %e, "recount: topic deferred");
                    outcome.failed.push((NodeKind::Topic, topic));
                }
            }
        }

        // Depth from the root (root = 1); deeper forums recompute first.
        let mut depth: BTreeMap<NodeId, usize> = BTreeMap::new();
        for &forum in &forums {
            match ancestor_chain(store, forum) {
                Ok(chain) => {
                    let len = chain.len();
                    for (i, id) in chain.into_iter().enumerate() {
                        depth.insert(id, len - i);
                    }
                }
                Err(e) => {
                    warn!(forum = %forum, error = %e, "recount: ancestor walk failed");
                    outcome.failed.push((NodeKind::Forum, forum));
                }
            }
        }

        let mut order: Vec<(usize, NodeId)> = depth.into_iter().map(|(id, d)| (d, id)).collect();
        order.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        for (_, forum) in order {
            let result = recompute_forum_counts(store, forum)
                .and_then(|_| recompute_forum_last_active(store, forum));
            match result {
                Ok(_) => outcome.forums += 1,
                Err(e) => {
                    warn!(forum = %forum, error = %e, "recount: forum deferred");
                    outcome.failed.push((NodeKind::Forum, forum));
                }
            }
        }

        debug!(
            topics = outcome.topics,
            forums = outcome.forums,
            failed = outcome.failed.len(),
            "recount: plan executed"
        );
        outcome
    }
}

/// Recomputes one topic; returns its forum, or `None` if it is gone.
fn recount_topic<S: ContentStore + ?Sized>(store: &S, topic: NodeId) -> Result<Option<NodeId>> {
    let forum = match store.load(topic)? {
        Some(ContentNode::Topic(t)) => t.forum_id,
        _ => return Ok(None),
    };
    recompute_topic_counts(store, topic)?;
    recompute_topic_last_active(store, topic)?;
    Ok(Some(forum))
}

// ============================================================================
// Cascade context
// ============================================================================

/// Working state of one top-level operation.
pub struct Cascade<'a, S: ContentStore + ?Sized> {
    pub(crate) store: &'a S,
    pub(crate) registry: &'a dyn EngagementRegistry,
    pub(crate) config: &'a EngineConfig,
    pub(crate) ctx: OpContext,
    pub(crate) plan: RecountPlan,
    pub(crate) events: Vec<EventEnvelope>,
}

impl<'a, S: ContentStore + ?Sized> Cascade<'a, S> {
    pub fn new(
        store: &'a S,
        registry: &'a dyn EngagementRegistry,
        config: &'a EngineConfig,
        ctx: OpContext,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            ctx,
            plan: RecountPlan::new(),
            events: Vec::new(),
        }
    }

    /// Buffers an event; it is delivered only if the operation succeeds.
    pub fn emit(&mut self, event: LifecycleEvent) {
        self.events.push(EventEnvelope {
            actor: self.ctx.actor,
            at: self.ctx.now,
            event,
        });
    }

    pub fn into_parts(self) -> (RecountPlan, Vec<EventEnvelope>) {
        (self.plan, self.events)
    }
}
