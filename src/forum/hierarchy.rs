//! Hierarchy Operations: move, merge and split.
//!
//! Each operation rewrites parent edges (and the denormalized `forum_id`
//! on replies), then queues both the source and destination chains for
//! recount.

use crate::error::{ForumError, Result};
use crate::forum::cascade::{ancestor_chain, subtree_height, Cascade};
use crate::forum::constants::MAX_REDIRECT_HOPS;
use crate::forum::events::LifecycleEvent;
use crate::forum::node::{Reply, Topic};
use crate::forum::storage::{ContentStore, StatusFilter, StoreExt};
use crate::forum::transitions::{stick, unstick};
use crate::forum::types::{NodeId, PostStatus, StickyScope};
use crate::forum::validation::{check_title, excerpt, ValidationResult};
use std::collections::BTreeSet;
use tracing::debug;

/// Options for [`merge`](crate::forum::ForumEngine::merge_topics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Append the source's opening post to the destination as a reply.
    pub convert_original_post: bool,
    /// Union the source's tags into the destination.
    pub merge_tags: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            convert_original_post: true,
            merge_tags: true,
        }
    }
}

/// Where split-off replies go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitPolicy {
    /// Into a new topic created in the source's forum.
    #[default]
    Reply,
    /// Into an existing topic.
    Existing(NodeId),
}

/// Options for [`split`](crate::forum::ForumEngine::split_topic).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    pub policy: SplitPolicy,
    /// Title for a new topic; derived from the pivot's content when absent.
    pub title: Option<String>,
    /// Give a new topic the source's sticky scope.
    pub inherit_sticky: bool,
    /// Copy the source's tags onto the destination.
    pub copy_tags: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            policy: SplitPolicy::Reply,
            title: None,
            inherit_sticky: false,
            copy_tags: true,
        }
    }
}

/// Outcome of resolving a topic id that may have been merged away.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicLookup {
    /// The id named a live (non-merged) topic.
    Found(Topic),
    /// The id was merged; `topic` is the end of the redirect chain.
    Redirected { requested: NodeId, topic: Topic },
}

impl TopicLookup {
    pub fn topic(&self) -> &Topic {
        match self {
            TopicLookup::Found(t) | TopicLookup::Redirected { topic: t, .. } => t,
        }
    }

    pub fn into_topic(self) -> Topic {
        match self {
            TopicLookup::Found(t) | TopicLookup::Redirected { topic: t, .. } => t,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, TopicLookup::Redirected { .. })
    }
}

/// Follows `merged_into` links from `id` to a live topic.
pub fn resolve_topic<S: ContentStore + ?Sized>(store: &S, id: NodeId) -> Result<TopicLookup> {
    let mut topic = store.load_topic(id)?;
    let mut hops = 0;
    while topic.post_status == PostStatus::Merged {
        let next = topic
            .merged_into
            .ok_or_else(|| ForumError::not_found(format!("topic {} merged without target", topic.id)))?;
        hops += 1;
        if hops > MAX_REDIRECT_HOPS {
            return Err(ForumError::not_found(format!(
                "topic {} redirect chain exceeds {} hops",
                id, MAX_REDIRECT_HOPS
            )));
        }
        topic = store.load_topic(next)?;
    }
    if hops == 0 {
        Ok(TopicLookup::Found(topic))
    } else {
        Ok(TopicLookup::Redirected {
            requested: id,
            topic,
        })
    }
}

/// Points `reply` at `dest`. A restore marker caused by `from` no longer
/// has an owner to restore it and is kept as a direct mark.
fn reassign(reply: &mut Reply, dest: &Topic, from: NodeId) {
    reply.topic_id = dest.id;
    reply.forum_id = dest.forum_id;
    if let Some(mark) = reply.status_mark.as_mut() {
        if mark.caused_by(from) {
            mark.cause = None;
        }
    }
}

// ============================================================================
// Move
// ============================================================================

/// Reparents a topic and its replies under `dest_forum`.
pub(crate) fn move_topic<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    topic_id: NodeId,
    dest_forum: NodeId,
) -> Result<()> {
    let mut topic = c.store.load_topic(topic_id)?;
    if topic.forum_id == dest_forum {
        return Ok(());
    }
    if topic.post_status == PostStatus::Merged {
        return Err(ForumError::invalid_transition(format!(
            "topic {} has been merged",
            topic_id
        )));
    }

    let dest = c.store.load_forum(dest_forum)?;
    if dest.is_category() {
        return Err(ForumError::invalid_transition(format!(
            "forum {} is a category and cannot hold topics",
            dest_forum
        )));
    }
    if dest.post_status == PostStatus::Trash {
        return Err(ForumError::invalid_transition(format!(
            "forum {} is trashed",
            dest_forum
        )));
    }

    let from = topic.forum_id;
    c.plan.touch_topic(topic_id);
    c.plan.touch_forum(from);
    c.plan.touch_forum(dest_forum);
    let scope = topic.sticky;
    if scope == StickyScope::Forum {
        unstick(c, &mut topic)?;
    }

    topic.forum_id = dest_forum;
    if topic.post_status == PostStatus::Orphan {
        topic.post_status = topic
            .status_mark
            .take()
            .map(|m| m.prior)
            .filter(|p| *p != PostStatus::Orphan)
            .unwrap_or(PostStatus::Publish);
    }
    if scope == StickyScope::Forum {
        stick(c, &mut topic, StickyScope::Forum)?;
    }
    c.store.save_topic(&topic)?;

    let replies = c.store.topic_replies(topic_id, StatusFilter::All)?;
    for mut reply in replies {
        reply.forum_id = dest_forum;
        c.store.save_reply(&reply)?;
    }

    c.emit(LifecycleEvent::TopicMoved {
        topic: topic_id,
        from,
        to: dest_forum,
    });
    debug!(topic = %topic_id, from = %from, to = %dest_forum, "hierarchy: topic moved");
    Ok(())
}

/// Reparents a forum, rejecting cycles and over-deep nesting.
pub(crate) fn move_forum<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    forum_id: NodeId,
    new_parent: Option<NodeId>,
) -> Result<()> {
    let mut forum = c.store.load_forum(forum_id)?;
    if forum.parent == new_parent {
        return Ok(());
    }

    let parent_depth = match new_parent {
        None => 0,
        Some(parent) => {
            let target = c.store.load_forum(parent)?;
            if target.post_status == PostStatus::Trash {
                return Err(ForumError::invalid_transition(format!(
                    "forum {} is trashed",
                    parent
                )));
            }
            let chain = ancestor_chain(c.store, parent)?;
            if chain.contains(&forum_id) {
                return Err(ForumError::invalid_transition(format!(
                    "cannot move forum {} beneath its own descendant {}",
                    forum_id, parent
                )));
            }
            chain.len()
        }
    };

    let height = subtree_height(c.store, forum_id)?;
    if parent_depth + height > c.config.max_forum_depth {
        return Err(ForumError::invalid_input(format!(
            "forum nesting would reach depth {} (max {})",
            parent_depth + height,
            c.config.max_forum_depth
        )));
    }

    let from = forum.parent;
    forum.parent = new_parent;
    c.store.save_forum(&forum)?;

    c.plan.touch_forum(forum_id);
    if let Some(old) = from {
        c.plan.touch_forum(old);
    }
    c.emit(LifecycleEvent::ForumMoved {
        forum: forum_id,
        from,
        to: new_parent,
    });
    debug!(forum = %forum_id, from = ?from, to = ?new_parent, "hierarchy: forum moved");
    Ok(())
}

// ============================================================================
// Merge
// ============================================================================

/// Folds `source` into `dest` and leaves a redirect behind.
///
/// Returns the number of replies the destination gained.
pub(crate) fn merge<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    source_id: NodeId,
    dest_id: NodeId,
    options: MergeOptions,
) -> Result<usize> {
    if source_id == dest_id {
        return Err(ForumError::invalid_input("cannot merge a topic into itself"));
    }
    let mut source = c.store.load_topic(source_id)?;
    let mut dest = c.store.load_topic(dest_id)?;
    for t in [&source, &dest] {
        if t.post_status == PostStatus::Merged {
            return Err(ForumError::invalid_transition(format!(
                "topic {} has already been merged",
                t.id
            )));
        }
    }

    c.plan.touch_topic(source_id);
    c.plan.touch_topic(dest_id);
    c.plan.touch_forum(source.forum_id);
    c.plan.touch_forum(dest.forum_id);

    c.registry.transfer_topic(source_id, dest_id)?;
    unstick(c, &mut source)?;

    let mut moved = 0;
    for mut reply in c.store.topic_replies(source_id, StatusFilter::All)? {
        reassign(&mut reply, &dest, source_id);
        c.store.save_reply(&reply)?;
        moved += 1;
    }

    if options.convert_original_post {
        let id = c.store.next_id()?;
        let mut opening = Reply::new(
            id,
            dest.id,
            dest.forum_id,
            source.author,
            source.content.clone(),
            source.created_at,
        );
        opening.post_status = match source.post_status {
            PostStatus::Pending => PostStatus::Pending,
            PostStatus::Spam => PostStatus::Spam,
            PostStatus::Trash => PostStatus::Trash,
            _ => PostStatus::Publish,
        };
        opening.extra = source.extra.clone();
        c.store.save_reply(&opening)?;
        moved += 1;
    }

    if options.merge_tags && !source.tags.is_subset(&dest.tags) {
        dest.tags.extend(source.tags.iter().cloned());
        c.store.save_topic(&dest)?;
    }

    source.post_status = PostStatus::Merged;
    source.status_mark = None;
    source.merged_into = Some(dest_id);
    c.store.save_topic(&source)?;

    c.emit(LifecycleEvent::TopicMerged {
        source: source_id,
        destination: dest_id,
        moved,
    });
    debug!(source = %source_id, dest = %dest_id, moved, "hierarchy: topics merged");
    Ok(moved)
}

// ============================================================================
// Split
// ============================================================================

/// Moves `pivot` and every later reply out of `topic_id`.
///
/// Returns the destination topic id.
pub(crate) fn split<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    topic_id: NodeId,
    pivot_id: NodeId,
    options: &SplitOptions,
) -> Result<NodeId> {
    let source = c.store.load_topic(topic_id)?;
    if source.post_status == PostStatus::Merged {
        return Err(ForumError::invalid_transition(format!(
            "topic {} has been merged",
            topic_id
        )));
    }
    let pivot = c.store.load_reply(pivot_id)?;
    if pivot.topic_id != topic_id {
        return Err(ForumError::invalid_transition(format!(
            "reply {} does not belong to topic {}",
            pivot_id, topic_id
        )));
    }

    c.plan.touch_topic(topic_id);
    c.plan.touch_forum(source.forum_id);
    let mut dest = match options.policy {
        SplitPolicy::Reply => new_split_topic(c, &source, &pivot, options)?,
        SplitPolicy::Existing(dest_id) => {
            if dest_id == topic_id {
                return Err(ForumError::invalid_input("cannot split a topic into itself"));
            }
            let dest = c.store.load_topic(dest_id)?;
            if dest.post_status == PostStatus::Merged {
                return Err(ForumError::invalid_transition(format!(
                    "topic {} has been merged",
                    dest_id
                )));
            }
            dest
        }
    };

    c.plan.touch_topic(dest.id);
    c.plan.touch_forum(dest.forum_id);

    if options.copy_tags && !source.tags.is_subset(&dest.tags) {
        dest.tags.extend(source.tags.iter().cloned());
        c.store.save_topic(&dest)?;
    }
    c.registry.copy_topic(topic_id, dest.id)?;

    let pivot_key = pivot.order_key();
    let moving: Vec<Reply> = c
        .store
        .topic_replies(topic_id, StatusFilter::All)?
        .into_iter()
        .filter(|r| r.order_key() >= pivot_key)
        .collect();
    let moving_ids: BTreeSet<NodeId> = moving.iter().map(|r| r.id).collect();

    for mut reply in moving.iter().cloned() {
        reassign(&mut reply, &dest, topic_id);
        // Threading cannot cross topics.
        if reply.reply_to.is_some_and(|p| !moving_ids.contains(&p)) {
            reply.reply_to = None;
        }
        c.store.save_reply(&reply)?;
    }

    c.emit(LifecycleEvent::TopicSplit {
        source: topic_id,
        destination: dest.id,
        moved: moving.len(),
    });
    debug!(source = %topic_id, dest = %dest.id, moved = moving.len(), "hierarchy: topic split");
    Ok(dest.id)
}

fn new_split_topic<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    source: &Topic,
    pivot: &Reply,
    options: &SplitOptions,
) -> Result<Topic> {
    let title = match &options.title {
        Some(t) => t.trim().to_string(),
        None => {
            let derived = excerpt(&pivot.content, c.config.title_excerpt_len);
            if derived.is_empty() {
                format!("Split: {}", source.title)
            } else {
                derived
            }
        }
    };
    let mut check = ValidationResult::ok();
    check_title(&mut check, &title);
    check.into_result()?;

    let id = c.store.next_id()?;
    let mut topic = Topic::new(
        id,
        source.forum_id,
        pivot.author,
        title,
        String::new(),
        pivot.created_at,
    );
    if source.post_status == PostStatus::Closed {
        topic.post_status = PostStatus::Closed;
    }
    c.store.save_topic(&topic)?;

    if options.inherit_sticky && source.sticky != StickyScope::None {
        stick(c, &mut topic, source.sticky)?;
        c.store.save_topic(&topic)?;
    }
    c.emit(LifecycleEvent::TopicCreated {
        topic: id,
        forum: source.forum_id,
    });
    Ok(topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::config::EngineConfig;
    use crate::forum::node::Forum;
    use crate::forum::registry::NoopRegistry;
    use crate::forum::state::MemoryStore;
    use crate::forum::types::{OpContext, UserId};

    fn run<F, T>(store: &MemoryStore, f: F) -> Result<T>
    where
        F: FnOnce(&mut Cascade<'_, MemoryStore>) -> Result<T>,
    {
        let registry = NoopRegistry;
        let config = EngineConfig {
            max_forum_depth: 3,
            ..EngineConfig::default()
        };
        let mut c = Cascade::new(store, &registry, &config, OpContext::at(UserId(9), 10));
        f(&mut c)
    }

    fn forum(store: &MemoryStore, id: u64, parent: Option<u64>) {
        store
            .save_forum(&Forum::new(NodeId(id), parent.map(NodeId), "F", UserId(1), id))
            .unwrap();
    }

    #[test]
    fn test_move_forum_rejects_cycle() {
        let store = MemoryStore::new();
        forum(&store, 1, None);
        forum(&store, 2, Some(1));
        forum(&store, 3, Some(2));

        let err = run(&store, |c| move_forum(c, NodeId(1), Some(NodeId(3)))).unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition(_)));
        let err = run(&store, |c| move_forum(c, NodeId(2), Some(NodeId(2)))).unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition(_)));
    }

    #[test]
    fn test_move_forum_depth_cap() {
        let store = MemoryStore::new();
        forum(&store, 1, None);
        forum(&store, 2, Some(1));
        forum(&store, 3, Some(2));
        forum(&store, 4, None);
        forum(&store, 5, Some(4));

        // 3 levels + a 2-level subtree exceeds depth 3.
        let err = run(&store, |c| move_forum(c, NodeId(4), Some(NodeId(3)))).unwrap_err();
        assert!(matches!(err, ForumError::InvalidInput(_)));
        run(&store, |c| move_forum(c, NodeId(5), Some(NodeId(2)))).unwrap();
        assert_eq!(store.load_forum(NodeId(5)).unwrap().parent, Some(NodeId(2)));
    }

    #[test]
    fn test_move_topic_into_category_fails() {
        let store = MemoryStore::new();
        forum(&store, 1, None);
        let mut category = Forum::new(NodeId(2), None, "C", UserId(1), 2);
        category.forum_type = crate::forum::types::ForumType::Category;
        store.save_forum(&category).unwrap();
        store
            .save_topic(&Topic::new(NodeId(3), NodeId(1), UserId(1), "T", "", 3))
            .unwrap();

        let err = run(&store, |c| move_topic(c, NodeId(3), NodeId(2))).unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition(_)));
    }

    #[test]
    fn test_resolve_follows_redirects() {
        let store = MemoryStore::new();
        let mut a = Topic::new(NodeId(1), NodeId(9), UserId(1), "A", "", 1);
        a.post_status = PostStatus::Merged;
        a.merged_into = Some(NodeId(2));
        let mut b = Topic::new(NodeId(2), NodeId(9), UserId(1), "B", "", 2);
        b.post_status = PostStatus::Merged;
        b.merged_into = Some(NodeId(3));
        let c = Topic::new(NodeId(3), NodeId(9), UserId(1), "C", "", 3);
        for t in [&a, &b, &c] {
            store.save_topic(t).unwrap();
        }

        let lookup = resolve_topic(&store, NodeId(1)).unwrap();
        assert!(lookup.is_redirect());
        assert_eq!(lookup.topic().id, NodeId(3));
        assert!(!resolve_topic(&store, NodeId(3)).unwrap().is_redirect());
    }

    #[test]
    fn test_split_rejects_foreign_pivot() {
        let store = MemoryStore::new();
        forum(&store, 1, None);
        store
            .save_topic(&Topic::new(NodeId(2), NodeId(1), UserId(1), "T", "", 2))
            .unwrap();
        store
            .save_topic(&Topic::new(NodeId(3), NodeId(1), UserId(1), "U", "", 3))
            .unwrap();
        store
            .save_reply(&Reply::new(NodeId(4), NodeId(3), NodeId(1), UserId(1), "r", 4))
            .unwrap();

        let err = run(&store, |c| split(c, NodeId(2), NodeId(4), &SplitOptions::default()))
            .unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition(_)));
    }

    #[test]
    fn test_split_derives_title_from_pivot() {
        let store = MemoryStore::new();
        forum(&store, 1, None);
        store
            .save_topic(&Topic::new(NodeId(2), NodeId(1), UserId(1), "T", "", 2))
            .unwrap();
        store
            .save_reply(&Reply::new(
                NodeId(3),
                NodeId(2),
                NodeId(1),
                UserId(4),
                "Tangent about   borrow checking",
                3,
            ))
            .unwrap();

        let dest = run(&store, |c| split(c, NodeId(2), NodeId(3), &SplitOptions::default())).unwrap();
        let topic = store.load_topic(dest).unwrap();
        assert_eq!(topic.title, "Tangent about borrow checking");
        assert_eq!(topic.author, UserId(4));
        assert_eq!(store.load_reply(NodeId(3)).unwrap().topic_id, dest);
    }
}
