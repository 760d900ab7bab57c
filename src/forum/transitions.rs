//! State Transition Manager.
//!
//! Status changes on forums, topics and replies, together with their
//! cascades into descendants and their compensating side effects.
//!
//! ## Restore markers
//!
//! Every trash or spam records a [`StatusMark`] on the node it changes. A
//! node changed by an ancestor's cascade carries `cause = Some(ancestor)`;
//! untrash/unspam of that ancestor restores exactly those descendants. A
//! descendant trashed on its own (`cause = None`) is never auto-restored.
//!
//! All functions here only mutate. Recomputation is queued on the cascade's
//! plan and runs after the whole operation has been applied.

use crate::error::{ForumError, Result};
use crate::forum::cascade::{descendant_forums, Cascade};
use crate::forum::events::LifecycleEvent;
use crate::forum::node::{ContentNode, Forum, Reply, Topic};
use crate::forum::storage::{ContentStore, StatusFilter, StoreExt};
use crate::forum::types::{NodeId, NodeKind, PostStatus, StatusMark, StickyScope, UserId};
use tracing::debug;

fn mark(prior: PostStatus, cause: Option<NodeId>) -> StatusMark {
    StatusMark { prior, cause }
}

/// Status a marked node returns to.
fn restored(mark: Option<StatusMark>, from: PostStatus) -> PostStatus {
    match mark {
        Some(m) if m.prior != from => m.prior,
        _ => PostStatus::Publish,
    }
}

fn refuse(kind: NodeKind, id: NodeId, action: &str, status: PostStatus) -> ForumError {
    ForumError::invalid_transition(format!("cannot {} {} {} in status {}", action, kind, id, status))
}

// ============================================================================
// Sticky lists
// ============================================================================

/// Removes `topic` from the global and forum sticky lists.
///
/// Updates `topic.sticky` in place; the caller saves the topic.
pub(crate) fn unstick<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, topic: &mut Topic) -> Result<bool> {
    let mut changed = topic.sticky != StickyScope::None;

    let mut global = c.store.load_global_stickies()?;
    if global.contains(&topic.id) {
        global.retain(|id| *id != topic.id);
        c.store.save_global_stickies(&global)?;
        changed = true;
    }

    if let Some(ContentNode::Forum(mut forum)) = c.store.load(topic.forum_id)? {
        if forum.sticky_topics.contains(&topic.id) {
            forum.sticky_topics.retain(|id| *id != topic.id);
            c.store.save_forum(&forum)?;
            changed = true;
        }
    }

    topic.sticky = StickyScope::None;
    Ok(changed)
}

/// Pins `topic` at `scope`, replacing any previous placement.
pub(crate) fn stick<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    topic: &mut Topic,
    scope: StickyScope,
) -> Result<()> {
    unstick(c, topic)?;
    match scope {
        StickyScope::None => {}
        StickyScope::Forum => {
            let mut forum = c.store.load_forum(topic.forum_id)?;
            forum.sticky_topics.push(topic.id);
            c.store.save_forum(&forum)?;
        }
        StickyScope::Global => {
            let mut global = c.store.load_global_stickies()?;
            global.push(topic.id);
            c.store.save_global_stickies(&global)?;
        }
    }
    topic.sticky = scope;
    Ok(())
}

// ============================================================================
// Trash / untrash
// ============================================================================

/// Moves a node and its live descendants to the trash.
pub(crate) fn trash<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<()> {
    let node = c.store.load_node(id)?;
    let kind = node.kind();
    match node {
        ContentNode::Forum(f) => trash_forum(c, f, None)?,
        ContentNode::Topic(t) => trash_topic(c, t, None)?,
        ContentNode::Reply(r) => trash_reply(c, r)?,
    }
    c.emit(LifecycleEvent::Trashed { kind, node: id });
    Ok(())
}

fn trash_forum<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    forum: Forum,
    cause: Option<NodeId>,
) -> Result<()> {
    if forum.post_status != PostStatus::Publish {
        return Err(refuse(NodeKind::Forum, forum.id, "trash", forum.post_status));
    }
    c.plan.touch_forum(forum.id);

    for topic in c.store.forum_topics(forum.id, StatusFilter::All)? {
        if topic.post_status.can_trash() {
            trash_topic(c, topic, Some(forum.id))?;
        }
    }
    for child in c.store.child_forums(forum.id, StatusFilter::All)? {
        if child.post_status == PostStatus::Publish {
            trash_forum(c, child, Some(forum.id))?;
        }
    }

    // Sticky cleanup above may have rewritten this forum.
    let mut forum = c.store.load_forum(forum.id)?;
    forum.status_mark = Some(mark(forum.post_status, cause));
    forum.post_status = PostStatus::Trash;
    c.store.save_forum(&forum)?;
    debug!(forum = %forum.id, cause = ?cause, "transition: forum trashed");
    Ok(())
}

fn trash_topic<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    mut topic: Topic,
    cause: Option<NodeId>,
) -> Result<()> {
    if !topic.post_status.can_trash() {
        return Err(refuse(NodeKind::Topic, topic.id, "trash", topic.post_status));
    }
    // Queued before any write so an aborted cascade still gets recounted.
    c.plan.touch_topic(topic.id);
    c.plan.touch_forum(topic.forum_id);

    c.registry.remove_topic_everywhere(topic.id)?;
    unstick(c, &mut topic)?;

    let mut cascaded = 0usize;
    for mut reply in c.store.topic_replies(topic.id, StatusFilter::All)? {
        if matches!(reply.post_status, PostStatus::Trash | PostStatus::Spam) {
            continue;
        }
        reply.status_mark = Some(StatusMark::cascaded(reply.post_status, topic.id));
        reply.post_status = PostStatus::Trash;
        c.store.save_reply(&reply)?;
        cascaded += 1;
    }

    topic.status_mark = Some(mark(topic.post_status, cause));
    topic.post_status = PostStatus::Trash;
    c.store.save_topic(&topic)?;
    debug!(topic = %topic.id, replies = cascaded, cause = ?cause, "transition: topic trashed");
    Ok(())
}

fn trash_reply<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut reply: Reply) -> Result<()> {
    if !matches!(reply.post_status, PostStatus::Publish | PostStatus::Pending) {
        return Err(refuse(NodeKind::Reply, reply.id, "trash", reply.post_status));
    }
    c.plan.touch_topic(reply.topic_id);
    reply.status_mark = Some(StatusMark::direct(reply.post_status));
    reply.post_status = PostStatus::Trash;
    c.store.save_reply(&reply)?;
    Ok(())
}

/// Restores a trashed node and the descendants its trash cascaded into.
pub(crate) fn untrash<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<()> {
    let node = c.store.load_node(id)?;
    let kind = node.kind();
    if node.status() != PostStatus::Trash {
        return Err(refuse(kind, id, "untrash", node.status()));
    }
    match node {
        ContentNode::Forum(f) => untrash_forum(c, f)?,
        ContentNode::Topic(t) => untrash_topic(c, t)?,
        ContentNode::Reply(r) => untrash_reply(c, r)?,
    }
    c.emit(LifecycleEvent::Untrashed { kind, node: id });
    Ok(())
}

fn untrash_forum<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, forum: Forum) -> Result<()> {
    c.plan.touch_forum(forum.id);
    for topic in c.store.forum_topics(forum.id, StatusFilter::Only(PostStatus::Trash))? {
        if topic.status_mark.is_some_and(|m| m.caused_by(forum.id)) {
            untrash_topic(c, topic)?;
        }
    }
    for child in c.store.child_forums(forum.id, StatusFilter::Only(PostStatus::Trash))? {
        if child.status_mark.is_some_and(|m| m.caused_by(forum.id)) {
            untrash_forum(c, child)?;
        }
    }

    let mut forum = c.store.load_forum(forum.id)?;
    forum.post_status = PostStatus::Publish;
    forum.status_mark = None;
    c.store.save_forum(&forum)?;
    debug!(forum = %forum.id, "transition: forum restored");
    Ok(())
}

fn untrash_topic<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut topic: Topic) -> Result<()> {
    c.plan.touch_topic(topic.id);
    c.plan.touch_forum(topic.forum_id);
    let mut restored_replies = 0usize;
    for mut reply in c.store.topic_replies(topic.id, StatusFilter::Only(PostStatus::Trash))? {
        if !reply.status_mark.is_some_and(|m| m.caused_by(topic.id)) {
            continue;
        }
        reply.post_status = restored(reply.status_mark, PostStatus::Trash);
        reply.status_mark = None;
        c.store.save_reply(&reply)?;
        restored_replies += 1;
    }

    topic.post_status = restored(topic.status_mark, PostStatus::Trash);
    topic.status_mark = None;
    c.store.save_topic(&topic)?;
    debug!(topic = %topic.id, replies = restored_replies, status = %topic.post_status, "transition: topic restored");
    Ok(())
}

fn untrash_reply<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut reply: Reply) -> Result<()> {
    c.plan.touch_topic(reply.topic_id);
    reply.post_status = restored(reply.status_mark, PostStatus::Trash);
    reply.status_mark = None;
    c.store.save_reply(&reply)?;
    Ok(())
}

// ============================================================================
// Spam / unspam
// ============================================================================

/// Marks a topic (and its live replies) or a single reply as spam.
pub(crate) fn spam<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<()> {
    let node = c.store.load_node(id)?;
    let kind = node.kind();
    match node {
        ContentNode::Forum(f) => return Err(refuse(NodeKind::Forum, f.id, "spam", f.post_status)),
        ContentNode::Topic(t) => spam_topic(c, t)?,
        ContentNode::Reply(r) => spam_reply(c, r)?,
    }
    c.emit(LifecycleEvent::Spammed { kind, node: id });
    Ok(())
}

fn spam_topic<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut topic: Topic) -> Result<()> {
    if !topic.post_status.can_spam() {
        return Err(refuse(NodeKind::Topic, topic.id, "spam", topic.post_status));
    }
    c.plan.touch_topic(topic.id);
    c.plan.touch_forum(topic.forum_id);
    for mut reply in c.store.topic_replies(topic.id, StatusFilter::All)? {
        if !matches!(reply.post_status, PostStatus::Publish | PostStatus::Pending) {
            continue;
        }
        reply.status_mark = Some(StatusMark::cascaded(reply.post_status, topic.id));
        reply.post_status = PostStatus::Spam;
        c.store.save_reply(&reply)?;
    }
    topic.status_mark = Some(StatusMark::direct(topic.post_status));
    topic.post_status = PostStatus::Spam;
    c.store.save_topic(&topic)?;
    Ok(())
}

fn spam_reply<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut reply: Reply) -> Result<()> {
    if !matches!(reply.post_status, PostStatus::Publish | PostStatus::Pending) {
        return Err(refuse(NodeKind::Reply, reply.id, "spam", reply.post_status));
    }
    c.plan.touch_topic(reply.topic_id);
    reply.status_mark = Some(StatusMark::direct(reply.post_status));
    reply.post_status = PostStatus::Spam;
    c.store.save_reply(&reply)?;
    Ok(())
}

/// Reverses `spam` on a topic or reply.
pub(crate) fn unspam<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<()> {
    let node = c.store.load_node(id)?;
    let kind = node.kind();
    if node.status() != PostStatus::Spam {
        return Err(refuse(kind, id, "unspam", node.status()));
    }
    match node {
        ContentNode::Forum(_) => {}
        ContentNode::Topic(t) => unspam_topic(c, t)?,
        ContentNode::Reply(r) => unspam_reply(c, r)?,
    }
    c.emit(LifecycleEvent::Unspammed { kind, node: id });
    Ok(())
}

fn unspam_topic<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut topic: Topic) -> Result<()> {
    c.plan.touch_topic(topic.id);
    c.plan.touch_forum(topic.forum_id);
    for mut reply in c.store.topic_replies(topic.id, StatusFilter::Only(PostStatus::Spam))? {
        if !reply.status_mark.is_some_and(|m| m.caused_by(topic.id)) {
            continue;
        }
        reply.post_status = restored(reply.status_mark, PostStatus::Spam);
        reply.status_mark = None;
        c.store.save_reply(&reply)?;
    }
    topic.post_status = restored(topic.status_mark, PostStatus::Spam);
    topic.status_mark = None;
    c.store.save_topic(&topic)?;
    Ok(())
}

fn unspam_reply<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut reply: Reply) -> Result<()> {
    c.plan.touch_topic(reply.topic_id);
    reply.post_status = restored(reply.status_mark, PostStatus::Spam);
    reply.status_mark = None;
    c.store.save_reply(&reply)?;
    Ok(())
}

/// Spams every live topic and reply written by `author`.
pub(crate) fn spam_author<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, author: UserId) -> Result<usize> {
    let mut affected = 0;
    for node in c.store.query_by_author(author)? {
        if let ContentNode::Topic(t) = node {
            if t.post_status.can_spam() {
                spam_topic(c, t)?;
                affected += 1;
            }
        }
    }
    // Reloaded: topic cascades above already changed some of these replies.
    for node in c.store.query_by_author(author)? {
        if let ContentNode::Reply(r) = node {
            if matches!(r.post_status, PostStatus::Publish | PostStatus::Pending) {
                spam_reply(c, r)?;
                affected += 1;
            }
        }
    }
    c.emit(LifecycleEvent::AuthorSpammed { author, affected });
    Ok(affected)
}

/// Restores the author's spammed topics, then their directly spammed replies.
pub(crate) fn unspam_author<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, author: UserId) -> Result<usize> {
    let mut affected = 0;
    for node in c.store.query_by_author(author)? {
        if let ContentNode::Topic(t) = node {
            if t.post_status == PostStatus::Spam {
                unspam_topic(c, t)?;
                affected += 1;
            }
        }
    }
    for node in c.store.query_by_author(author)? {
        if let ContentNode::Reply(r) = node {
            let direct = r.status_mark.map_or(true, |m| m.cause.is_none());
            if r.post_status == PostStatus::Spam && direct {
                unspam_reply(c, r)?;
                affected += 1;
            }
        }
    }
    c.emit(LifecycleEvent::AuthorUnspammed { author, affected });
    Ok(affected)
}

// ============================================================================
// Hard delete
// ============================================================================

/// Permanently removes a node and everything beneath it.
///
/// Returns the number of nodes removed.
pub(crate) fn delete<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<usize> {
    let node = c.store.load_node(id)?;
    let kind = node.kind();
    let removed = match node {
        ContentNode::Forum(f) => delete_forum(c, f)?,
        ContentNode::Topic(t) => delete_topic(c, t)?,
        ContentNode::Reply(r) => delete_reply(c, r)?,
    };
    c.emit(LifecycleEvent::Deleted {
        kind,
        node: id,
        removed,
    });
    Ok(removed)
}

fn delete_forum<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut forum: Forum) -> Result<usize> {
    forum.counts = Default::default();
    forum.last_topic_id = None;
    forum.last_reply_id = None;
    forum.last_active = None;
    if let Some(parent) = forum.parent {
        c.plan.touch_forum(parent);
    }
    c.store.save_forum(&forum)?;

    let mut removed = 0;
    for f in descendant_forums(c.store, forum)?.into_iter().rev() {
        for topic in c.store.forum_topics(f.id, StatusFilter::All)? {
            removed += delete_topic(c, topic)?;
        }
        c.store.delete(f.id)?;
        removed += 1;
        debug!(forum = %f.id, "transition: forum deleted");
    }
    Ok(removed)
}

fn delete_topic<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, mut topic: Topic) -> Result<usize> {
    c.plan.touch_forum(topic.forum_id);
    c.registry.remove_topic_everywhere(topic.id)?;
    unstick(c, &mut topic)?;

    let replies = c.store.topic_replies(topic.id, StatusFilter::All)?;
    for reply in &replies {
        c.store.delete(reply.id)?;
    }
    c.store.delete(topic.id)?;
    debug!(topic = %topic.id, replies = replies.len(), "transition: topic deleted");
    Ok(replies.len() + 1)
}

fn delete_reply<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, reply: Reply) -> Result<usize> {
    c.plan.touch_topic(reply.topic_id);
    // Threaded children move up to the deleted reply's own parent.
    for mut child in c.store.topic_replies(reply.topic_id, StatusFilter::All)? {
        if child.reply_to == Some(reply.id) {
            child.reply_to = reply.reply_to;
            c.store.save_reply(&child)?;
        }
    }
    c.store.delete(reply.id)?;
    Ok(1)
}

// ============================================================================
// Close / open, stick / unstick
// ============================================================================

/// `Publish -> Closed`.
pub(crate) fn close_topic<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<()> {
    let mut topic = c.store.load_topic(id)?;
    if topic.post_status != PostStatus::Publish {
        return Err(refuse(NodeKind::Topic, id, "close", topic.post_status));
    }
    topic.post_status = PostStatus::Closed;
    c.store.save_topic(&topic)?;
    c.plan.touch_topic(id);
    c.emit(LifecycleEvent::TopicClosed { topic: id });
    Ok(())
}

/// `Closed -> Publish`.
pub(crate) fn open_topic<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<()> {
    let mut topic = c.store.load_topic(id)?;
    if topic.post_status != PostStatus::Closed {
        return Err(refuse(NodeKind::Topic, id, "open", topic.post_status));
    }
    topic.post_status = PostStatus::Publish;
    c.store.save_topic(&topic)?;
    c.plan.touch_topic(id);
    c.emit(LifecycleEvent::TopicOpened { topic: id });
    Ok(())
}

pub(crate) fn stick_topic<S: ContentStore + ?Sized>(
    c: &mut Cascade<'_, S>,
    id: NodeId,
    scope: StickyScope,
) -> Result<()> {
    if scope == StickyScope::None {
        return unstick_topic(c, id);
    }
    let mut topic = c.store.load_topic(id)?;
    if matches!(
        topic.post_status,
        PostStatus::Trash | PostStatus::Spam | PostStatus::Merged
    ) {
        return Err(refuse(NodeKind::Topic, id, "stick", topic.post_status));
    }
    stick(c, &mut topic, scope)?;
    c.store.save_topic(&topic)?;
    c.emit(LifecycleEvent::TopicStuck { topic: id, scope });
    Ok(())
}

/// Unsticking a topic that is not sticky is a no-op.
pub(crate) fn unstick_topic<S: ContentStore + ?Sized>(c: &mut Cascade<'_, S>, id: NodeId) -> Result<()> {
    let mut topic = c.store.load_topic(id)?;
    if unstick(c, &mut topic)? {
        c.store.save_topic(&topic)?;
        c.emit(LifecycleEvent::TopicUnstuck { topic: id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::config::EngineConfig;
    use crate::forum::registry::NoopRegistry;
    use crate::forum::state::MemoryStore;
    use crate::forum::types::OpContext;

    fn seed(store: &MemoryStore) {
        store
            .save_forum(&Forum::new(NodeId(1), None, "F", UserId(1), 1))
            .unwrap();
        store
            .save_topic(&Topic::new(NodeId(2), NodeId(1), UserId(1), "T", "", 2))
            .unwrap();
        for id in 3..=5 {
            store
                .save_reply(&Reply::new(NodeId(id), NodeId(2), NodeId(1), UserId(2), "r", id))
                .unwrap();
        }
    }

    fn run<F, T>(store: &MemoryStore, f: F) -> Result<T>
    where
        F: FnOnce(&mut Cascade<'_, MemoryStore>) -> Result<T>,
    {
        let registry = NoopRegistry;
        let config = EngineConfig::default();
        let mut c = Cascade::new(store, &registry, &config, OpContext::at(UserId(9), 10));
        f(&mut c)
    }

    #[test]
    fn test_trash_marks_cascaded_replies() {
        let store = MemoryStore::new();
        seed(&store);
        run(&store, |c| trash(c, NodeId(3))).unwrap();
        run(&store, |c| trash(c, NodeId(2))).unwrap();

        let r3 = store.load_reply(NodeId(3)).unwrap();
        let r4 = store.load_reply(NodeId(4)).unwrap();
        assert_eq!(r3.status_mark.unwrap().cause, None);
        assert!(r4.status_mark.unwrap().caused_by(NodeId(2)));

        run(&store, |c| untrash(c, NodeId(2))).unwrap();
        assert_eq!(store.load_reply(NodeId(3)).unwrap().post_status, PostStatus::Trash);
        assert_eq!(store.load_reply(NodeId(4)).unwrap().post_status, PostStatus::Publish);
        assert_eq!(store.load_topic(NodeId(2)).unwrap().post_status, PostStatus::Publish);
    }

    #[test]
    fn test_untrash_requires_trash() {
        let store = MemoryStore::new();
        seed(&store);
        let err = run(&store, |c| untrash(c, NodeId(2))).unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition(_)));
    }

    #[test]
    fn test_closed_topic_restores_closed() {
        let store = MemoryStore::new();
        seed(&store);
        run(&store, |c| close_topic(c, NodeId(2))).unwrap();
        run(&store, |c| trash(c, NodeId(2))).unwrap();
        run(&store, |c| untrash(c, NodeId(2))).unwrap();
        assert_eq!(store.load_topic(NodeId(2)).unwrap().post_status, PostStatus::Closed);
    }

    #[test]
    fn test_trash_unsticks() {
        let store = MemoryStore::new();
        seed(&store);
        run(&store, |c| stick_topic(c, NodeId(2), StickyScope::Forum)).unwrap();
        assert_eq!(store.load_forum(NodeId(1)).unwrap().sticky_topics, vec![NodeId(2)]);

        run(&store, |c| trash(c, NodeId(2))).unwrap();
        assert!(store.load_forum(NodeId(1)).unwrap().sticky_topics.is_empty());
        assert_eq!(store.load_topic(NodeId(2)).unwrap().sticky, StickyScope::None);
    }

    #[test]
    fn test_stick_switches_scope() {
        let store = MemoryStore::new();
        seed(&store);
        run(&store, |c| stick_topic(c, NodeId(2), StickyScope::Forum)).unwrap();
        run(&store, |c| stick_topic(c, NodeId(2), StickyScope::Global)).unwrap();
        assert!(store.load_forum(NodeId(1)).unwrap().sticky_topics.is_empty());
        assert_eq!(store.load_global_stickies().unwrap(), vec![NodeId(2)]);
    }

    #[test]
    fn test_spam_topic_cascades_and_unspam_restores() {
        let store = MemoryStore::new();
        seed(&store);
        run(&store, |c| spam(c, NodeId(4))).unwrap();
        run(&store, |c| spam(c, NodeId(2))).unwrap();
        assert_eq!(store.load_reply(NodeId(3)).unwrap().post_status, PostStatus::Spam);

        run(&store, |c| unspam(c, NodeId(2))).unwrap();
        assert_eq!(store.load_reply(NodeId(3)).unwrap().post_status, PostStatus::Publish);
        // Spammed on its own before the topic: stays spam.
        assert_eq!(store.load_reply(NodeId(4)).unwrap().post_status, PostStatus::Spam);
    }

    #[test]
    fn test_forum_cannot_be_spammed() {
        let store = MemoryStore::new();
        seed(&store);
        assert!(run(&store, |c| spam(c, NodeId(1))).is_err());
    }

    #[test]
    fn test_delete_reply_reparents_threaded_children() {
        let store = MemoryStore::new();
        seed(&store);
        let mut r4 = store.load_reply(NodeId(4)).unwrap();
        r4.reply_to = Some(NodeId(3));
        store.save_reply(&r4).unwrap();
        let mut r5 = store.load_reply(NodeId(5)).unwrap();
        r5.reply_to = Some(NodeId(4));
        store.save_reply(&r5).unwrap();

        run(&store, |c| delete(c, NodeId(4))).unwrap();
        assert_eq!(store.load_reply(NodeId(5)).unwrap().reply_to, Some(NodeId(3)));
    }

    #[test]
    fn test_spam_author() {
        let store = MemoryStore::new();
        seed(&store);
        let affected = run(&store, |c| spam_author(c, UserId(2))).unwrap();
        assert_eq!(affected, 3);
        let restored = run(&store, |c| unspam_author(c, UserId(2))).unwrap();
        assert_eq!(restored, 3);
        assert_eq!(store.load_reply(NodeId(5)).unwrap().post_status, PostStatus::Publish);
    }
}
