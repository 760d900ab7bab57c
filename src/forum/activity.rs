//! Last-Activity Tracker.
//!
//! A topic's last-active node is its newest countable reply by
//! `(created_at, id)`, or the topic itself when it has none. A forum's is the
//! newest among its countable topics and countable child forums, compared by
//! `(last_active.time, topic id)`.

use crate::error::Result;
use crate::forum::node::{Forum, Reply, Topic};
use crate::forum::storage::{ContentStore, StatusFilter, StoreExt};
use crate::forum::types::{LastActive, NodeId, NodeKind};
use tracing::trace;

/// Sets `last_reply_id` and `last_active` on `topic` from its replies.
pub fn apply_topic_last_active(topic: &mut Topic, replies: &[Reply]) -> bool {
    let newest = replies
        .iter()
        .filter(|r| r.is_countable())
        .max_by_key(|r| r.order_key());

    let (last_reply_id, last_active) = match newest {
        Some(r) => (
            Some(r.id),
            LastActive {
                id: r.id,
                time: r.created_at,
                author: r.author,
            },
        ),
        None => (
            None,
            LastActive {
                id: topic.id,
                time: topic.created_at,
                author: topic.author,
            },
        ),
    };

    let changed = topic.last_reply_id != last_reply_id || topic.last_active != last_active;
    topic.last_reply_id = last_reply_id;
    topic.last_active = last_active;
    changed
}

/// Candidate pointer taken from a topic or a child forum.
struct Candidate {
    key: (u64, NodeId),
    active: LastActive,
    topic: NodeId,
    reply: Option<NodeId>,
}

/// Sets `last_active`, `last_topic_id` and `last_reply_id` on `forum`.
pub fn apply_forum_last_active(forum: &mut Forum, topics: &[Topic], children: &[Forum]) -> bool {
    let from_topics = topics.iter().filter(|t| t.is_countable()).map(|t| Candidate {
        key: (t.last_active.time, t.id),
        active: t.last_active,
        topic: t.id,
        reply: t.last_reply_id,
    });

    let from_children = children
        .iter()
        .filter(|c| c.post_status.is_countable(NodeKind::Forum))
        .filter_map(|c| match (c.last_active, c.last_topic_id) {
            (Some(active), Some(topic)) => Some(Candidate {
                key: (active.time, topic),
                active,
                topic,
                reply: c.last_reply_id,
            }),
            _ => None,
        });

    let best = from_topics.chain(from_children).max_by_key(|c| c.key);

    let (last_active, last_topic_id, last_reply_id) = match best {
        Some(c) => (Some(c.active), Some(c.topic), c.reply),
        None => (None, None, None),
    };

    let changed = forum.last_active != last_active
        || forum.last_topic_id != last_topic_id
        || forum.last_reply_id != last_reply_id;
    forum.last_active = last_active;
    forum.last_topic_id = last_topic_id;
    forum.last_reply_id = last_reply_id;
    changed
}

/// Recomputes one topic's last-active pointer and writes it on change.
pub fn recompute_topic_last_active<S: ContentStore + ?Sized>(
    store: &S,
    topic_id: NodeId,
) -> Result<bool> {
    let mut topic = store.load_topic(topic_id)?;
    let replies = store.topic_replies(topic_id, StatusFilter::Countable)?;
    let changed = apply_topic_last_active(&mut topic, &replies);
    if changed {
        store.save_topic(&topic)?;
    }
    trace!(topic = %topic_id, last_active = %topic.last_active.id, changed, "activity: topic");
    Ok(changed)
}

/// Recomputes one forum's last-active pointer and writes it on change.
pub fn recompute_forum_last_active<S: ContentStore + ?Sized>(
    store: &S,
    forum_id: NodeId,
) -> Result<bool> {
    let mut forum = store.load_forum(forum_id)?;
    let topics = store.forum_topics(forum_id, StatusFilter::Countable)?;
    let children = store.child_forums(forum_id, StatusFilter::Countable)?;
    let changed = apply_forum_last_active(&mut forum, &topics, &children);
    if changed {
        store.save_forum(&forum)?;
    }
    trace!(forum = %forum_id, last_topic = ?forum.last_topic_id, changed, "activity: forum");
    Ok(changed)
}
