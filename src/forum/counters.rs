//! Counter Engine: denormalized topic and forum aggregates.
//!
//! The `tally_*` functions compute aggregates from already-loaded children
//! and report whether anything changed. The `recompute_*` functions load one
//! node's children, tally, and write back only on change; they do not walk
//! the ancestor chain (the cascade planner does that, see `cascade`).
//!
//! Forum aggregates read child topics' stored counts, so topics must be
//! tallied before their forum.

use crate::error::Result;
use crate::forum::node::{Forum, ForumCounts, Reply, Topic};
use crate::forum::storage::{ContentStore, StatusFilter, StoreExt};
use crate::forum::types::{NodeId, NodeKind, UserId};
use std::collections::BTreeSet;
use tracing::trace;

/// Recomputes `reply_count`, `total_reply_count` and `voice_count` from every
/// stored reply of `topic`.
pub fn tally_topic(topic: &mut Topic, replies: &[Reply]) -> bool {
    let mut reply_count = 0u64;
    let mut total_reply_count = 0u64;
    let mut voices: BTreeSet<UserId> = BTreeSet::new();
    voices.insert(topic.author);

    for reply in replies {
        if reply.post_status.is_in_total() {
            total_reply_count += 1;
        }
        if reply.is_countable() {
            reply_count += 1;
            voices.insert(reply.author);
        }
    }

    let voice_count = voices.len() as u64;
    let changed = topic.reply_count != reply_count
        || topic.total_reply_count != total_reply_count
        || topic.voice_count != voice_count;

    topic.reply_count = reply_count;
    topic.total_reply_count = total_reply_count;
    topic.voice_count = voice_count;
    changed
}

/// Recomputes a forum's aggregates from its direct topics and child forums.
///
/// For a regular forum `topic_count`/`reply_count` cover direct topics only.
/// A category adds its child forums' counts. `subtree_*` always covers
/// direct topics plus every countable descendant forum.
pub fn tally_forum(forum: &mut Forum, topics: &[Topic], children: &[Forum]) -> bool {
    let mut counts = ForumCounts::default();

    for topic in topics {
        if topic.is_countable() {
            counts.topic_count += 1;
            counts.reply_count += topic.reply_count;
        }
        if topic.post_status.is_in_total() {
            counts.total_topic_count += 1;
            counts.total_reply_count += topic.total_reply_count;
        }
    }

    counts.subtree_topic_count = counts.topic_count;
    counts.subtree_reply_count = counts.reply_count;

    let category = forum.is_category();
    for child in children {
        if category {
            counts.total_topic_count += child.counts.total_topic_count;
            counts.total_reply_count += child.counts.total_reply_count;
        }
        if !child.post_status.is_countable(NodeKind::Forum) {
            continue;
        }
        counts.forum_count += 1;
        counts.subtree_topic_count += child.counts.subtree_topic_count;
        counts.subtree_reply_count += child.counts.subtree_reply_count;
        if category {
            counts.topic_count += child.counts.topic_count;
            counts.reply_count += child.counts.reply_count;
        }
    }

    let changed = forum.counts != counts;
    forum.counts = counts;
    changed
}

/// Recomputes one topic's counts and writes them if they changed.
pub fn recompute_topic_counts<S: ContentStore + ?Sized>(store: &S, topic_id: NodeId) -> Result<bool> {
    let mut topic = store.load_topic(topic_id)?;
    let replies = store.topic_replies(topic_id, StatusFilter::All)?;
    let changed = tally_topic(&mut topic, &replies);
    if changed {
        store.save_topic(&topic)?;
    }
    trace!(topic = %topic_id, reply_count = topic.reply_count, changed, "counters: topic");
    Ok(changed)
}

/// Recomputes one forum's counts and writes them if they changed.
pub fn recompute_forum_counts<S: ContentStore + ?Sized>(store: &S, forum_id: NodeId) -> Result<bool> {
    let mut forum = store.load_forum(forum_id)?;
    let topics = store.forum_topics(forum_id, StatusFilter::All)?;
    let children = store.child_forums(forum_id, StatusFilter::All)?;
    let changed = tally_forum(&mut forum, &topics, &children);
    if changed {
        store.save_forum(&forum)?;
    }
    trace!(forum = %forum_id, topic_count = forum.counts.topic_count, changed, "counters: forum");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::types::{ForumType, PostStatus};

    fn reply(id: u64, author: u64, status: PostStatus) -> Reply {
        let mut r = Reply::new(NodeId(id), NodeId(2), NodeId(1), UserId(author), "r", id);
        r.post_status = status;
        r
    }

    fn topic_with(id: u64, replies: u64, total: u64, status: PostStatus) -> Topic {
        let mut t = Topic::new(NodeId(id), NodeId(1), UserId(1), "T", "", id);
        t.reply_count = replies;
        t.total_reply_count = total;
        t.post_status = status;
        t
    }

    #[test]
    fn test_tally_topic_counts_by_status() {
        let mut topic = Topic::new(NodeId(2), NodeId(1), UserId(1), "T", "", 1);
        let replies = vec![
            reply(3, 2, PostStatus::Publish),
            reply(4, 3, PostStatus::Spam),
            reply(5, 2, PostStatus::Trash),
            reply(6, 4, PostStatus::Publish),
        ];
        assert!(tally_topic(&mut topic, &replies));
        assert_eq!(topic.reply_count, 2);
        assert_eq!(topic.total_reply_count, 4);
        assert_eq!(topic.voice_count, 3);
        assert!(!tally_topic(&mut topic, &replies));
    }

    #[test]
    fn test_tally_forum_direct_topics() {
        let mut forum = Forum::new(NodeId(1), None, "F", UserId(1), 0);
        let topics = vec![
            topic_with(2, 3, 4, PostStatus::Publish),
            topic_with(3, 2, 2, PostStatus::Closed),
            topic_with(4, 0, 5, PostStatus::Trash),
            topic_with(5, 0, 0, PostStatus::Merged),
        ];
        tally_forum(&mut forum, &topics, &[]);
        assert_eq!(forum.counts.topic_count, 2);
        assert_eq!(forum.counts.reply_count, 5);
        assert_eq!(forum.counts.total_topic_count, 3);
        assert_eq!(forum.counts.total_reply_count, 11);
        assert_eq!(forum.counts.subtree_reply_count, 5);
    }

    #[test]
    fn test_tally_category_sums_children() {
        let mut category = Forum::new(NodeId(1), None, "C", UserId(1), 0);
        category.forum_type = ForumType::Category;

        let mut a = Forum::new(NodeId(2), Some(NodeId(1)), "A", UserId(1), 0);
        a.counts.topic_count = 2;
        a.counts.reply_count = 7;
        a.counts.subtree_topic_count = 3;
        a.counts.subtree_reply_count = 9;
        let mut b = a.clone();
        b.id = NodeId(3);
        b.post_status = PostStatus::Trash;

        tally_forum(&mut category, &[], &[a.clone(), b]);
        assert_eq!(category.counts.topic_count, 2);
        assert_eq!(category.counts.reply_count, 7);
        assert_eq!(category.counts.forum_count, 1);
        assert_eq!(category.counts.subtree_topic_count, 3);
        assert_eq!(category.counts.subtree_reply_count, 9);

        let mut parent = Forum::new(NodeId(9), None, "P", UserId(1), 0);
        tally_forum(&mut parent, &[], &[a]);
        assert_eq!(parent.counts.topic_count, 0);
        assert_eq!(parent.counts.subtree_topic_count, 3);
    }
}
