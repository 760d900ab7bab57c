//! Paginated listings and forum query helpers.
//!
//! ## Pagination
//!
//! Uses cursor-based pagination over a `(timestamp, id)` position. The cursor
//! is bincode-serialized and base64url-encoded so callers can treat it as an
//! opaque string.
//!
//! Topic listings pin stickies to the top of the first page: global stickies
//! first, then the forum's own, each in pinned order. Stickies are not
//! repeated on later pages and do not count towards the page limit.

use crate::error::{ForumError, Result};
use crate::forum::constants::{CURSOR_ENGINE, MAX_PAGE_SIZE};
use crate::forum::node::{ContentNode, Reply, Topic};
use crate::forum::storage::{ContentStore, StatusFilter, StoreExt};
use crate::forum::types::NodeId;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Position of the last item on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub time: u64,
    pub id: NodeId,
}

impl Cursor {
    pub fn new(time: u64, id: NodeId) -> Self {
        Self { time, id }
    }

    /// Encodes the cursor as an opaque URL-safe string.
    pub fn encode(&self) -> Result<String> {
        let bytes = bincode::serialize(self)
            .map_err(|e| ForumError::serialization(format!("Failed to encode cursor: {}", e)))?;
        Ok(CURSOR_ENGINE.encode(bytes))
    }

    /// Decodes a string produced by [`Cursor::encode`].
    pub fn decode(raw: &str) -> Result<Self> {
        let bytes = CURSOR_ENGINE
            .decode(raw.trim())
            .map_err(|e| ForumError::invalid_input(format!("Malformed cursor: {}", e)))?;
        bincode::deserialize(&bytes)
            .map_err(|e| ForumError::invalid_input(format!("Malformed cursor: {}", e)))
    }

    fn key(&self) -> (u64, NodeId) {
        (self.time, self.id)
    }
}

/// A page of results plus the cursor for the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

fn topic_key(t: &Topic) -> (u64, NodeId) {
    (t.last_active.time, t.id)
}

/// Live topics of `forum`, most recently active first.
pub fn list_topics<S: ContentStore + ?Sized>(
    store: &S,
    forum_id: NodeId,
    cursor: Option<&str>,
    limit: usize,
) -> Result<Page<Topic>> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let forum = store.load_forum(forum_id)?;
    let after = cursor.map(Cursor::decode).transpose()?;

    let globals = store.load_global_stickies()?;
    let pinned: Vec<NodeId> = globals
        .iter()
        .chain(forum.sticky_topics.iter())
        .copied()
        .collect();
    let pinned_set: BTreeSet<NodeId> = pinned.iter().copied().collect();

    let mut items = Vec::new();
    if after.is_none() {
        let mut shown = BTreeSet::new();
        for id in &pinned {
            if !shown.insert(*id) {
                continue;
            }
            if let Some(ContentNode::Topic(t)) = store.load(*id)? {
                if t.is_countable() {
                    items.push(t);
                }
            }
        }
    }

    let mut regular: Vec<Topic> = store
        .forum_topics(forum_id, StatusFilter::Countable)?
        .into_iter()
        .filter(|t| !pinned_set.contains(&t.id))
        .filter(|t| after.map_or(true, |c| topic_key(t) < c.key()))
        .collect();
    regular.sort_by(|a, b| topic_key(b).cmp(&topic_key(a)));

    let has_more = regular.len() > limit;
    regular.truncate(limit);
    let next_cursor = match regular.last() {
        Some(t) if has_more => Some(Cursor::new(t.last_active.time, t.id).encode()?),
        _ => None,
    };
    items.extend(regular);

    Ok(Page { items, next_cursor })
}

/// Live replies of `topic` in creation order.
pub fn list_replies<S: ContentStore + ?Sized>(
    store: &S,
    topic_id: NodeId,
    cursor: Option<&str>,
    limit: usize,
) -> Result<Page<Reply>> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    store.load_topic(topic_id)?;
    let after = cursor.map(Cursor::decode).transpose()?;

    let mut replies: Vec<Reply> = store
        .topic_replies(topic_id, StatusFilter::Countable)?
        .into_iter()
        .filter(|r| after.map_or(true, |c| r.order_key() > c.key()))
        .collect();

    let has_more = replies.len() > limit;
    replies.truncate(limit);
    let next_cursor = match replies.last() {
        Some(r) if has_more => Some(Cursor::new(r.created_at, r.id).encode()?),
        _ => None,
    };

    Ok(Page {
        items: replies,
        next_cursor,
    })
}

/// Ids of the live topics directly in `forum`.
pub fn forum_query_topic_ids<S: ContentStore + ?Sized>(store: &S, forum: NodeId) -> Result<Vec<NodeId>> {
    Ok(store
        .forum_topics(forum, StatusFilter::Countable)?
        .into_iter()
        .map(|t| t.id)
        .collect())
}

/// Ids of the live direct child forums of `forum`.
pub fn forum_query_subforum_ids<S: ContentStore + ?Sized>(store: &S, forum: NodeId) -> Result<Vec<NodeId>> {
    Ok(store
        .child_forums(forum, StatusFilter::Countable)?
        .into_iter()
        .map(|f| f.id)
        .collect())
}

/// Newest live reply across the live topics directly in `forum`.
pub fn forum_query_last_reply_id<S: ContentStore + ?Sized>(
    store: &S,
    forum: NodeId,
) -> Result<Option<NodeId>> {
    let mut newest: Option<(u64, NodeId)> = None;
    for topic in store.forum_topics(forum, StatusFilter::Countable)? {
        if let Some(last) = store.topic_replies(topic.id, StatusFilter::Countable)?.last() {
            let key = last.order_key();
            if newest.map_or(true, |n| key > n) {
                newest = Some(key);
            }
        }
    }
    Ok(newest.map(|(_, id)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::node::Forum;
    use crate::forum::state::MemoryStore;
    use crate::forum::types::{PostStatus, UserId};

    fn seed_topics(store: &MemoryStore, count: u64) {
        store
            .save_forum(&Forum::new(NodeId(1), None, "F", UserId(1), 0))
            .unwrap();
        for i in 0..count {
            let id = 10 + i;
            store
                .save_topic(&Topic::new(NodeId(id), NodeId(1), UserId(1), "T", "", id))
                .unwrap();
        }
    }

    #[test]
    fn test_cursor_encode_decode() {
        let cursor = Cursor::new(1_700_000_000_000, NodeId(42));
        let encoded = cursor.encode().unwrap();
        assert!(!encoded.contains('='));
        assert_eq!(Cursor::decode(&encoded).unwrap(), cursor);
        assert!(matches!(
            Cursor::decode("not a cursor!"),
            Err(ForumError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_topics_paginate_newest_first() {
        let store = MemoryStore::new();
        seed_topics(&store, 5);

        let first = list_topics(&store, NodeId(1), None, 2).unwrap();
        let ids: Vec<u64> = first.items.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![14, 13]);

        let second = list_topics(&store, NodeId(1), first.next_cursor.as_deref(), 2).unwrap();
        let third = list_topics(&store, NodeId(1), second.next_cursor.as_deref(), 2).unwrap();
        assert_eq!(third.items.len(), 1);
        assert_eq!(third.items[0].id, NodeId(10));
        assert!(third.is_last());
    }

    #[test]
    fn test_stickies_lead_first_page_only() {
        let store = MemoryStore::new();
        seed_topics(&store, 4);
        let mut forum = store.load_forum(NodeId(1)).unwrap();
        forum.sticky_topics = vec![NodeId(10)];
        store.save_forum(&forum).unwrap();
        store.save_global_stickies(&[NodeId(11)]).unwrap();

        let first = list_topics(&store, NodeId(1), None, 1).unwrap();
        let ids: Vec<u64> = first.items.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![11, 10, 13]);

        let second = list_topics(&store, NodeId(1), first.next_cursor.as_deref(), 5).unwrap();
        let ids: Vec<u64> = second.items.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![12]);
    }

    #[test]
    fn test_replies_and_query_helpers() {
        let store = MemoryStore::new();
        seed_topics(&store, 1);
        for id in 20..25 {
            let mut r = Reply::new(NodeId(id), NodeId(10), NodeId(1), UserId(2), "r", id);
            if id == 24 {
                r.post_status = PostStatus::Trash;
            }
            store.save_reply(&r).unwrap();
        }

        let page = list_replies(&store, NodeId(10), None, 3).unwrap();
        assert_eq!(page.items.len(), 3);
        let rest = list_replies(&store, NodeId(10), page.next_cursor.as_deref(), 3).unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0].id, NodeId(23));

        assert_eq!(forum_query_topic_ids(&store, NodeId(1)).unwrap(), vec![NodeId(10)]);
        assert!(forum_query_subforum_ids(&store, NodeId(1)).unwrap().is_empty());
        assert_eq!(
            forum_query_last_reply_id(&store, NodeId(1)).unwrap(),
            Some(NodeId(23))
        );
    }
}
