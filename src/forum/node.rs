//! Content node records and the `ContentNode` wrapper.
//!
//! `Forum`, `Topic` and `Reply` carry explicit typed fields for every piece of
//! state the lifecycle rules depend on. `extra` holds genuinely unschematized
//! data and is validated at the boundary (see `validation`).
//!
//! Ownership is expressed by parent-id edges only: a forum points at its
//! parent forum, a topic at its forum, a reply at its topic. Child lists are
//! derived by `ContentStore::query_children`.

use crate::forum::types::{
    ForumStatus, ForumType, LastActive, NodeId, NodeKind, PostStatus, StatusMark, StickyScope,
    UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Free-form per-node extension data.
pub type Extensions = BTreeMap<String, String>;

/// Denormalized aggregates stored on a forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForumCounts {
    /// Countable topics (direct; categories add their child forums' counts).
    pub topic_count: u64,
    /// Countable replies of the topics counted in `topic_count`.
    pub reply_count: u64,
    /// Topics in any non-merged status, same scope as `topic_count`.
    pub total_topic_count: u64,
    /// Replies in any status of the topics counted in `total_topic_count`.
    pub total_reply_count: u64,
    /// Countable direct child forums.
    pub forum_count: u64,
    /// Countable topics in this forum and every countable descendant forum.
    pub subtree_topic_count: u64,
    /// Countable replies in this forum and every countable descendant forum.
    pub subtree_reply_count: u64,
}

/// A forum: a container node that may nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forum {
    pub id: NodeId,
    /// Parent forum; `None` for a top-level forum.
    pub parent: Option<NodeId>,
    pub title: String,
    pub content: String,
    pub author: UserId,
    pub created_at: u64,
    pub forum_type: ForumType,
    pub forum_status: ForumStatus,
    pub post_status: PostStatus,
    pub status_mark: Option<StatusMark>,
    /// Forum-sticky topics in pinned order.
    pub sticky_topics: Vec<NodeId>,
    pub counts: ForumCounts,
    pub last_topic_id: Option<NodeId>,
    pub last_reply_id: Option<NodeId>,
    pub last_active: Option<LastActive>,
    pub extra: Extensions,
}

impl Forum {
    /// Creates a published, open forum with zeroed aggregates.
    pub fn new(
        id: NodeId,
        parent: Option<NodeId>,
        title: impl Into<String>,
        author: UserId,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            parent,
            title: title.into(),
            content: String::new(),
            author,
            created_at,
            forum_type: ForumType::Forum,
            forum_status: ForumStatus::Open,
            post_status: PostStatus::Publish,
            status_mark: None,
            sticky_topics: Vec::new(),
            counts: ForumCounts::default(),
            last_topic_id: None,
            last_reply_id: None,
            last_active: None,
            extra: Extensions::new(),
        }
    }

    /// Returns true if this forum is a category.
    pub fn is_category(&self) -> bool {
        self.forum_type == ForumType::Category
    }
}

/// A topic: a discussion thread owned by one forum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: NodeId,
    pub forum_id: NodeId,
    pub author: UserId,
    pub title: String,
    pub content: String,
    pub created_at: u64,
    pub post_status: PostStatus,
    pub status_mark: Option<StatusMark>,
    pub sticky: StickyScope,
    pub tags: BTreeSet<String>,
    /// Countable replies.
    pub reply_count: u64,
    /// Replies in any status; always `>= reply_count`.
    pub total_reply_count: u64,
    /// Distinct authors among the topic author and its countable replies.
    pub voice_count: u64,
    pub last_reply_id: Option<NodeId>,
    /// The topic itself when it has no countable replies.
    pub last_active: LastActive,
    /// Destination topic once merged away.
    pub merged_into: Option<NodeId>,
    pub extra: Extensions,
}

impl Topic {
    /// Creates a published, non-sticky topic that is its own last-active node.
    pub fn new(
        id: NodeId,
        forum_id: NodeId,
        author: UserId,
        title: impl Into<String>,
        content: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            forum_id,
            author,
            title: title.into(),
            content: content.into(),
            created_at,
            post_status: PostStatus::Publish,
            status_mark: None,
            sticky: StickyScope::None,
            tags: BTreeSet::new(),
            reply_count: 0,
            total_reply_count: 0,
            voice_count: 1,
            last_reply_id: None,
            last_active: LastActive {
                id,
                time: created_at,
                author,
            },
            merged_into: None,
            extra: Extensions::new(),
        }
    }

    /// Returns true if this topic is counted in forum aggregates.
    pub fn is_countable(&self) -> bool {
        self.post_status.is_countable(NodeKind::Topic)
    }
}

/// A reply: a message within a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: NodeId,
    pub topic_id: NodeId,
    /// Copy of the owning topic's forum, kept in sync by moves/merges/splits.
    pub forum_id: NodeId,
    pub author: UserId,
    pub content: String,
    pub created_at: u64,
    pub post_status: PostStatus,
    pub status_mark: Option<StatusMark>,
    /// Threaded-display parent within the same topic.
    pub reply_to: Option<NodeId>,
    pub extra: Extensions,
}

impl Reply {
    /// Creates a published reply.
    pub fn new(
        id: NodeId,
        topic_id: NodeId,
        forum_id: NodeId,
        author: UserId,
        content: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            topic_id,
            forum_id,
            author,
            content: content.into(),
            created_at,
            post_status: PostStatus::Publish,
            status_mark: None,
            reply_to: None,
            extra: Extensions::new(),
        }
    }

    /// Returns true if this reply is counted in topic aggregates.
    pub fn is_countable(&self) -> bool {
        self.post_status.is_countable(NodeKind::Reply)
    }

    /// Position key used for every reply ordering decision.
    pub fn order_key(&self) -> (u64, NodeId) {
        (self.created_at, self.id)
    }
}

/// A wrapper enum for all stored node kinds.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentNode {
    Forum(Forum),
    Topic(Topic),
    Reply(Reply),
}

impl fmt::Debug for ContentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentNode::Forum(n) => f
                .debug_struct("ContentNode::Forum")
                .field("id", &n.id)
                .field("title", &n.title)
                .field("status", &n.post_status)
                .finish(),
            ContentNode::Topic(n) => f
                .debug_struct("ContentNode::Topic")
                .field("id", &n.id)
                .field("title", &n.title)
                .field("status", &n.post_status)
                .finish(),
            ContentNode::Reply(n) => f
                .debug_struct("ContentNode::Reply")
                .field("id", &n.id)
                .field("topic", &n.topic_id)
                .field("status", &n.post_status)
                .finish(),
        }
    }
}

impl ContentNode {
    pub fn id(&self) -> NodeId {
        match self {
            ContentNode::Forum(n) => n.id,
            ContentNode::Topic(n) => n.id,
            ContentNode::Reply(n) => n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            ContentNode::Forum(_) => NodeKind::Forum,
            ContentNode::Topic(_) => NodeKind::Topic,
            ContentNode::Reply(_) => NodeKind::Reply,
        }
    }

    /// The parent edge: parent forum, owning forum, or owning topic.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            ContentNode::Forum(n) => n.parent,
            ContentNode::Topic(n) => Some(n.forum_id),
            ContentNode::Reply(n) => Some(n.topic_id),
        }
    }

    pub fn status(&self) -> PostStatus {
        match self {
            ContentNode::Forum(n) => n.post_status,
            ContentNode::Topic(n) => n.post_status,
            ContentNode::Reply(n) => n.post_status,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            ContentNode::Forum(n) => n.created_at,
            ContentNode::Topic(n) => n.created_at,
            ContentNode::Reply(n) => n.created_at,
        }
    }

    pub fn author(&self) -> UserId {
        match self {
            ContentNode::Forum(n) => n.author,
            ContentNode::Topic(n) => n.author,
            ContentNode::Reply(n) => n.author,
        }
    }

    /// Topic tags; empty for forums and replies.
    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        match self {
            ContentNode::Topic(n) => Some(&n.tags),
            _ => None,
        }
    }

    /// Sort key for child listings.
    pub fn order_key(&self) -> (u64, NodeId) {
        (self.created_at(), self.id())
    }

    pub fn into_forum(self) -> Option<Forum> {
        match self {
            ContentNode::Forum(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_topic(self) -> Option<Topic> {
        match self {
            ContentNode::Topic(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_reply(self) -> Option<Reply> {
        match self {
            ContentNode::Reply(n) => Some(n),
            _ => None,
        }
    }
}

impl From<Forum> for ContentNode {
    fn from(node: Forum) -> Self {
        ContentNode::Forum(node)
    }
}

impl From<Topic> for ContentNode {
    fn from(node: Topic) -> Self {
        ContentNode::Topic(node)
    }
}

impl From<Reply> for ContentNode {
    fn from(node: Reply) -> Self {
        ContentNode::Reply(node)
    }
}
