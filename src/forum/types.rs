//! Core value types for the forum hierarchy.
//!
//! - `NodeId` / `UserId`: opaque numeric identifiers
//! - `NodeKind`: discriminator for forums, topics and replies
//! - `PostStatus`: lifecycle status shared by all three kinds
//! - `StatusMark`: remembers what a trash/spam cascade displaced
//! - `LastActive`: the "last activity" pointer kept on forums and topics
//! - `OpContext`: explicit actor and clock for a mutation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns the current time in milliseconds since the Unix epoch.
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Identifier of a forum, topic or reply. Allocated by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

/// Identifier of a user (author or acting moderator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Type discriminator for content nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    /// Container of topics and/or child forums.
    Forum = 1,
    /// Discussion thread inside a forum.
    Topic = 2,
    /// Message inside a topic.
    Reply = 3,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Forum => write!(f, "forum"),
            NodeKind::Topic => write!(f, "topic"),
            NodeKind::Reply => write!(f, "reply"),
        }
    }
}

/// Lifecycle status stored on every node.
///
/// Hard deletion is not a status: deleted nodes are gone from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PostStatus {
    /// Live and visible.
    Publish = 1,
    /// Topic is live but accepts no new replies.
    Closed = 2,
    /// Awaiting moderation.
    Pending = 3,
    /// Marked as spam (soft-hidden).
    Spam = 4,
    /// In the trash (soft-deleted, restorable).
    Trash = 5,
    /// Topic whose forum no longer exists.
    Orphan = 6,
    /// Topic folded into another topic; see `Topic::merged_into`.
    Merged = 7,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostStatus::Publish => "publish",
            PostStatus::Closed => "closed",
            PostStatus::Pending => "pending",
            PostStatus::Spam => "spam",
            PostStatus::Trash => "trash",
            PostStatus::Orphan => "orphan",
            PostStatus::Merged => "merged",
        };
        f.write_str(name)
    }
}

impl PostStatus {
    /// Returns true if a node of `kind` in this status is included in the
    /// default aggregate counts.
    pub fn is_countable(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Topic => matches!(self, PostStatus::Publish | PostStatus::Closed),
            NodeKind::Forum | NodeKind::Reply => matches!(self, PostStatus::Publish),
        }
    }

    /// Returns true if this status is included in the hidden-inclusive totals.
    pub fn is_in_total(&self) -> bool {
        !matches!(self, PostStatus::Merged)
    }

    /// Returns true if this status can be stored on a node of `kind`.
    pub fn is_valid_for(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Forum => matches!(self, PostStatus::Publish | PostStatus::Trash),
            NodeKind::Topic => true,
            NodeKind::Reply => matches!(
                self,
                PostStatus::Publish | PostStatus::Pending | PostStatus::Spam | PostStatus::Trash
            ),
        }
    }

    /// Returns true if `trash` may be applied from this status.
    pub fn can_trash(&self) -> bool {
        matches!(
            self,
            PostStatus::Publish | PostStatus::Closed | PostStatus::Pending | PostStatus::Orphan
        )
    }

    /// Returns true if `spam` may be applied from this status.
    pub fn can_spam(&self) -> bool {
        matches!(
            self,
            PostStatus::Publish | PostStatus::Closed | PostStatus::Pending
        )
    }
}

/// Record of the status a trash/spam transition replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMark {
    /// Status to restore on untrash/unspam.
    pub prior: PostStatus,
    /// Ancestor whose cascade applied the transition; `None` when the node
    /// itself was the target.
    pub cause: Option<NodeId>,
}

impl StatusMark {
    /// Mark for a node targeted directly.
    pub fn direct(prior: PostStatus) -> Self {
        Self { prior, cause: None }
    }

    /// Mark for a node changed by the cascade of `cause`.
    pub fn cascaded(prior: PostStatus, cause: NodeId) -> Self {
        Self {
            prior,
            cause: Some(cause),
        }
    }

    /// Returns true if this node was changed by `ancestor`'s cascade.
    pub fn caused_by(&self, ancestor: NodeId) -> bool {
        self.cause == Some(ancestor)
    }
}

/// "Last activity" pointer: the most recent live node in a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastActive {
    /// The reply (or topic, when it has no countable replies) that was active.
    pub id: NodeId,
    /// Creation time of that node.
    pub time: u64,
    /// Author of that node.
    pub author: UserId,
}

/// Forum container type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ForumType {
    /// Holds child forums only.
    Category,
    /// Holds topics (and possibly child forums).
    #[default]
    Forum,
}

/// Forum visibility/open state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ForumStatus {
    /// New topics accepted.
    #[default]
    Open,
    /// No new topics.
    Closed,
    /// Visible to members only.
    Private,
    /// Visible to moderators only.
    Hidden,
}

/// Sticky scope of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StickyScope {
    /// Normal ordering.
    #[default]
    None,
    /// Pinned to the top of its own forum.
    Forum,
    /// Pinned to the top of every forum listing.
    Global,
}

impl fmt::Display for StickyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StickyScope::None => write!(f, "none"),
            StickyScope::Forum => write!(f, "forum"),
            StickyScope::Global => write!(f, "global"),
        }
    }
}

/// Actor and clock for one top-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpContext {
    /// User performing the operation, recorded on events.
    pub actor: UserId,
    /// Operation time in milliseconds; used as `created_at` for new nodes.
    pub now: u64,
}

impl OpContext {
    /// Context stamped with the current wall-clock time.
    pub fn new(actor: UserId) -> Self {
        Self {
            actor,
            now: current_timestamp_millis(),
        }
    }

    /// Context with an explicit timestamp.
    pub fn at(actor: UserId, now: u64) -> Self {
        Self { actor, now }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countable_statuses() {
        assert!(PostStatus::Publish.is_countable(NodeKind::Reply));
        assert!(!PostStatus::Closed.is_countable(NodeKind::Reply));
        assert!(PostStatus::Closed.is_countable(NodeKind::Topic));
        assert!(!PostStatus::Spam.is_countable(NodeKind::Topic));
        assert!(!PostStatus::Trash.is_countable(NodeKind::Forum));
    }

    #[test]
    fn test_total_excludes_merged_only() {
        assert!(PostStatus::Trash.is_in_total());
        assert!(PostStatus::Spam.is_in_total());
        assert!(PostStatus::Pending.is_in_total());
        assert!(!PostStatus::Merged.is_in_total());
    }

    #[test]
    fn test_valid_statuses_per_kind() {
        assert!(!PostStatus::Closed.is_valid_for(NodeKind::Reply));
        assert!(!PostStatus::Spam.is_valid_for(NodeKind::Forum));
        assert!(PostStatus::Orphan.is_valid_for(NodeKind::Topic));
    }

    #[test]
    fn test_status_mark_cause() {
        let mark = StatusMark::cascaded(PostStatus::Publish, NodeId(4));
        assert!(mark.caused_by(NodeId(4)));
        assert!(!mark.caused_by(NodeId(5)));
        assert!(!StatusMark::direct(PostStatus::Publish).caused_by(NodeId(4)));
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeId(12).to_string(), "#12");
        assert_eq!(PostStatus::Trash.to_string(), "trash");
        assert_eq!(NodeKind::Reply.to_string(), "reply");
    }
}
