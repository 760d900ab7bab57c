//! Full recount and consistency repair.
//!
//! Rebuilds every denormalized value from source data. Safe to run at any
//! time; running it twice in a row changes nothing the second time.

use crate::error::Result;
use crate::forum::cascade::RecountPlan;
use crate::forum::node::ContentNode;
use crate::forum::storage::{ContentStore, StoreExt};
use crate::forum::types::{NodeId, NodeKind, PostStatus, StatusMark};
use serde::Serialize;
use tracing::{info, warn};

/// Summary of a repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Topics recomputed.
    pub topics: usize,
    /// Forums recomputed.
    pub forums: usize,
    /// Topics newly marked `Orphan` because their forum is gone.
    pub orphaned: Vec<NodeId>,
    /// Replies whose denormalized `forum_id` was out of sync and rewritten.
    pub resynced_replies: usize,
    /// Replies whose topic no longer exists. Left untouched.
    pub dangling_replies: Vec<NodeId>,
    /// Nodes whose recomputation failed.
    pub failed: Vec<NodeId>,
}

/// Marks orphans, resyncs reply forum refs, and recounts everything.
pub fn recount_all<S: ContentStore + ?Sized>(store: &S) -> Result<RepairReport> {
    let mut report = RepairReport::default();
    let mut plan = RecountPlan::new();

    for id in store.list_ids(NodeKind::Topic)? {
        let mut topic = store.load_topic(id)?;
        let forum_exists = matches!(store.load(topic.forum_id)?, Some(ContentNode::Forum(_)));
        if !forum_exists
            && !matches!(
                topic.post_status,
                PostStatus::Orphan | PostStatus::Merged | PostStatus::Trash
            )
        {
            topic.status_mark = Some(StatusMark::direct(topic.post_status));
            topic.post_status = PostStatus::Orphan;
            store.save_topic(&topic)?;
            warn!(topic = %id, forum = %topic.forum_id, "repair: topic orphaned");
            report.orphaned.push(id);
        }
        plan.touch_topic(id);
    }

    for id in store.list_ids(NodeKind::Reply)? {
        let mut reply = store.load_reply(id)?;
        match store.load(reply.topic_id)? {
            Some(ContentNode::Topic(topic)) => {
                if reply.forum_id != topic.forum_id {
                    reply.forum_id = topic.forum_id;
                    store.save_reply(&reply)?;
                    report.resynced_replies += 1;
                }
            }
            _ => report.dangling_replies.push(id),
        }
    }

    for id in store.list_ids(NodeKind::Forum)? {
        plan.touch_forum(id);
    }

    let outcome = plan.execute(store);
    report.topics = outcome.topics;
    report.forums = outcome.forums;
    report.failed = outcome.failed.into_iter().map(|(_, id)| id).collect();

    info!(
        topics = report.topics,
        forums = report.forums,
        orphaned = report.orphaned.len(),
        dangling = report.dangling_replies.len(),
        "repair: recount complete"
    );
    Ok(report)
}
