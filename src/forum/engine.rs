//! The `ForumEngine` facade.
//!
//! Every mutation follows the same sequence:
//!
//! 1. Resolve and lock the root forums of the touched subtrees, plus the
//!    global sticky key when the operation may rewrite that list.
//! 2. Apply status/structural mutations through a [`Cascade`].
//! 3. Execute the cascade's recount plan bottom-up.
//! 4. Release the locks, then deliver buffered events to listeners.
//!
//! Recount failures from step 3 are kept in a stale set and retried the next
//! time a node is read through the engine. The retry takes the same subtree
//! locks without waiting; a busy subtree stays queued for a later read.

use crate::error::{ForumError, Result};
use crate::forum::cascade::{ancestor_chain, root_key, Cascade, RecountOutcome, RecountPlan};
use crate::forum::config::EngineConfig;
use crate::forum::events::{EventBus, LifecycleEvent, LifecycleListener};
use crate::forum::hierarchy::{self, MergeOptions, SplitOptions, SplitPolicy, TopicLookup};
use crate::forum::listing::{self, Page};
use crate::forum::lock::{SubtreeGuard, SubtreeLocks, GLOBAL_STICKY_KEY};
use crate::forum::node::{ContentNode, Extensions, Forum, Reply, Topic};
use crate::forum::registry::{EngagementRegistry, NoopNotifier, NoopRegistry, Notifier};
use crate::forum::repair::{self, RepairReport};
use crate::forum::storage::{ContentStore, StoreExt};
use crate::forum::transitions;
use crate::forum::types::{
    ForumStatus, ForumType, NodeId, NodeKind, OpContext, PostStatus, StickyScope, UserId,
};
use crate::forum::validation::{check_content, check_extra, check_title, normalize_tags, ValidationResult};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

// ============================================================================
// Request types
// ============================================================================

/// Parameters for [`ForumEngine::new_forum`].
#[derive(Debug, Clone, Default)]
pub struct NewForum {
    pub parent: Option<NodeId>,
    pub title: String,
    pub content: String,
    pub forum_type: ForumType,
    pub forum_status: ForumStatus,
    pub extra: Extensions,
}

impl NewForum {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn under(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn category(mut self) -> Self {
        self.forum_type = ForumType::Category;
        self
    }
}

/// Parameters for [`ForumEngine::new_topic`].
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub forum: NodeId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Create in `Pending` (awaiting moderation) instead of `Publish`.
    pub pending: bool,
    pub extra: Extensions,
}

impl NewTopic {
    pub fn new(forum: NodeId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            forum,
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            pending: false,
            extra: Extensions::new(),
        }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Parameters for [`ForumEngine::new_reply`].
#[derive(Debug, Clone)]
pub struct NewReply {
    pub topic: NodeId,
    pub content: String,
    pub reply_to: Option<NodeId>,
    pub pending: bool,
    pub extra: Extensions,
}

impl NewReply {
    pub fn new(topic: NodeId, content: impl Into<String>) -> Self {
        Self {
            topic,
            content: content.into(),
            reply_to: None,
            pending: false,
            extra: Extensions::new(),
        }
    }

    pub fn reply_to(mut self, parent: NodeId) -> Self {
        self.reply_to = Some(parent);
        self
    }
}

/// Changes applied by [`ForumEngine::edit_topic`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct TopicEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Moving to another forum on edit performs a full move.
    pub forum: Option<NodeId>,
    pub extra: Option<Extensions>,
}

/// Changes applied by [`ForumEngine::edit_reply`].
#[derive(Debug, Clone, Default)]
pub struct ReplyEdit {
    pub content: Option<String>,
    /// `Some(None)` clears the threading parent.
    pub reply_to: Option<Option<NodeId>>,
    pub extra: Option<Extensions>,
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`ForumEngine`]. Listeners run in the order they are added.
pub struct ForumEngineBuilder<S: ContentStore> {
    store: Arc<S>,
    config: EngineConfig,
    bus: EventBus,
    registry: Arc<dyn EngagementRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl<S: ContentStore> ForumEngineBuilder<S> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn EngagementRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.bus.register(listener);
        self
    }

    pub fn build(self) -> Result<ForumEngine<S>> {
        self.config.validate()?;
        info!(
            listeners = self.bus.len(),
            lock_timeout = ?self.config.lock_timeout,
            max_depth = self.config.max_forum_depth,
            "engine: built"
        );
        Ok(ForumEngine {
            store: self.store,
            config: self.config,
            locks: SubtreeLocks::new(),
            bus: self.bus,
            registry: self.registry,
            notifier: self.notifier,
            stale: Mutex::new(RecountPlan::new()),
        })
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Hierarchical content lifecycle manager over a [`ContentStore`].
pub struct ForumEngine<S: ContentStore> {
    store: Arc<S>,
    config: EngineConfig,
    locks: SubtreeLocks,
    bus: EventBus,
    registry: Arc<dyn EngagementRegistry>,
    notifier: Arc<dyn Notifier>,
    stale: Mutex<RecountPlan>,
}

impl<S: ContentStore> std::fmt::Debug for ForumEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForumEngine")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<S: ContentStore> ForumEngine<S> {
    pub fn builder(store: Arc<S>) -> ForumEngineBuilder<S> {
        ForumEngineBuilder {
            store,
            config: EngineConfig::default(),
            bus: EventBus::new(),
            registry: Arc::new(NoopRegistry),
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Engine with default config and no-op collaborators.
    pub fn new(store: Arc<S>) -> Result<Self> {
        Self::builder(store).build()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------------

    fn resolve_keys(&self, nodes: &[NodeId]) -> Result<BTreeSet<NodeId>> {
        nodes.iter().map(|id| root_key(&*self.store, *id)).collect()
    }

    /// Locks the subtrees containing `nodes`, re-checking roots after the wait.
    fn lock_subtrees(&self, nodes: &[NodeId], stickies: bool) -> Result<SubtreeGuard<'_>> {
        let keys = self.resolve_keys(nodes)?;
        let extra = stickies.then_some(GLOBAL_STICKY_KEY);
        let guard = self
            .locks
            .acquire(keys.iter().copied().chain(extra), self.config.lock_timeout)?;
        let current = self.resolve_keys(nodes)?;
        if current != keys {
            return Err(ForumError::lock_timeout(
                "subtree was reparented while waiting for its lock",
            ));
        }
        Ok(guard)
    }

    fn defer(&self, failed: &[(NodeKind, NodeId)]) {
        if failed.is_empty() {
            return;
        }
        if let Ok(mut stale) = self.stale.lock() {
            for (kind, id) in failed {
                stale.touch(*kind, *id);
            }
        }
    }

    /// Lock keys of the stale nodes that still exist.
    fn stale_keys(&self, nodes: &[(NodeKind, NodeId)]) -> BTreeSet<NodeId> {
        nodes
            .iter()
            .filter_map(|(_, id)| root_key(&*self.store, *id).ok())
            .collect()
    }

    /// Retries recomputation of nodes whose last recount failed.
    ///
    /// Runs only if every affected subtree is free right now. Otherwise the
    /// nodes stay queued and an empty outcome is returned.
    pub fn refresh_stale(&self) -> RecountOutcome {
        let plan = match self.stale.lock() {
            Ok(mut stale) if !stale.is_empty() => std::mem::take(&mut *stale),
            _ => return RecountOutcome::default(),
        };
        let nodes: Vec<(NodeKind, NodeId)> = plan.nodes().collect();
        let keys = self.stale_keys(&nodes);

        let guard = match self.locks.try_acquire(keys.iter().copied()) {
            Ok(Some(guard)) => guard,
            _ => {
                debug!(pending = nodes.len(), "engine: stale refresh postponed, subtree busy");
                self.defer(&nodes);
                return RecountOutcome::default();
            }
        };
        if self.stale_keys(&nodes) != keys {
            drop(guard);
            self.defer(&nodes);
            return RecountOutcome::default();
        }

        let outcome = plan.execute(&*self.store);
        drop(guard);
        self.defer(&outcome.failed);
        outcome
    }

    /// Whether any node is waiting for a retried recount.
    pub fn has_stale(&self) -> bool {
        self.stale.lock().map(|s| !s.is_empty()).unwrap_or(false)
    }

    fn run<T, F>(&self, ctx: OpContext, op: &'static str, touched: &[NodeId], f: F) -> Result<T>
    where
        F: FnOnce(&mut Cascade<'_, S>) -> Result<T>,
    {
        self.run_locked(ctx, op, touched, false, f)
    }

    /// Like `run`, also holding the global sticky list.
    fn run_sticky<T, F>(&self, ctx: OpContext, op: &'static str, touched: &[NodeId], f: F) -> Result<T>
    where
        F: FnOnce(&mut Cascade<'_, S>) -> Result<T>,
    {
        self.run_locked(ctx, op, touched, true, f)
    }

    fn run_locked<T, F>(
        &self,
        ctx: OpContext,
        op: &'static str,
        touched: &[NodeId],
        stickies: bool,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut Cascade<'_, S>) -> Result<T>,
    {
        let guard = self.lock_subtrees(touched, stickies)?;
        let mut cascade = Cascade::new(&*self.store, &*self.registry, &self.config, ctx);
        let result = f(&mut cascade);
        let (plan, events) = cascade.into_parts();

        // Partial mutations still get recounted when the operation aborts.
        let outcome = plan.execute(&*self.store);
        self.defer(&outcome.failed);
        drop(guard);

        match result {
            Ok(value) => {
                info!(op, actor = %ctx.actor, events = events.len(), "engine: operation complete");
                self.bus.emit_all(&events);
                Ok(value)
            }
            Err(e) => {
                warn!(op, actor = %ctx.actor, error = %e, "engine: operation failed");
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Result<ContentNode> {
        self.refresh_stale();
        self.store.load_node(id)
    }

    pub fn forum(&self, id: NodeId) -> Result<Forum> {
        self.refresh_stale();
        self.store.load_forum(id)
    }

    pub fn topic(&self, id: NodeId) -> Result<Topic> {
        self.refresh_stale();
        self.store.load_topic(id)
    }

    pub fn reply(&self, id: NodeId) -> Result<Reply> {
        self.refresh_stale();
        self.store.load_reply(id)
    }

    /// Loads a topic, following merge redirects.
    pub fn resolve_topic(&self, id: NodeId) -> Result<TopicLookup> {
        self.refresh_stale();
        hierarchy::resolve_topic(&*self.store, id)
    }

    fn page_limit(&self, limit: usize) -> usize {
        if limit == 0 {
            self.config.default_page_size
        } else {
            limit
        }
    }

    pub fn list_topics(&self, forum: NodeId, cursor: Option<&str>, limit: usize) -> Result<Page<Topic>> {
        self.refresh_stale();
        listing::list_topics(&*self.store, forum, cursor, self.page_limit(limit))
    }

    pub fn list_replies(&self, topic: NodeId, cursor: Option<&str>, limit: usize) -> Result<Page<Reply>> {
        self.refresh_stale();
        listing::list_replies(&*self.store, topic, cursor, self.page_limit(limit))
    }

    pub fn forum_query_topic_ids(&self, forum: NodeId) -> Result<Vec<NodeId>> {
        listing::forum_query_topic_ids(&*self.store, forum)
    }

    pub fn forum_query_subforum_ids(&self, forum: NodeId) -> Result<Vec<NodeId>> {
        listing::forum_query_subforum_ids(&*self.store, forum)
    }

    pub fn forum_query_last_reply_id(&self, forum: NodeId) -> Result<Option<NodeId>> {
        listing::forum_query_last_reply_id(&*self.store, forum)
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    pub fn new_forum(&self, ctx: OpContext, req: NewForum) -> Result<NodeId> {
        let mut check = ValidationResult::ok();
        check_title(&mut check, &req.title);
        check_content(&mut check, &req.content);
        check_extra(&mut check, &req.extra);
        check.into_result()?;

        let touched: Vec<NodeId> = req.parent.into_iter().collect();
        self.run(ctx, "new_forum", &touched, |c| {
            let depth = match req.parent {
                None => 0,
                Some(parent) => {
                    let p = c.store.load_forum(parent)?;
                    if p.post_status == PostStatus::Trash {
                        return Err(ForumError::invalid_transition(format!(
                            "forum {} is trashed",
                            parent
                        )));
                    }
                    ancestor_chain(c.store, parent)?.len()
                }
            };
            if depth + 1 > c.config.max_forum_depth {
                return Err(ForumError::invalid_input(format!(
                    "forum nesting would reach depth {} (max {})",
                    depth + 1,
                    c.config.max_forum_depth
                )));
            }

            let id = c.store.next_id()?;
            let mut forum = Forum::new(id, req.parent, req.title.trim(), c.ctx.actor, c.ctx.now);
            forum.content = req.content;
            forum.forum_type = req.forum_type;
            forum.forum_status = req.forum_status;
            forum.extra = req.extra;
            c.store.save_forum(&forum)?;

            c.plan.touch_forum(id);
            c.emit(LifecycleEvent::ForumCreated { forum: id });
            Ok(id)
        })
    }

    pub fn new_topic(&self, ctx: OpContext, req: NewTopic) -> Result<NodeId> {
        let mut check = ValidationResult::ok();
        check_title(&mut check, &req.title);
        check_content(&mut check, &req.content);
        check_extra(&mut check, &req.extra);
        let tags = normalize_tags(&mut check, &req.tags);
        check.into_result()?;

        self.run(ctx, "new_topic", &[req.forum], |c| {
            let forum = c.store.load_forum(req.forum)?;
            if forum.is_category() {
                return Err(ForumError::invalid_transition(format!(
                    "forum {} is a category and cannot hold topics",
                    forum.id
                )));
            }
            if forum.post_status != PostStatus::Publish || forum.forum_status == ForumStatus::Closed {
                return Err(ForumError::invalid_transition(format!(
                    "forum {} is not accepting topics",
                    forum.id
                )));
            }

            let id = c.store.next_id()?;
            let mut topic = Topic::new(id, forum.id, c.ctx.actor, req.title.trim(), req.content, c.ctx.now);
            topic.tags = tags;
            topic.extra = req.extra;
            if req.pending {
                topic.post_status = PostStatus::Pending;
            }
            c.store.save_topic(&topic)?;

            c.plan.touch_topic(id);
            c.emit(LifecycleEvent::TopicCreated {
                topic: id,
                forum: forum.id,
            });
            Ok(id)
        })
    }

    /// Creates a reply and notifies the topic's subscribers.
    ///
    /// Notification failures are logged and never fail the call.
    pub fn new_reply(&self, ctx: OpContext, req: NewReply) -> Result<NodeId> {
        let mut check = ValidationResult::ok();
        if req.content.trim().is_empty() {
            check.add_error("Reply content must not be empty".to_string());
        }
        check_content(&mut check, &req.content);
        check_extra(&mut check, &req.extra);
        check.into_result()?;

        let topic_id = req.topic;
        let pending = req.pending;
        let id = self.run(ctx, "new_reply", &[topic_id], |c| {
            let topic = c.store.load_topic(topic_id)?;
            if topic.post_status != PostStatus::Publish {
                return Err(ForumError::invalid_transition(format!(
                    "topic {} is {} and accepts no replies",
                    topic_id, topic.post_status
                )));
            }
            if let Some(parent) = req.reply_to {
                if c.store.load_reply(parent)?.topic_id != topic_id {
                    return Err(ForumError::invalid_input(format!(
                        "reply {} is not in topic {}",
                        parent, topic_id
                    )));
                }
            }

            let id = c.store.next_id()?;
            let mut reply = Reply::new(id, topic_id, topic.forum_id, c.ctx.actor, req.content, c.ctx.now);
            reply.reply_to = req.reply_to;
            reply.extra = req.extra;
            if pending {
                reply.post_status = PostStatus::Pending;
            }
            c.store.save_reply(&reply)?;

            c.plan.touch_topic(topic_id);
            c.emit(LifecycleEvent::ReplyCreated {
                reply: id,
                topic: topic_id,
            });
            Ok(id)
        })?;

        if !pending {
            if let Err(e) = self.notifier.notify_subscribers(topic_id, id) {
                warn!(topic = %topic_id, reply = %id, error = %e, "engine: subscriber notification failed");
            }
        }
        Ok(id)
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    pub fn edit_topic(&self, ctx: OpContext, id: NodeId, edit: TopicEdit) -> Result<()> {
        let mut check = ValidationResult::ok();
        if let Some(title) = &edit.title {
            check_title(&mut check, title);
        }
        if let Some(content) = &edit.content {
            check_content(&mut check, content);
        }
        if let Some(extra) = &edit.extra {
            check_extra(&mut check, extra);
        }
        let tags = edit.tags.as_ref().map(|t| normalize_tags(&mut check, t));
        check.into_result()?;

        let mut touched = vec![id];
        touched.extend(edit.forum);
        self.run(ctx, "edit_topic", &touched, |c| {
            let topic = c.store.load_topic(id)?;
            if topic.post_status == PostStatus::Merged {
                return Err(ForumError::invalid_transition(format!(
                    "topic {} has been merged",
                    id
                )));
            }
            // A rejected move must leave the topic untouched.
            if let Some(forum) = edit.forum {
                hierarchy::move_topic(c, id, forum)?;
            }

            let mut topic = c.store.load_topic(id)?;
            if let Some(title) = edit.title {
                topic.title = title.trim().to_string();
            }
            if let Some(content) = edit.content {
                topic.content = content;
            }
            if let Some(tags) = tags {
                topic.tags = tags;
            }
            if let Some(extra) = edit.extra {
                topic.extra = extra;
            }
            c.store.save_topic(&topic)?;
            c.emit(LifecycleEvent::TopicEdited { topic: id });
            Ok(())
        })
    }

    pub fn edit_reply(&self, ctx: OpContext, id: NodeId, edit: ReplyEdit) -> Result<()> {
        let mut check = ValidationResult::ok();
        if let Some(content) = &edit.content {
            if content.trim().is_empty() {
                check.add_error("Reply content must not be empty".to_string());
            }
            check_content(&mut check, content);
        }
        if let Some(extra) = &edit.extra {
            check_extra(&mut check, extra);
        }
        check.into_result()?;

        self.run(ctx, "edit_reply", &[id], |c| {
            let mut reply = c.store.load_reply(id)?;
            if let Some(content) = edit.content {
                reply.content = content;
            }
            if let Some(reply_to) = edit.reply_to {
                if let Some(parent) = reply_to {
                    if parent == id || c.store.load_reply(parent)?.topic_id != reply.topic_id {
                        return Err(ForumError::invalid_input(format!(
                            "reply {} cannot thread under {}",
                            id, parent
                        )));
                    }
                }
                reply.reply_to = reply_to;
            }
            if let Some(extra) = edit.extra {
                reply.extra = extra;
            }
            c.store.save_reply(&reply)?;
            c.emit(LifecycleEvent::ReplyEdited { reply: id });
            Ok(())
        })
    }

    // ------------------------------------------------------------------------
    // Status transitions
    // ------------------------------------------------------------------------

    pub fn trash(&self, ctx: OpContext, id: NodeId) -> Result<()> {
        self.run_sticky(ctx, "trash", &[id], |c| transitions::trash(c, id))
    }

    pub fn untrash(&self, ctx: OpContext, id: NodeId) -> Result<()> {
        self.run(ctx, "untrash", &[id], |c| transitions::untrash(c, id))
    }

    pub fn spam(&self, ctx: OpContext, id: NodeId) -> Result<()> {
        self.run(ctx, "spam", &[id], |c| transitions::spam(c, id))
    }

    pub fn unspam(&self, ctx: OpContext, id: NodeId) -> Result<()> {
        self.run(ctx, "unspam", &[id], |c| transitions::unspam(c, id))
    }

    /// Hard-deletes a node and its subtree; returns the number of nodes removed.
    pub fn delete(&self, ctx: OpContext, id: NodeId) -> Result<usize> {
        self.run_sticky(ctx, "delete", &[id], |c| transitions::delete(c, id))
    }

    pub fn close_topic(&self, ctx: OpContext, id: NodeId) -> Result<()> {
        self.run(ctx, "close_topic", &[id], |c| transitions::close_topic(c, id))
    }

    pub fn open_topic(&self, ctx: OpContext, id: NodeId) -> Result<()> {
        self.run(ctx, "open_topic", &[id], |c| transitions::open_topic(c, id))
    }

    pub fn stick_topic(&self, ctx: OpContext, id: NodeId, scope: StickyScope) -> Result<()> {
        self.run_sticky(ctx, "stick_topic", &[id], |c| transitions::stick_topic(c, id, scope))
    }

    pub fn unstick_topic(&self, ctx: OpContext, id: NodeId) -> Result<()> {
        self.run_sticky(ctx, "unstick_topic", &[id], |c| transitions::unstick_topic(c, id))
    }

    fn authored_ids(&self, author: UserId) -> Result<Vec<NodeId>> {
        Ok(self
            .store
            .query_by_author(author)?
            .into_iter()
            .filter(|n| n.kind() != NodeKind::Forum)
            .map(|n| n.id())
            .collect())
    }

    /// Spams every live topic and reply by `author`; returns how many changed.
    pub fn spam_author(&self, ctx: OpContext, author: UserId) -> Result<usize> {
        let touched = self.authored_ids(author)?;
        self.run(ctx, "spam_author", &touched, |c| transitions::spam_author(c, author))
    }

    pub fn unspam_author(&self, ctx: OpContext, author: UserId) -> Result<usize> {
        let touched = self.authored_ids(author)?;
        self.run(ctx, "unspam_author", &touched, |c| transitions::unspam_author(c, author))
    }

    // ------------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------------

    pub fn move_topic(&self, ctx: OpContext, topic: NodeId, forum: NodeId) -> Result<()> {
        self.run(ctx, "move_topic", &[topic, forum], |c| {
            hierarchy::move_topic(c, topic, forum)
        })
    }

    pub fn move_forum(&self, ctx: OpContext, forum: NodeId, parent: Option<NodeId>) -> Result<()> {
        let mut touched = vec![forum];
        touched.extend(parent);
        self.run(ctx, "move_forum", &touched, |c| {
            hierarchy::move_forum(c, forum, parent)
        })
    }

    /// Folds `source` into `dest`; returns the number of replies moved.
    pub fn merge_topics(
        &self,
        ctx: OpContext,
        source: NodeId,
        dest: NodeId,
        options: MergeOptions,
    ) -> Result<usize> {
        self.run_sticky(ctx, "merge_topics", &[source, dest], |c| {
            hierarchy::merge(c, source, dest, options)
        })
    }

    /// Splits `topic` at `pivot`; returns the topic that received the replies.
    pub fn split_topic(
        &self,
        ctx: OpContext,
        topic: NodeId,
        pivot: NodeId,
        options: SplitOptions,
    ) -> Result<NodeId> {
        let mut touched = vec![topic];
        if let SplitPolicy::Existing(dest) = options.policy {
            touched.push(dest);
        }
        // A split may pin the new topic globally.
        self.run_locked(ctx, "split_topic", &touched, options.inherit_sticky, |c| {
            hierarchy::split(c, topic, pivot, &options)
        })
    }

    // ------------------------------------------------------------------------
    // Recomputation
    // ------------------------------------------------------------------------

    fn recount(&self, kind: NodeKind, id: NodeId) -> Result<RecountOutcome> {
        let _guard = self.lock_subtrees(&[id], false)?;
        match (kind, self.store.load_node(id)?.kind()) {
            (NodeKind::Topic, NodeKind::Topic) | (NodeKind::Forum, NodeKind::Forum) => {}
            _ => return Err(ForumError::not_found(format!("{} {}", kind, id))),
        }
        let mut plan = RecountPlan::new();
        plan.touch(kind, id);
        let outcome = plan.execute(&*self.store);
        self.defer(&outcome.failed);
        Ok(outcome)
    }

    /// Recomputes a forum's counts and those of every ancestor.
    pub fn recompute_forum_counts(&self, id: NodeId) -> Result<RecountOutcome> {
        self.recount(NodeKind::Forum, id)
    }

    /// Recomputes a topic's counts, then its forum chain.
    pub fn recompute_topic_counts(&self, id: NodeId) -> Result<RecountOutcome> {
        self.recount(NodeKind::Topic, id)
    }

    /// Recomputes a topic's last-active pointer, then its forum chain.
    pub fn recompute_topic_last_active(&self, id: NodeId) -> Result<RecountOutcome> {
        self.recount(NodeKind::Topic, id)
    }

    /// Recomputes a forum's last-active pointer and those of its ancestors.
    pub fn recompute_forum_last_active(&self, id: NodeId) -> Result<RecountOutcome> {
        self.recount(NodeKind::Forum, id)
    }

    /// Rebuilds every aggregate in the store under a lock on every root forum.
    pub fn recount_all(&self) -> Result<RepairReport> {
        let roots: Vec<NodeId> = self
            .store
            .list_ids(NodeKind::Forum)?
            .into_iter()
            .filter(|id| matches!(self.store.load(*id), Ok(Some(ContentNode::Forum(f))) if f.parent.is_none()))
            .collect();
        let _guard = self.locks.acquire(roots, self.config.lock_timeout)?;
        let report = repair::recount_all(&*self.store)?;
        if let Ok(mut stale) = self.stale.lock() {
            *stale = RecountPlan::new();
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::state::MemoryStore;

    fn ctx() -> OpContext {
        OpContext::at(UserId(1), 1_000)
    }

    fn engine() -> ForumEngine<MemoryStore> {
        ForumEngine::new(Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_create_hierarchy_updates_counts() {
        let engine = engine();
        let root = engine.new_forum(ctx(), NewForum::new("Root")).unwrap();
        let child = engine.new_forum(ctx(), NewForum::new("Child").under(root)).unwrap();
        let topic = engine
            .new_topic(ctx(), NewTopic::new(child, "Hello", "First post"))
            .unwrap();
        engine.new_reply(ctx(), NewReply::new(topic, "One")).unwrap();

        let child = engine.forum(child).unwrap();
        assert_eq!(child.counts.topic_count, 1);
        assert_eq!(child.counts.reply_count, 1);
        let root = engine.forum(root).unwrap();
        assert_eq!(root.counts.forum_count, 1);
        assert_eq!(root.counts.subtree_reply_count, 1);
    }

    #[test]
    fn test_category_rejects_topics() {
        let engine = engine();
        let cat = engine.new_forum(ctx(), NewForum::new("Cat").category()).unwrap();
        let err = engine
            .new_topic(ctx(), NewTopic::new(cat, "T", ""))
            .unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition(_)));
    }

    #[test]
    fn test_closed_topic_rejects_replies() {
        let engine = engine();
        let forum = engine.new_forum(ctx(), NewForum::new("F")).unwrap();
        let topic = engine.new_topic(ctx(), NewTopic::new(forum, "T", "")).unwrap();
        engine.close_topic(ctx(), topic).unwrap();
        assert!(engine.new_reply(ctx(), NewReply::new(topic, "late")).is_err());
        engine.open_topic(ctx(), topic).unwrap();
        assert!(engine.new_reply(ctx(), NewReply::new(topic, "ok")).is_ok());
    }

    #[test]
    fn test_validation_errors_are_invalid_input() {
        let engine = engine();
        let err = engine.new_forum(ctx(), NewForum::new("  ")).unwrap_err();
        assert!(matches!(err, ForumError::InvalidInput(_)));
    }

    #[test]
    fn test_edit_topic_moves_and_retags() {
        let engine = engine();
        let a = engine.new_forum(ctx(), NewForum::new("A")).unwrap();
        let b = engine.new_forum(ctx(), NewForum::new("B")).unwrap();
        let topic = engine.new_topic(ctx(), NewTopic::new(a, "T", "")).unwrap();
        engine.new_reply(ctx(), NewReply::new(topic, "r")).unwrap();

        engine
            .edit_topic(
                ctx(),
                topic,
                TopicEdit {
                    tags: Some(vec!["Async Rust".into()]),
                    forum: Some(b),
                    ..TopicEdit::default()
                },
            )
            .unwrap();

        let t = engine.topic(topic).unwrap();
        assert_eq!(t.forum_id, b);
        assert!(t.tags.contains("async-rust"));
        assert_eq!(engine.forum(a).unwrap().counts.reply_count, 0);
        assert_eq!(engine.forum(b).unwrap().counts.reply_count, 1);
    }

    #[test]
    fn test_edit_topic_rejected_move_keeps_fields() {
        let engine = engine();
        let forum = engine.new_forum(ctx(), NewForum::new("F")).unwrap();
        let cat = engine.new_forum(ctx(), NewForum::new("Cat").category()).unwrap();
        let topic = engine.new_topic(ctx(), NewTopic::new(forum, "Old", "")).unwrap();

        let err = engine
            .edit_topic(
                ctx(),
                topic,
                TopicEdit {
                    title: Some("New".into()),
                    forum: Some(cat),
                    ..TopicEdit::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition(_)));

        let t = engine.topic(topic).unwrap();
        assert_eq!(t.title, "Old");
        assert_eq!(t.forum_id, forum);
    }

    #[test]
    fn test_stale_refresh_waits_for_free_subtree() {
        let engine = engine();
        let forum = engine.new_forum(ctx(), NewForum::new("F")).unwrap();
        let topic = engine.new_topic(ctx(), NewTopic::new(forum, "T", "")).unwrap();
        engine.new_reply(ctx(), NewReply::new(topic, "r")).unwrap();

        engine.defer(&[(NodeKind::Topic, topic)]);
        assert!(engine.has_stale());

        let held = engine
            .locks
            .acquire([forum], std::time::Duration::from_millis(10))
            .unwrap();
        assert_eq!(engine.refresh_stale(), RecountOutcome::default());
        assert!(engine.has_stale());

        drop(held);
        let outcome = engine.refresh_stale();
        assert_eq!(outcome.topics, 1);
        assert!(!engine.has_stale());
    }

    #[test]
    fn test_edit_reply_threading_stays_in_topic() {
        let engine = engine();
        let forum = engine.new_forum(ctx(), NewForum::new("F")).unwrap();
        let t1 = engine.new_topic(ctx(), NewTopic::new(forum, "T1", "")).unwrap();
        let t2 = engine.new_topic(ctx(), NewTopic::new(forum, "T2", "")).unwrap();
        let r1 = engine.new_reply(ctx(), NewReply::new(t1, "a")).unwrap();
        let r2 = engine.new_reply(ctx(), NewReply::new(t2, "b")).unwrap();

        let edit = ReplyEdit {
            reply_to: Some(Some(r1)),
            ..ReplyEdit::default()
        };
        assert!(engine.edit_reply(ctx(), r2, edit).is_err());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let engine = engine();
        let forum = engine.new_forum(ctx(), NewForum::new("F")).unwrap();
        let topic = engine.new_topic(ctx(), NewTopic::new(forum, "T", "")).unwrap();
        engine.new_reply(ctx(), NewReply::new(topic, "r")).unwrap();

        engine.recompute_forum_counts(forum).unwrap();
        let first = engine.forum(forum).unwrap();
        engine.recompute_forum_counts(forum).unwrap();
        engine.recompute_topic_last_active(topic).unwrap();
        assert_eq!(engine.forum(forum).unwrap(), first);

        assert!(engine.recompute_forum_counts(topic).is_err());
    }
}
