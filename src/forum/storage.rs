//! Content storage: the `ContentStore` seam and its RocksDB implementation.
//!
//! The lifecycle engine never talks to a database directly. It consumes the
//! `ContentStore` trait, whose operations are each assumed durable and
//! individually atomic. Two implementations ship with the crate:
//! [`MemoryStore`](crate::forum::MemoryStore) for tests and embedding, and
//! [`ForumStorage`] backed by RocksDB.
//!
//! ## RocksDB Layout
//!
//! Uses column families for logical separation:
//! - `nodes`: `{id}` -> serialized ContentNode
//! - `idx_children`: `{parent_id}{child_id}` -> () (parent-id edges)
//! - `idx_author`: `{user_id}{node_id}` -> ()
//! - `idx_tags`: `{tag}\0{topic_id}` -> ()
//! - `idx_kind`: `{kind}{node_id}` -> ()
//! - `meta`: `next_id`, `global_stickies`
//!
//! All ids are encoded big-endian so prefix scans return them in id order.
//! A node and its index entries are written in a single `WriteBatch`.

use crate::error::{ForumError, Result};
use crate::forum::node::{ContentNode, Forum, Reply, Topic};
use crate::forum::types::{NodeId, NodeKind, PostStatus, UserId};
use crate::storage::{id_key, index_key, BatchWriter, RocksDbConfig, RocksDbHandle};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Default data directory name.
pub const DEFAULT_DATA_DIR: &str = "forumkit_data";

/// Database subdirectory.
const DB_DIR: &str = "forum_db";

/// Column family names.
const CF_NODES: &str = "nodes";
const CF_IDX_CHILDREN: &str = "idx_children";
const CF_IDX_AUTHOR: &str = "idx_author";
const CF_IDX_TAGS: &str = "idx_tags";
const CF_IDX_KIND: &str = "idx_kind";
const CF_META: &str = "meta";

/// Keys in the meta column family.
const META_NEXT_ID: &[u8] = b"next_id";
const META_GLOBAL_STICKIES: &[u8] = b"global_stickies";

/// Status predicate applied by `query_children`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Every stored child.
    All,
    /// Children included in default aggregates.
    Countable,
    /// Children included in hidden-inclusive totals.
    Total,
    /// Children in exactly this status.
    Only(PostStatus),
}

impl StatusFilter {
    /// Returns true if `node` passes this filter.
    pub fn matches(&self, node: &ContentNode) -> bool {
        let status = node.status();
        match self {
            StatusFilter::All => true,
            StatusFilter::Countable => status.is_countable(node.kind()),
            StatusFilter::Total => status.is_in_total(),
            StatusFilter::Only(wanted) => status == *wanted,
        }
    }
}

/// Durable storage of forums, topics and replies.
///
/// Implementations must return `query_children`, `query_by_author` and
/// `query_by_tag` results ordered by `(created_at, id)`.
pub trait ContentStore: Send + Sync {
    /// Loads a node by id.
    fn load(&self, id: NodeId) -> Result<Option<ContentNode>>;

    /// Inserts or replaces a node, updating every secondary index.
    fn save(&self, node: &ContentNode) -> Result<()>;

    /// Children across the parent-id edge (sub-forums and topics of a forum,
    /// replies of a topic).
    fn query_children(&self, parent: NodeId, filter: StatusFilter) -> Result<Vec<ContentNode>>;

    /// Removes a node from primary storage. Deleting a missing id is a no-op.
    fn delete(&self, id: NodeId) -> Result<()>;

    /// Allocates a fresh, never reused identifier.
    fn next_id(&self) -> Result<NodeId>;

    /// Every node authored by `author`.
    fn query_by_author(&self, author: UserId) -> Result<Vec<ContentNode>>;

    /// Every topic carrying the normalized `tag`.
    fn query_by_tag(&self, tag: &str) -> Result<Vec<ContentNode>>;

    /// Ids of every stored node of `kind`, ascending.
    fn list_ids(&self, kind: NodeKind) -> Result<Vec<NodeId>>;

    /// The global sticky list in pinned order.
    fn load_global_stickies(&self) -> Result<Vec<NodeId>>;

    /// Replaces the global sticky list.
    fn save_global_stickies(&self, ids: &[NodeId]) -> Result<()>;
}

/// Typed accessors layered over any `ContentStore`.
pub trait StoreExt: ContentStore {
    /// Loads any node, failing with `NotFound` if absent.
    fn load_node(&self, id: NodeId) -> Result<ContentNode> {
        self.load(id)?
            .ok_or_else(|| ForumError::not_found(format!("node {}", id)))
    }

    /// Loads a forum, failing with `NotFound` if absent or not a forum.
    fn load_forum(&self, id: NodeId) -> Result<Forum> {
        self.load(id)?
            .and_then(ContentNode::into_forum)
            .ok_or_else(|| ForumError::not_found(format!("forum {}", id)))
    }

    /// Loads a topic, failing with `NotFound` if absent or not a topic.
    fn load_topic(&self, id: NodeId) -> Result<Topic> {
        self.load(id)?
            .and_then(ContentNode::into_topic)
            .ok_or_else(|| ForumError::not_found(format!("topic {}", id)))
    }

    /// Loads a reply, failing with `NotFound` if absent or not a reply.
    fn load_reply(&self, id: NodeId) -> Result<Reply> {
        self.load(id)?
            .and_then(ContentNode::into_reply)
            .ok_or_else(|| ForumError::not_found(format!("reply {}", id)))
    }

    /// Direct child forums of `forum`.
    fn child_forums(&self, forum: NodeId, filter: StatusFilter) -> Result<Vec<Forum>> {
        Ok(self
            .query_children(forum, filter)?
            .into_iter()
            .filter_map(ContentNode::into_forum)
            .collect())
    }

    /// Topics directly owned by `forum`.
    fn forum_topics(&self, forum: NodeId, filter: StatusFilter) -> Result<Vec<Topic>> {
        Ok(self
            .query_children(forum, filter)?
            .into_iter()
            .filter_map(ContentNode::into_topic)
            .collect())
    }

    /// Replies of `topic` in `(created_at, id)` order.
    fn topic_replies(&self, topic: NodeId, filter: StatusFilter) -> Result<Vec<Reply>> {
        Ok(self
            .query_children(topic, filter)?
            .into_iter()
            .filter_map(ContentNode::into_reply)
            .collect())
    }

    fn save_forum(&self, forum: &Forum) -> Result<()> {
        self.save(&ContentNode::Forum(forum.clone()))
    }

    fn save_topic(&self, topic: &Topic) -> Result<()> {
        self.save(&ContentNode::Topic(topic.clone()))
    }

    fn save_reply(&self, reply: &Reply) -> Result<()> {
        self.save(&ContentNode::Reply(reply.clone()))
    }
}

impl<T: ContentStore + ?Sized> StoreExt for T {}

/// Rejects a node whose status is not allowed for its kind.
///
/// Every backend calls this before writing.
pub fn check_storable(node: &ContentNode) -> Result<()> {
    if node.status().is_valid_for(node.kind()) {
        return Ok(());
    }
    Err(ForumError::invalid_input(format!(
        "{} {} cannot be stored in status {}",
        node.kind(),
        node.id(),
        node.status()
    )))
}

/// Sorts nodes into the canonical `(created_at, id)` order.
pub(crate) fn sort_nodes(nodes: &mut [ContentNode]) {
    nodes.sort_by_key(|n| n.order_key());
}

/// RocksDB-backed content storage.
#[derive(Debug)]
pub struct ForumStorage {
    db: RocksDbHandle,
    /// Serializes id allocation.
    id_lock: Mutex<()>,
}

impl ForumStorage {
    /// Opens storage in the default data directory.
    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_DATA_DIR)
    }

    /// Opens storage under `data_dir` with default tuning.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(data_dir, &RocksDbConfig::default())
    }

    /// Opens storage under `data_dir` with explicit RocksDB tuning.
    pub fn with_config(data_dir: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let db_path = data_dir.as_ref().join(DB_DIR);
        let column_families = &[
            CF_NODES,
            CF_IDX_CHILDREN,
            CF_IDX_AUTHOR,
            CF_IDX_TAGS,
            CF_IDX_KIND,
            CF_META,
        ];
        let db = RocksDbHandle::open(&db_path, config, column_families)?;

        info!("Opened forum RocksDB at {:?}", db_path);

        Ok(Self {
            db,
            id_lock: Mutex::new(()),
        })
    }

    fn children_prefix(parent: NodeId) -> [u8; 8] {
        id_key(parent.0)
    }

    fn tag_prefix(tag: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(tag.len() + 1);
        prefix.extend_from_slice(tag.as_bytes());
        prefix.push(0);
        prefix
    }

    fn kind_prefix(kind: NodeKind) -> [u8; 1] {
        [kind as u8]
    }

    /// Queues deletion of every index entry derived from `node`.
    fn unindex(batch: &mut BatchWriter, node: &ContentNode) {
        let id = node.id().0;
        if let Some(parent) = node.parent() {
            batch.delete(
                CF_IDX_CHILDREN,
                &index_key(&Self::children_prefix(parent), id),
            );
        }
        batch.delete(CF_IDX_AUTHOR, &index_key(&id_key(node.author().0), id));
        batch.delete(CF_IDX_KIND, &index_key(&Self::kind_prefix(node.kind()), id));
        if let Some(tags) = node.tags() {
            for tag in tags {
                batch.delete(CF_IDX_TAGS, &index_key(&Self::tag_prefix(tag), id));
            }
        }
    }

    /// Queues every index entry derived from `node`.
    fn index(batch: &mut BatchWriter, node: &ContentNode) {
        let id = node.id().0;
        if let Some(parent) = node.parent() {
            batch.put_raw(
                CF_IDX_CHILDREN,
                &index_key(&Self::children_prefix(parent), id),
                &[],
            );
        }
        batch.put_raw(CF_IDX_AUTHOR, &index_key(&id_key(node.author().0), id), &[]);
        batch.put_raw(
            CF_IDX_KIND,
            &index_key(&Self::kind_prefix(node.kind()), id),
            &[],
        );
        if let Some(tags) = node.tags() {
            for tag in tags {
                batch.put_raw(CF_IDX_TAGS, &index_key(&Self::tag_prefix(tag), id), &[]);
            }
        }
    }

    /// Loads every id listed under an index prefix, skipping dangling entries.
    fn load_indexed(&self, cf: &str, prefix: &[u8]) -> Result<Vec<ContentNode>> {
        let mut nodes = Vec::new();
        for id in self.db.prefix_ids(cf, prefix)? {
            if let Some(node) = self.load(NodeId(id))? {
                nodes.push(node);
            }
        }
        sort_nodes(&mut nodes);
        Ok(nodes)
    }
}

impl ContentStore for ForumStorage {
    fn load(&self, id: NodeId) -> Result<Option<ContentNode>> {
        self.db.get(CF_NODES, &id_key(id.0))
    }

    fn save(&self, node: &ContentNode) -> Result<()> {
        check_storable(node)?;
        let previous = self.load(node.id())?;
        let mut batch = BatchWriter::new();
        if let Some(old) = &previous {
            Self::unindex(&mut batch, old);
        }
        Self::index(&mut batch, node);
        batch.put(CF_NODES, &id_key(node.id().0), node)?;
        self.db.commit(batch)
    }

    fn query_children(&self, parent: NodeId, filter: StatusFilter) -> Result<Vec<ContentNode>> {
        let mut nodes = self.load_indexed(CF_IDX_CHILDREN, &Self::children_prefix(parent))?;
        nodes.retain(|n| n.parent() == Some(parent) && filter.matches(n));
        Ok(nodes)
    }

    fn delete(&self, id: NodeId) -> Result<()> {
        let Some(node) = self.load(id)? else {
            return Ok(());
        };
        let mut batch = BatchWriter::new();
        Self::unindex(&mut batch, &node);
        batch.delete(CF_NODES, &id_key(id.0));
        self.db.commit(batch)?;
        debug!(node = %id, kind = %node.kind(), "storage: deleted node");
        Ok(())
    }

    fn next_id(&self) -> Result<NodeId> {
        let _guard = self
            .id_lock
            .lock()
            .map_err(|_| ForumError::storage("id allocator lock poisoned"))?;
        let current: u64 = self.db.get(CF_META, META_NEXT_ID)?.unwrap_or(1);
        self.db.put(CF_META, META_NEXT_ID, &(current + 1))?;
        Ok(NodeId(current))
    }

    fn query_by_author(&self, author: UserId) -> Result<Vec<ContentNode>> {
        let mut nodes = self.load_indexed(CF_IDX_AUTHOR, &id_key(author.0))?;
        nodes.retain(|n| n.author() == author);
        Ok(nodes)
    }

    fn query_by_tag(&self, tag: &str) -> Result<Vec<ContentNode>> {
        let mut nodes = self.load_indexed(CF_IDX_TAGS, &Self::tag_prefix(tag))?;
        nodes.retain(|n| n.tags().is_some_and(|t| t.contains(tag)));
        Ok(nodes)
    }

    fn list_ids(&self, kind: NodeKind) -> Result<Vec<NodeId>> {
        let ids = self.db.prefix_ids(CF_IDX_KIND, &Self::kind_prefix(kind))?;
        let unique: BTreeSet<u64> = ids.into_iter().collect();
        Ok(unique.into_iter().map(NodeId).collect())
    }

    fn load_global_stickies(&self) -> Result<Vec<NodeId>> {
        Ok(self
            .db
            .get::<Vec<NodeId>>(CF_META, META_GLOBAL_STICKIES)?
            .unwrap_or_default())
    }

    fn save_global_stickies(&self, ids: &[NodeId]) -> Result<()> {
        self.db.put(CF_META, META_GLOBAL_STICKIES, &ids.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::node::Topic;
    use tempfile::TempDir;

    fn create_test_storage() -> (ForumStorage, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = ForumStorage::new(temp_dir.path()).expect("Failed to open storage");
        (storage, temp_dir)
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let (storage, _temp) = create_test_storage();
        let a = storage.next_id().unwrap();
        let b = storage.next_id().unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_save_load_and_children() {
        let (storage, _temp) = create_test_storage();
        let forum = Forum::new(NodeId(1), None, "Root", UserId(1), 100);
        let topic = Topic::new(NodeId(2), NodeId(1), UserId(1), "T", "body", 200);
        storage.save_forum(&forum).unwrap();
        storage.save_topic(&topic).unwrap();

        assert_eq!(storage.load_forum(NodeId(1)).unwrap().title, "Root");
        let topics = storage.forum_topics(NodeId(1), StatusFilter::All).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].id, NodeId(2));
    }

    #[test]
    fn test_reparent_updates_children_index() {
        let (storage, _temp) = create_test_storage();
        storage
            .save_forum(&Forum::new(NodeId(1), None, "A", UserId(1), 1))
            .unwrap();
        storage
            .save_forum(&Forum::new(NodeId(2), None, "B", UserId(1), 2))
            .unwrap();
        let mut topic = Topic::new(NodeId(3), NodeId(1), UserId(1), "T", "", 3);
        storage.save_topic(&topic).unwrap();

        topic.forum_id = NodeId(2);
        storage.save_topic(&topic).unwrap();

        assert!(storage
            .query_children(NodeId(1), StatusFilter::All)
            .unwrap()
            .is_empty());
        assert_eq!(
            storage
                .query_children(NodeId(2), StatusFilter::All)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_delete_removes_indexes() {
        let (storage, _temp) = create_test_storage();
        let mut topic = Topic::new(NodeId(3), NodeId(1), UserId(7), "T", "", 3);
        topic.tags.insert("rust".to_string());
        storage.save_topic(&topic).unwrap();
        assert_eq!(storage.query_by_tag("rust").unwrap().len(), 1);

        storage.delete(NodeId(3)).unwrap();
        assert!(storage.load(NodeId(3)).unwrap().is_none());
        assert!(storage.query_by_tag("rust").unwrap().is_empty());
        assert!(storage.query_by_author(UserId(7)).unwrap().is_empty());
        assert!(storage.list_ids(NodeKind::Topic).unwrap().is_empty());
    }

    #[test]
    fn test_status_filter() {
        let (storage, _temp) = create_test_storage();
        let mut trashed = Topic::new(NodeId(2), NodeId(1), UserId(1), "T", "", 2);
        trashed.post_status = PostStatus::Trash;
        storage.save_topic(&trashed).unwrap();
        storage
            .save_topic(&Topic::new(NodeId(3), NodeId(1), UserId(1), "U", "", 3))
            .unwrap();

        let countable = storage
            .query_children(NodeId(1), StatusFilter::Countable)
            .unwrap();
        assert_eq!(countable.len(), 1);
        let total = storage
            .query_children(NodeId(1), StatusFilter::Total)
            .unwrap();
        assert_eq!(total.len(), 2);
    }

    #[test]
    fn test_global_stickies_roundtrip() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.load_global_stickies().unwrap().is_empty());
        storage
            .save_global_stickies(&[NodeId(5), NodeId(2)])
            .unwrap();
        assert_eq!(
            storage.load_global_stickies().unwrap(),
            vec![NodeId(5), NodeId(2)]
        );
    }
}
