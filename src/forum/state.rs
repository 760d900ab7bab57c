//! In-memory content store.
//!
//! `MemoryStore` keeps every node in a `HashMap` with a secondary
//! parent → children index so child queries do not scan the whole map.
//! It is the default backend for tests and for embedding the engine in a
//! process that persists elsewhere.
//!
//! The store can be switched to read-only to simulate a failing backend.

use crate::error::{ForumError, Result};
use crate::forum::node::ContentNode;
use crate::forum::storage::{check_storable, sort_nodes, ContentStore, StatusFilter};
use crate::forum::types::{NodeId, NodeKind, UserId};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct MemoryState {
    nodes: HashMap<NodeId, ContentNode>,
    /// Maps parent id → child ids across the parent-id edge.
    children: HashMap<NodeId, BTreeSet<NodeId>>,
    next_id: u64,
    global_stickies: Vec<NodeId>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            children: HashMap::new(),
            next_id: 1,
            global_stickies: Vec::new(),
        }
    }
}

impl MemoryState {
    fn detach(&mut self, node: &ContentNode) {
        if let Some(parent) = node.parent() {
            if let Some(set) = self.children.get_mut(&parent) {
                set.remove(&node.id());
                if set.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
    }

    fn collect<F>(&self, mut keep: F) -> Vec<ContentNode>
    where
        F: FnMut(&ContentNode) -> bool,
    {
        let mut out: Vec<ContentNode> = self.nodes.values().filter(|n| keep(n)).cloned().collect();
        sort_nodes(&mut out);
        out
    }
}

/// Thread-safe in-memory `ContentStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    read_only: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.read().map(|s| s.nodes.len()).unwrap_or(0)
    }

    /// When set, every write fails with `ForumError::Storage`.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| ForumError::storage("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(ForumError::storage("memory store is read-only"));
        }
        self.state
            .write()
            .map_err(|_| ForumError::storage("memory store lock poisoned"))
    }
}

impl ContentStore for MemoryStore {
    fn load(&self, id: NodeId) -> Result<Option<ContentNode>> {
        Ok(self.read()?.nodes.get(&id).cloned())
    }

    fn save(&self, node: &ContentNode) -> Result<()> {
        check_storable(node)?;
        let mut state = self.write()?;
        if let Some(previous) = state.nodes.get(&node.id()).cloned() {
            state.detach(&previous);
        }
        if let Some(parent) = node.parent() {
            state.children.entry(parent).or_default().insert(node.id());
        }
        state.next_id = state.next_id.max(node.id().0 + 1);
        state.nodes.insert(node.id(), node.clone());
        Ok(())
    }

    fn query_children(&self, parent: NodeId, filter: StatusFilter) -> Result<Vec<ContentNode>> {
        let state = self.read()?;
        let mut out: Vec<ContentNode> = state
            .children
            .get(&parent)
            .into_iter()
            .flatten()
            .filter_map(|id| state.nodes.get(id))
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        sort_nodes(&mut out);
        Ok(out)
    }

    fn delete(&self, id: NodeId) -> Result<()> {
        let mut state = self.write()?;
        if let Some(node) = state.nodes.remove(&id) {
            state.detach(&node);
        }
        Ok(())
    }

    fn next_id(&self) -> Result<NodeId> {
        let mut state = self.write()?;
        let id = state.next_id;
        state.next_id += 1;
        Ok(NodeId(id))
    }

    fn query_by_author(&self, author: UserId) -> Result<Vec<ContentNode>> {
        Ok(self.read()?.collect(|n| n.author() == author))
    }

    fn query_by_tag(&self, tag: &str) -> Result<Vec<ContentNode>> {
        Ok(self
            .read()?
            .collect(|n| n.tags().is_some_and(|tags| tags.contains(tag))))
    }

    fn list_ids(&self, kind: NodeKind) -> Result<Vec<NodeId>> {
        let state = self.read()?;
        let ids: BTreeSet<NodeId> = state
            .nodes
            .values()
            .filter(|n| n.kind() == kind)
            .map(|n| n.id())
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn load_global_stickies(&self) -> Result<Vec<NodeId>> {
        Ok(self.read()?.global_stickies.clone())
    }

    fn save_global_stickies(&self, ids: &[NodeId]) -> Result<()> {
        self.write()?.global_stickies = ids.to_vec();
        Ok(())
    }
}
