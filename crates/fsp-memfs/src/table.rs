// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node table: ordered path index over the nodes a volume owns
//!
//! The table owns every live node. Tabled nodes are reachable through the
//! path index; detached nodes are only reachable by id, from the handles
//! still open on them, and are freed when the last of those closes. The root
//! `\` is implicit: it always resolves, is never counted and is never
//! removed.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use fsp_core::{attributes, path, FsError, FsResult};
use tracing::trace;

use crate::node::{FileNode, NodeId, NodeLifecycle, NodeState};

const ROOT_ID: NodeId = NodeId(0);

/// What a release did to the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Released {
    /// Handles remain (or the node stays tabled for later opens).
    Retained { open_count: u32 },
    /// The node was detached and this was its last handle.
    Freed,
}

pub struct NodeTable {
    index: BTreeMap<String, NodeId>,
    nodes: HashMap<NodeId, FileNode>,
    next_id: u64,
}

impl NodeTable {
    pub fn new() -> FsResult<Self> {
        let mut root = FileNode::new(path::ROOT)?;
        root.file_attributes = attributes::FILE_ATTRIBUTE_DIRECTORY;

        let mut nodes = HashMap::new();
        nodes.try_reserve(1)?;
        nodes.insert(ROOT_ID, root);

        Ok(Self {
            index: BTreeMap::new(),
            nodes,
            next_id: ROOT_ID.0 + 1,
        })
    }

    fn lookup(&self, file_name: &str) -> Option<NodeId> {
        if path::is_root(file_name) {
            Some(ROOT_ID)
        } else {
            self.index.get(file_name).copied()
        }
    }

    /// Exact, case-sensitive lookup of a tabled node.
    pub fn get(&self, file_name: &str) -> Option<(NodeId, &FileNode)> {
        let id = self.lookup(file_name)?;
        self.nodes.get(&id).map(|node| (id, node))
    }

    /// Lookup of the directory that would contain `file_name`.
    pub fn get_parent(&self, file_name: &str) -> Option<(NodeId, &FileNode)> {
        let parent = path::parent(file_name);
        if parent.is_empty() {
            return None;
        }
        self.get(parent)
    }

    /// Add `node` under its own path.
    ///
    /// Returns `Ok(None)` when the path is already taken; allocation failure
    /// while growing the table is reported as `InsufficientResources`.
    pub fn insert(&mut self, node: FileNode) -> FsResult<Option<NodeId>> {
        if self.lookup(node.path()).is_some() {
            return Ok(None);
        }

        self.nodes.try_reserve(1)?;
        let mut key = String::new();
        key.try_reserve_exact(node.path().len())?;
        key.push_str(node.path());

        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.index.insert(key, id);
        self.nodes.insert(id, node);
        trace!(target: "memfs::table", id = id.as_u64(), "node inserted");
        Ok(Some(id))
    }

    /// Take `file_name` out of the path index.
    ///
    /// The node stays alive while handles reference it; an unreferenced node
    /// is freed right away. Absent paths (and the root) are ignored.
    pub fn remove(&mut self, file_name: &str) -> Option<NodeId> {
        let id = self.index.remove(file_name)?;
        let node = self.nodes.get_mut(&id)?;
        node.detach();
        if node.open_count() == 0 {
            self.nodes.remove(&id);
        }
        trace!(target: "memfs::table", id = id.as_u64(), "node detached");
        Some(id)
    }

    /// Remove node `id` by its stored path, provided that path still maps to
    /// it. A detached node whose name has since been reused is left alone.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let indexed = self
            .nodes
            .get(&id)
            .filter(|node| node.state() == NodeState::Tabled)
            .and_then(|node| self.index.get(node.path()))
            .is_some_and(|tabled| *tabled == id);
        if !indexed {
            return false;
        }
        let path = self.nodes.get(&id).map(|node| node.path().to_owned());
        path.is_some_and(|path| self.remove(&path).is_some())
    }

    /// Number of tabled entries, excluding the root.
    pub fn count(&self) -> usize {
        self.index.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&FileNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut FileNode> {
        self.nodes.get_mut(&id)
    }

    /// Record a new handle on a live node.
    pub fn open(&mut self, id: NodeId) -> FsResult<u32> {
        let node = self.nodes.get_mut(&id).ok_or(FsError::InvalidHandle)?;
        Ok(node.retain())
    }

    /// Drop one handle; frees a detached node when its last handle goes.
    pub fn release(&mut self, id: NodeId) -> FsResult<Released> {
        let node = self.nodes.get_mut(&id).ok_or(FsError::InvalidHandle)?;
        let open_count = node.release();
        if open_count == 0 && node.state() == NodeState::Detached {
            self.nodes.remove(&id);
            trace!(target: "memfs::table", id = id.as_u64(), "node freed");
            return Ok(Released::Freed);
        }
        Ok(Released::Retained { open_count })
    }

    pub fn lifecycle(&self, id: NodeId) -> NodeLifecycle {
        self.nodes
            .get(&id)
            .map(|node| node.state().into())
            .unwrap_or(NodeLifecycle::Freed)
    }

    /// Tabled paths starting with `prefix`, in order.
    pub fn paths_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.index
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(path, _)| path.as_str())
            .take_while(move |path| path.starts_with(prefix))
    }

    /// Live nodes, tabled or detached, excluding the root.
    pub fn live_nodes(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes
            .iter()
            .filter(|(id, _)| **id != ROOT_ID)
            .map(|(_, node)| node)
    }
}
