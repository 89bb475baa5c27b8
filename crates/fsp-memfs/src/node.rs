// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File node: one file's name, metadata, security descriptor and data

use fsp_core::{path, FileInfo, FileSizeInfo, FsError, FsResult};
use serde::Serialize;

/// Allocation granularity of the in-memory volume.
pub const SECTOR_SIZE: u64 = 512;

/// Round `size` up to the next multiple of `alignment` (a power of two).
pub fn align_up(size: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    size.checked_add(alignment - 1)
        .map(|s| s & !(alignment - 1))
        .unwrap_or(u64::MAX & !(alignment - 1))
}

/// Identity of a node for as long as it is live
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Where a live node stands relative to the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Reachable by path; owned by the table.
    Tabled,
    /// Removed from the path index but still referenced by open handles.
    Detached,
}

/// Observable lifecycle of a node, including after it has been freed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLifecycle {
    Tabled,
    Detached,
    Freed,
}

impl From<NodeState> for NodeLifecycle {
    fn from(state: NodeState) -> Self {
        match state {
            NodeState::Tabled => NodeLifecycle::Tabled,
            NodeState::Detached => NodeLifecycle::Detached,
        }
    }
}

#[derive(Debug)]
pub struct FileNode {
    path: String,
    pub file_attributes: u32,
    security: Vec<u8>,
    allocation_size: u64,
    file_size: u64,
    data: Vec<u8>,
    open_count: u32,
    state: NodeState,
}

impl FileNode {
    /// Empty node named `path`; fails with `NameInvalid` if the name is too long.
    pub fn new(path: &str) -> FsResult<Self> {
        path::check_length(path)?;

        let mut name = String::new();
        name.try_reserve_exact(path.len())?;
        name.push_str(path);

        Ok(Self {
            path: name,
            file_attributes: 0,
            security: Vec::new(),
            allocation_size: 0,
            file_size: 0,
            data: Vec::new(),
            open_count: 0,
            state: NodeState::Tabled,
        })
    }

    /// Store an owned copy of a self-relative security descriptor.
    pub fn set_security(&mut self, descriptor: &[u8]) -> FsResult<()> {
        let mut security = Vec::new();
        security.try_reserve_exact(descriptor.len())?;
        security.extend_from_slice(descriptor);
        self.security = security;
        Ok(())
    }

    /// Allocate the zero-filled data buffer, rounded up to whole sectors.
    pub fn allocate(&mut self, requested: u64) -> FsResult<()> {
        let allocation_size = align_up(requested, SECTOR_SIZE);
        let len = usize::try_from(allocation_size).map_err(|_| FsError::InsufficientResources)?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);

        self.data = data;
        self.allocation_size = allocation_size;
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn security(&self) -> &[u8] {
        &self.security
    }

    pub fn allocation_size(&self) -> u64 {
        self.allocation_size
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Discard the logical content; the allocation is kept.
    pub fn truncate(&mut self) {
        self.file_size = 0;
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            file_attributes: self.file_attributes,
            allocation_size: self.allocation_size,
            file_size: self.file_size,
        }
    }

    pub fn size_info(&self) -> FileSizeInfo {
        FileSizeInfo {
            allocation_size: self.allocation_size,
            file_size: self.file_size,
        }
    }

    /// Bytes held by this node's buffers.
    pub fn footprint(&self) -> usize {
        self.path.capacity() + self.security.capacity() + self.data.capacity()
    }

    pub(crate) fn retain(&mut self) -> u32 {
        self.open_count += 1;
        self.open_count
    }

    pub(crate) fn release(&mut self) -> u32 {
        self.open_count = self.open_count.saturating_sub(1);
        self.open_count
    }

    pub(crate) fn detach(&mut self) {
        self.state = NodeState::Detached;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_sector_multiples() {
        assert_eq!(align_up(0, SECTOR_SIZE), 0);
        assert_eq!(align_up(1, SECTOR_SIZE), 512);
        assert_eq!(align_up(512, SECTOR_SIZE), 512);
        assert_eq!(align_up(513, SECTOR_SIZE), 1024);
        assert_eq!(align_up(1000, SECTOR_SIZE), 1024);
        assert_eq!(align_up(65536, SECTOR_SIZE), 65536);
    }

    #[test]
    fn align_up_saturates_instead_of_overflowing() {
        assert_eq!(align_up(u64::MAX, SECTOR_SIZE), u64::MAX - 511);
    }

    #[test]
    fn allocate_sizes_data_buffer_to_allocation() {
        let mut node = FileNode::new("\\a.txt").unwrap();
        node.allocate(1000).unwrap();
        assert_eq!(node.allocation_size(), 1024);
        assert_eq!(node.data().len(), 1024);
        assert_eq!(node.file_size(), 0);
        assert!(node.file_size() <= node.allocation_size());
    }

    #[test]
    fn new_rejects_overlong_names() {
        let long = format!("\\{}", "x".repeat(path::MAX_PATH));
        assert_eq!(FileNode::new(&long).unwrap_err(), FsError::NameInvalid);
    }

    #[test]
    fn security_is_copied() {
        let mut node = FileNode::new("\\s").unwrap();
        let descriptor = vec![1u8, 0, 4, 0x80, 20, 0, 0, 0];
        node.set_security(&descriptor).unwrap();
        assert_eq!(node.security(), descriptor.as_slice());
    }

    #[test]
    fn open_count_never_underflows() {
        let mut node = FileNode::new("\\c").unwrap();
        assert_eq!(node.retain(), 1);
        assert_eq!(node.release(), 0);
        assert_eq!(node.release(), 0);
    }
}
