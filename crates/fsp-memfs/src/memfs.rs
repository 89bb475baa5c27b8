// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory volume context and its operation handlers

use fsp_core::{
    FileSizeInfo, FileSystemInterface, FsError, FsResult, OpenedFile, SecurityInfo,
};
use serde::Serialize;
use tracing::{debug, trace};

use crate::fault::{FaultInjector, FaultOp, FaultPolicy};
use crate::node::{align_up, FileNode, NodeId, NodeLifecycle, NodeState, SECTOR_SIZE};
use crate::table::{NodeTable, Released};

/// Snapshot of what the volume currently holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemfsStats {
    pub tabled: usize,
    pub detached: usize,
    pub open_handles: u64,
    pub bytes_allocated: u64,
}

pub struct Memfs {
    table: NodeTable,
    max_file_nodes: usize,
    max_file_size: u64,
    faults: FaultInjector,
}

impl Memfs {
    /// Empty volume; `max_file_size` is rounded up to whole sectors.
    pub fn new(max_file_nodes: usize, max_file_size: u64) -> FsResult<Self> {
        Ok(Self {
            table: NodeTable::new()?,
            max_file_nodes,
            max_file_size: align_up(max_file_size, SECTOR_SIZE),
            faults: FaultInjector::default(),
        })
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.faults.set_policy(policy);
        self
    }

    pub fn faults_mut(&mut self) -> &mut FaultInjector {
        &mut self.faults
    }

    pub fn max_file_nodes(&self) -> usize {
        self.max_file_nodes
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    pub fn lifecycle(&self, file: NodeId) -> NodeLifecycle {
        self.table.lifecycle(file)
    }

    /// Outstanding handles on a live node.
    pub fn open_count(&self, file: NodeId) -> Option<u32> {
        self.table.node(file).map(FileNode::open_count)
    }

    pub fn stats(&self) -> MemfsStats {
        let mut stats = MemfsStats {
            tabled: self.table.count(),
            ..MemfsStats::default()
        };
        for node in self.table.live_nodes() {
            if node.state() == NodeState::Detached {
                stats.detached += 1;
            }
            stats.open_handles += u64::from(node.open_count());
            stats.bytes_allocated += node.footprint() as u64;
        }
        stats
    }

    /// Resolve `file_name`, telling a missing leaf apart from a missing parent.
    fn resolve(&self, file_name: &str) -> FsResult<NodeId> {
        match self.table.get(file_name) {
            Some((id, _)) => Ok(id),
            None if self.table.get_parent(file_name).is_none() => Err(FsError::PathNotFound),
            None => Err(FsError::NameNotFound),
        }
    }

    fn opened(&self, id: NodeId) -> FsResult<OpenedFile<NodeId>> {
        let node = self.table.node(id).ok_or(FsError::InvalidHandle)?;
        Ok(OpenedFile {
            file_context: id,
            info: node.info(),
        })
    }

    /// Build a fully allocated node; nothing survives a failure part way.
    fn build_node(
        &mut self,
        file_name: &str,
        file_attributes: u32,
        security_descriptor: Option<&[u8]>,
        allocation_size: u64,
    ) -> FsResult<FileNode> {
        self.faults.check(FaultOp::NodeAllocate)?;
        let mut node = FileNode::new(file_name)?;
        node.file_attributes = file_attributes;

        if let Some(descriptor) = security_descriptor {
            self.faults.check(FaultOp::SecurityAllocate)?;
            node.set_security(descriptor)?;
        }

        self.faults.check(FaultOp::DataAllocate)?;
        node.allocate(allocation_size)?;
        Ok(node)
    }
}

impl FileSystemInterface for Memfs {
    type FileContext = NodeId;

    fn get_security(
        &mut self,
        file_name: &str,
        security_buffer: Option<&mut [u8]>,
    ) -> FsResult<SecurityInfo> {
        let id = self.resolve(file_name)?;
        let node = self.table.node(id).ok_or(FsError::InvalidHandle)?;
        let security = node.security();

        // A buffer that is too small is left untouched; the caller learns
        // the required size and retries.
        if let Some(buffer) = security_buffer {
            if !security.is_empty() && security.len() <= buffer.len() {
                buffer[..security.len()].copy_from_slice(security);
            }
        }

        Ok(SecurityInfo {
            file_attributes: node.file_attributes,
            security_descriptor_size: security.len(),
        })
    }

    fn create(
        &mut self,
        file_name: &str,
        _create_options: u32,
        file_attributes: u32,
        security_descriptor: Option<&[u8]>,
        allocation_size: u64,
    ) -> FsResult<OpenedFile<NodeId>> {
        if self.table.get(file_name).is_some() {
            return Err(FsError::NameCollision);
        }
        if self.table.get_parent(file_name).is_none() {
            return Err(FsError::PathNotFound);
        }
        if self.table.count() >= self.max_file_nodes {
            return Err(FsError::CannotMake);
        }
        if allocation_size > self.max_file_size {
            return Err(FsError::DiskFull);
        }

        let node = self.build_node(file_name, file_attributes, security_descriptor, allocation_size)?;

        self.faults.check(FaultOp::TableInsert)?;
        let id = self.table.insert(node)?.ok_or(FsError::NameCollision)?;
        self.table.open(id)?;

        debug!(target: "memfs", path = file_name, id = id.as_u64(), "created");
        self.opened(id)
    }

    fn open(&mut self, file_name: &str, _create_options: u32) -> FsResult<OpenedFile<NodeId>> {
        let id = self.resolve(file_name)?;
        let open_count = self.table.open(id)?;
        trace!(target: "memfs", path = file_name, open_count, "opened");
        self.opened(id)
    }

    fn overwrite(
        &mut self,
        file: NodeId,
        file_attributes: u32,
        replace_file_attributes: bool,
    ) -> FsResult<FileSizeInfo> {
        let node = self.table.node_mut(file).ok_or(FsError::InvalidHandle)?;
        if replace_file_attributes {
            node.file_attributes = file_attributes;
        } else {
            node.file_attributes |= file_attributes;
        }
        node.truncate();
        Ok(node.size_info())
    }

    fn cleanup(&mut self, file: NodeId, delete: bool) {
        if delete && self.table.detach(file) {
            debug!(target: "memfs", id = file.as_u64(), "deleted");
        }
    }

    fn close(&mut self, file: NodeId) {
        match self.table.release(file) {
            Ok(Released::Freed) => debug!(target: "memfs", id = file.as_u64(), "freed"),
            Ok(Released::Retained { .. }) => {}
            Err(err) => debug!(target: "memfs", id = file.as_u64(), %err, "close on stale handle"),
        }
    }
}
