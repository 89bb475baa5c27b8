// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Volume lifecycle: construction, dispatch and teardown

use std::sync::Arc;

use fsp_core::{
    route, DeviceExtension, FileSystem, FsResult, IoCompletion, IoRequest, OperationRequest,
    OperationResponse, PendingOperation, PoolDispatcher, VolumeDevice,
};
use tracing::info;

use crate::config::MemfsConfig;
use crate::memfs::{Memfs, MemfsStats};
use crate::node::NodeId;

/// A served in-memory volume.
///
/// Every operation, inline or pooled, runs inside the volume's gate. Dropping
/// the volume stops the pool first and then releases every node.
pub struct MemfsVolume {
    pool: Option<PoolDispatcher<Memfs>>,
    file_system: Arc<FileSystem<Memfs>>,
    device: DeviceExtension,
}

impl MemfsVolume {
    pub fn create(config: &MemfsConfig) -> FsResult<Self> {
        let mut memfs = Memfs::new(config.max_file_nodes, config.max_file_size)?;
        if let Some(policy) = &config.fault_policy {
            memfs = memfs.with_fault_policy(policy.clone());
        }

        let file_system = Arc::new(FileSystem::new(
            config.device_path(),
            config.volume_params(),
            memfs,
        )?);

        let pool = config
            .flags
            .thread_pool
            .then(|| PoolDispatcher::new(Arc::clone(&file_system), config.pool_threads));

        info!(
            device = config.device_path().device_name(),
            max_file_nodes = config.max_file_nodes,
            max_file_size = config.max_file_size,
            pooled = pool.is_some(),
            "memfs volume created"
        );
        let device = DeviceExtension::Volume(VolumeDevice::new(config.prefix.clone()));
        Ok(Self {
            pool,
            file_system,
            device,
        })
    }

    pub fn file_system(&self) -> &FileSystem<Memfs> {
        &self.file_system
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Run one operation on the calling thread.
    pub fn dispatch(&self, request: OperationRequest<NodeId>) -> FsResult<OperationResponse<NodeId>> {
        self.file_system.dispatch(request)
    }

    /// Hand one operation to the worker pool, or run it inline without one.
    pub fn submit(&self, request: OperationRequest<NodeId>) -> FsResult<PendingOperation<NodeId>> {
        match &self.pool {
            Some(pool) => pool.submit(request),
            None => Ok(PendingOperation::ready(self.file_system.dispatch(request))),
        }
    }

    /// Device the volume is mounted as.
    pub fn device(&self) -> &DeviceExtension {
        &self.device
    }

    /// Route a device-level security request to this volume.
    pub fn route(&self, request: &IoRequest) -> FsResult<IoCompletion> {
        route(&self.device, request)
    }

    /// Run `f` against the volume context while holding the gate.
    pub fn with_memfs<R>(&self, f: impl FnOnce(&mut Memfs) -> R) -> R {
        self.file_system.with_context(f)
    }

    pub fn stats(&self) -> MemfsStats {
        self.with_memfs(|memfs| memfs.stats())
    }

    /// Stop serving and release every node.
    pub fn delete(self) {
        drop(self);
    }
}

impl Drop for MemfsVolume {
    fn drop(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
        let stats = self.stats();
        info!(
            tabled = stats.tabled,
            detached = stats.detached,
            "memfs volume deleted"
        );
    }
}
