// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory reference volume for the FSP framework
//!
//! Files live in a [`NodeTable`] keyed by path. A handle is a [`NodeId`];
//! deleting a file detaches its node from the table while open handles keep
//! it alive, and the last close frees it.

pub mod config;
pub mod fault;
pub mod memfs;
pub mod node;
pub mod table;
pub mod volume;

pub use config::{MemfsConfig, MemfsFlags, DEFAULT_PREFIX};
pub use fault::{FaultInjector, FaultOp, FaultPolicy, FaultRule};
pub use memfs::{Memfs, MemfsStats};
pub use node::{align_up, FileNode, NodeId, NodeLifecycle, NodeState, SECTOR_SIZE};
pub use table::{NodeTable, Released};
pub use volume::MemfsVolume;
