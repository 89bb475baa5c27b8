// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Volume configuration

use fsp_core::{DevicePath, VolumeParams};
use serde::{Deserialize, Serialize};

use crate::fault::FaultPolicy;
use crate::node::SECTOR_SIZE;

/// Prefix the in-memory volume announces to the transport.
pub const DEFAULT_PREFIX: &str = "\\memfs\\share";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemfsFlags {
    /// Serve on the network device path instead of the disk one.
    #[serde(default)]
    pub net: bool,
    /// Bind a worker pool whose threads enter the gate around each operation.
    #[serde(default)]
    pub thread_pool: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemfsConfig {
    pub flags: MemfsFlags,
    pub max_file_nodes: usize,
    pub max_file_size: u64,
    pub prefix: String,
    pub pool_threads: usize,
    pub fault_policy: Option<FaultPolicy>,
}

impl Default for MemfsConfig {
    fn default() -> Self {
        Self {
            flags: MemfsFlags::default(),
            max_file_nodes: 1024,
            max_file_size: 16 * 1024 * 1024,
            prefix: DEFAULT_PREFIX.to_string(),
            pool_threads: 4,
            fault_policy: None,
        }
    }
}

impl MemfsConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn device_path(&self) -> DevicePath {
        if self.flags.net {
            DevicePath::Net
        } else {
            DevicePath::Disk
        }
    }

    pub fn volume_params(&self) -> VolumeParams {
        VolumeParams {
            sector_size: SECTOR_SIZE as u16,
            sectors_per_allocation_unit: 1,
            case_sensitive_search: true,
            prefix: self.prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultOp;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = MemfsConfig::from_json_str(r#"{ "max_file_nodes": 100, "flags": { "net": true } }"#)
            .expect("config");
        assert_eq!(config.max_file_nodes, 100);
        assert_eq!(config.max_file_size, MemfsConfig::default().max_file_size);
        assert_eq!(config.prefix, DEFAULT_PREFIX);
        assert!(config.flags.net);
        assert!(!config.flags.thread_pool);
        assert_eq!(config.device_path(), DevicePath::Net);
    }

    #[test]
    fn fault_policy_is_read_from_config() {
        let config = MemfsConfig::from_json_str(
            r#"{ "fault_policy": { "enabled": true, "rules": [ { "op": "table_insert" } ] } }"#,
        )
        .expect("config");
        let policy = config.fault_policy.expect("policy");
        assert_eq!(policy.rules[0].op, FaultOp::TableInsert);
        assert_eq!(policy.rules[0].max_faults, None);
    }

    #[test]
    fn volume_params_use_sector_size() {
        let params = MemfsConfig::default().volume_params();
        assert_eq!(params.sector_size, 512);
        assert_eq!(params.prefix, "\\memfs\\share");
        assert!(params.validate().is_ok());
    }
}
