// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Device kinds a request can be addressed to
//!
//! Each kind carries only the state that kind needs; the router decides what
//! a kind can service by matching on the variant.

use std::fmt;

use crate::file_system::DevicePath;
use crate::router::{UnsupportedVolumeSecurity, VolumeSecurityHandler};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Control,
    VirtualDisk,
    Volume,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceKind::Control => "control",
            DeviceKind::VirtualDisk => "virtual_disk",
            DeviceKind::Volume => "volume",
        })
    }
}

/// Control channel used to create volumes and exchange transactions
#[derive(Clone, Debug)]
pub struct ControlDevice {
    pub name: String,
}

/// Per-device-path device under which volumes are mounted
#[derive(Clone, Debug)]
pub struct VirtualDiskDevice {
    pub device_path: DevicePath,
    pub volume_count: usize,
}

/// A mounted volume
pub struct VolumeDevice {
    pub volume_name: String,
    security: Box<dyn VolumeSecurityHandler>,
}

impl VolumeDevice {
    /// Volume whose security requests are not serviced.
    pub fn new(volume_name: impl Into<String>) -> Self {
        Self::with_security(volume_name, Box::new(UnsupportedVolumeSecurity))
    }

    pub fn with_security(
        volume_name: impl Into<String>,
        security: Box<dyn VolumeSecurityHandler>,
    ) -> Self {
        Self {
            volume_name: volume_name.into(),
            security,
        }
    }

    pub fn security(&self) -> &dyn VolumeSecurityHandler {
        self.security.as_ref()
    }
}

impl fmt::Debug for VolumeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeDevice")
            .field("volume_name", &self.volume_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum DeviceExtension {
    Control(ControlDevice),
    VirtualDisk(VirtualDiskDevice),
    Volume(VolumeDevice),
}

impl DeviceExtension {
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceExtension::Control(_) => DeviceKind::Control,
            DeviceExtension::VirtualDisk(_) => DeviceKind::VirtualDisk,
            DeviceExtension::Volume(_) => DeviceKind::Volume,
        }
    }
}
