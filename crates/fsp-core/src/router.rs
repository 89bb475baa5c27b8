// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request router for security queries and updates
//!
//! Requests addressed to a volume device go to that volume's security
//! handler; every other device kind rejects them. The router takes no locks
//! and resolves no paths.

use tracing::warn;

use crate::device::DeviceExtension;
use crate::error::{FsError, FsResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MajorFunction {
    QuerySecurity,
    SetSecurity,
}

/// Security request as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoRequest {
    pub major: MajorFunction,
    /// Which parts of the descriptor (owner, group, DACL, SACL) are involved.
    pub security_information: u32,
    /// Output capacity for queries; the new descriptor for updates.
    pub buffer: Vec<u8>,
}

impl IoRequest {
    pub fn query_security(security_information: u32, capacity: usize) -> Self {
        Self {
            major: MajorFunction::QuerySecurity,
            security_information,
            buffer: vec![0; capacity],
        }
    }

    pub fn set_security(security_information: u32, descriptor: Vec<u8>) -> Self {
        Self {
            major: MajorFunction::SetSecurity,
            security_information,
            buffer: descriptor,
        }
    }
}

/// Completion of a routed request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IoCompletion {
    /// Bytes returned (queries) or consumed (updates).
    pub information: usize,
    pub buffer: Vec<u8>,
}

/// Volume-level security handling.
#[cfg_attr(test, mockall::automock)]
pub trait VolumeSecurityHandler: Send + Sync {
    fn query_security(&self, request: &IoRequest) -> FsResult<IoCompletion>;

    fn set_security(&self, request: &IoRequest) -> FsResult<IoCompletion>;
}

/// Security handler of a volume that does not service security requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnsupportedVolumeSecurity;

impl VolumeSecurityHandler for UnsupportedVolumeSecurity {
    fn query_security(&self, _request: &IoRequest) -> FsResult<IoCompletion> {
        Err(FsError::InvalidDeviceRequest)
    }

    fn set_security(&self, _request: &IoRequest) -> FsResult<IoCompletion> {
        Err(FsError::InvalidDeviceRequest)
    }
}

/// Route a security request to the handler registered for the device kind.
pub fn route(device: &DeviceExtension, request: &IoRequest) -> FsResult<IoCompletion> {
    match request.major {
        MajorFunction::QuerySecurity => query_security(device, request),
        MajorFunction::SetSecurity => set_security(device, request),
    }
}

pub fn query_security(device: &DeviceExtension, request: &IoRequest) -> FsResult<IoCompletion> {
    debug_assert_eq!(request.major, MajorFunction::QuerySecurity);

    match device {
        DeviceExtension::Volume(volume) => volume.security().query_security(request),
        other => reject(other, request),
    }
}

pub fn set_security(device: &DeviceExtension, request: &IoRequest) -> FsResult<IoCompletion> {
    debug_assert_eq!(request.major, MajorFunction::SetSecurity);

    match device {
        DeviceExtension::Volume(volume) => volume.security().set_security(request),
        other => reject(other, request),
    }
}

fn reject(device: &DeviceExtension, request: &IoRequest) -> FsResult<IoCompletion> {
    warn!(
        target: "fsp::router",
        device = %device.kind(),
        major = ?request.major,
        "request addressed to a device that cannot service it"
    );
    Err(FsError::InvalidDeviceRequest)
}
