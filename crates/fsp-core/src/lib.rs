// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! FSP Core: framework for user-mode file systems
//!
//! A volume implements [`FileSystemInterface`] and is bound to a
//! [`FileSystem`], which runs every operation inside the volume's
//! concurrency gate. Requests can be dispatched inline or through a
//! [`PoolDispatcher`]. Device-level security requests go through the
//! [`router`].

pub mod device;
pub mod dispatcher;
pub mod error;
pub mod file_system;
pub mod gate;
pub mod interface;
pub mod path;
pub mod request;
pub mod router;

pub use device::{ControlDevice, DeviceExtension, DeviceKind, VirtualDiskDevice, VolumeDevice};
pub use dispatcher::{PendingOperation, PoolDispatcher};
pub use error::{status, status_of, FsError, FsResult};
pub use file_system::{DevicePath, FileSystem, VolumeParams, PREFIX_MAX};
pub use gate::{GateGuard, OperationGate};
pub use interface::{
    attributes, create_options, FileInfo, FileSizeInfo, FileSystemInterface, OpenedFile,
    SecurityInfo,
};
pub use request::{OperationKind, OperationRequest, OperationResponse};
pub use router::{
    route, IoCompletion, IoRequest, MajorFunction, UnsupportedVolumeSecurity,
    VolumeSecurityHandler,
};
