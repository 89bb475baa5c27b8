// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the file system framework

use std::collections::TryReserveError;

/// NTSTATUS-style completion codes reported back through the transport.
pub mod status {
    pub const STATUS_SUCCESS: u32 = 0x0000_0000;
    pub const STATUS_INVALID_HANDLE: u32 = 0xC000_0008;
    pub const STATUS_INVALID_PARAMETER: u32 = 0xC000_000D;
    pub const STATUS_INVALID_DEVICE_REQUEST: u32 = 0xC000_0010;
    pub const STATUS_OBJECT_NAME_INVALID: u32 = 0xC000_0033;
    pub const STATUS_OBJECT_NAME_NOT_FOUND: u32 = 0xC000_0034;
    pub const STATUS_OBJECT_NAME_COLLISION: u32 = 0xC000_0035;
    pub const STATUS_OBJECT_PATH_NOT_FOUND: u32 = 0xC000_003A;
    pub const STATUS_DISK_FULL: u32 = 0xC000_007F;
    pub const STATUS_INSUFFICIENT_RESOURCES: u32 = 0xC000_009A;
    pub const STATUS_CANCELLED: u32 = 0xC000_0120;
    pub const STATUS_CANNOT_MAKE: u32 = 0xC000_02EA;
}

/// Core file system error type
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// No ancestor of the target path exists.
    #[error("path not found")]
    PathNotFound,
    /// The parent exists but the leaf does not.
    #[error("name not found")]
    NameNotFound,
    #[error("name already exists")]
    NameCollision,
    #[error("name not allowed")]
    NameInvalid,
    /// The volume's node quota is exhausted.
    #[error("cannot make more nodes")]
    CannotMake,
    #[error("disk full")]
    DiskFull,
    #[error("insufficient resources")]
    InsufficientResources,
    #[error("invalid device request")]
    InvalidDeviceRequest,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid handle")]
    InvalidHandle,
    /// The dispatcher abandoned the request before producing a result.
    #[error("request cancelled")]
    Cancelled,
}

impl FsError {
    /// Completion status for this error as seen by the transport.
    pub fn status(self) -> u32 {
        use status::*;

        match self {
            FsError::PathNotFound => STATUS_OBJECT_PATH_NOT_FOUND,
            FsError::NameNotFound => STATUS_OBJECT_NAME_NOT_FOUND,
            FsError::NameCollision => STATUS_OBJECT_NAME_COLLISION,
            FsError::NameInvalid => STATUS_OBJECT_NAME_INVALID,
            FsError::CannotMake => STATUS_CANNOT_MAKE,
            FsError::DiskFull => STATUS_DISK_FULL,
            FsError::InsufficientResources => STATUS_INSUFFICIENT_RESOURCES,
            FsError::InvalidDeviceRequest => STATUS_INVALID_DEVICE_REQUEST,
            FsError::InvalidParameter => STATUS_INVALID_PARAMETER,
            FsError::InvalidHandle => STATUS_INVALID_HANDLE,
            FsError::Cancelled => STATUS_CANCELLED,
        }
    }

    /// Whether a caller may reasonably retry later or with other parameters.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            FsError::CannotMake | FsError::DiskFull | FsError::InsufficientResources
        )
    }
}

impl From<TryReserveError> for FsError {
    fn from(_: TryReserveError) -> Self {
        FsError::InsufficientResources
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// Collapse an operation result into the status value put on the wire.
pub fn status_of<T>(result: &FsResult<T>) -> u32 {
    match result {
        Ok(_) => status::STATUS_SUCCESS,
        Err(err) => err.status(),
    }
}
