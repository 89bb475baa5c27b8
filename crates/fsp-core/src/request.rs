// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Owned request/response forms of the operation table
//!
//! These carry everything an operation needs so that a request can be handed
//! from a transport thread to a worker thread.

use std::fmt;

use crate::interface::{FileInfo, FileSizeInfo, OpenedFile, SecurityInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GetSecurity,
    Create,
    Open,
    Overwrite,
    Cleanup,
    Close,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::GetSecurity => "get_security",
            OperationKind::Create => "create",
            OperationKind::Open => "open",
            OperationKind::Overwrite => "overwrite",
            OperationKind::Cleanup => "cleanup",
            OperationKind::Close => "close",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationRequest<C> {
    GetSecurity {
        file_name: String,
        /// Destination buffer; its length is the declared capacity.
        security_buffer: Option<Vec<u8>>,
    },
    Create {
        file_name: String,
        create_options: u32,
        file_attributes: u32,
        security_descriptor: Option<Vec<u8>>,
        allocation_size: u64,
    },
    Open {
        file_name: String,
        create_options: u32,
    },
    Overwrite {
        file: C,
        file_attributes: u32,
        replace_file_attributes: bool,
    },
    Cleanup {
        file: C,
        delete: bool,
    },
    Close {
        file: C,
    },
}

impl<C> OperationRequest<C> {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::GetSecurity { .. } => OperationKind::GetSecurity,
            OperationRequest::Create { .. } => OperationKind::Create,
            OperationRequest::Open { .. } => OperationKind::Open,
            OperationRequest::Overwrite { .. } => OperationKind::Overwrite,
            OperationRequest::Cleanup { .. } => OperationKind::Cleanup,
            OperationRequest::Close { .. } => OperationKind::Close,
        }
    }

    /// Path the request names, for path-based operations.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            OperationRequest::GetSecurity { file_name, .. }
            | OperationRequest::Create { file_name, .. }
            | OperationRequest::Open { file_name, .. } => Some(file_name),
            _ => None,
        }
    }

    pub fn create(file_name: impl Into<String>, file_attributes: u32, allocation_size: u64) -> Self {
        OperationRequest::Create {
            file_name: file_name.into(),
            create_options: 0,
            file_attributes,
            security_descriptor: None,
            allocation_size,
        }
    }

    pub fn open(file_name: impl Into<String>) -> Self {
        OperationRequest::Open {
            file_name: file_name.into(),
            create_options: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationResponse<C> {
    GetSecurity {
        info: SecurityInfo,
        /// The caller's buffer, filled only when the descriptor fit.
        security_buffer: Option<Vec<u8>>,
    },
    Opened(OpenedFile<C>),
    Overwritten(FileSizeInfo),
    Done,
}

impl<C: Copy> OperationResponse<C> {
    /// File context of a create/open response.
    pub fn file_context(&self) -> Option<C> {
        match self {
            OperationResponse::Opened(opened) => Some(opened.file_context),
            _ => None,
        }
    }

    pub fn file_info(&self) -> Option<FileInfo> {
        match self {
            OperationResponse::Opened(opened) => Some(opened.info),
            _ => None,
        }
    }
}
