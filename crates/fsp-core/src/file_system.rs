// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File system instance: volume parameters plus the bound operation table

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FsError, FsResult};
use crate::gate::OperationGate;
use crate::interface::FileSystemInterface;
use crate::path;
use crate::request::{OperationRequest, OperationResponse};

/// Longest volume prefix (in UTF-16 units, exclusive) the transport carries.
pub const PREFIX_MAX: usize = 192;

/// Which device the volume is served through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePath {
    #[default]
    Disk,
    Net,
}

impl DevicePath {
    pub fn device_name(self) -> &'static str {
        match self {
            DevicePath::Disk => "WinFsp.Disk",
            DevicePath::Net => "WinFsp.Net",
        }
    }
}

/// Parameters fixed when a volume is created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeParams {
    pub sector_size: u16,
    pub sectors_per_allocation_unit: u16,
    pub case_sensitive_search: bool,
    /// UNC prefix for network volumes, e.g. `\memfs\share`.
    pub prefix: String,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            sector_size: 512,
            sectors_per_allocation_unit: 1,
            case_sensitive_search: true,
            prefix: String::new(),
        }
    }
}

impl VolumeParams {
    pub fn validate(&self) -> FsResult<()> {
        if self.sector_size == 0 || !self.sector_size.is_power_of_two() {
            return Err(FsError::InvalidParameter);
        }
        if self.sectors_per_allocation_unit == 0 {
            return Err(FsError::InvalidParameter);
        }
        if path::wide_len(&self.prefix) >= PREFIX_MAX {
            return Err(FsError::InvalidParameter);
        }
        Ok(())
    }

    pub fn allocation_unit(&self) -> u64 {
        u64::from(self.sector_size) * u64::from(self.sectors_per_allocation_unit)
    }
}

/// A served file system: one operation table behind one concurrency gate.
///
/// The operation table is bound at construction and cannot be replaced.
pub struct FileSystem<T: FileSystemInterface> {
    device_path: DevicePath,
    params: VolumeParams,
    gate: OperationGate<T>,
    operations: AtomicU64,
}

impl<T: FileSystemInterface> FileSystem<T> {
    pub fn new(device_path: DevicePath, params: VolumeParams, context: T) -> FsResult<Self> {
        params.validate()?;
        info!(
            device = device_path.device_name(),
            sector_size = params.sector_size,
            prefix = %params.prefix,
            "file system created"
        );
        Ok(Self {
            device_path,
            params,
            gate: OperationGate::new(context),
            operations: AtomicU64::new(0),
        })
    }

    pub fn device_path(&self) -> DevicePath {
        self.device_path
    }

    pub fn params(&self) -> &VolumeParams {
        &self.params
    }

    /// Run one operation against the bound table, inside the gate.
    pub fn dispatch(
        &self,
        request: OperationRequest<T::FileContext>,
    ) -> FsResult<OperationResponse<T::FileContext>> {
        let kind = request.kind();
        let result = {
            let mut context = self.gate.enter(kind);
            self.operations.fetch_add(1, Ordering::Relaxed);
            execute(&mut *context, request)
        };

        if let Err(err) = &result {
            debug!(
                target: "fsp::dispatch",
                op = %kind,
                error = %err,
                status = format_args!("{:#010x}", err.status()),
                "operation failed"
            );
        }
        result
    }

    /// Run caller code against the volume context under the gate.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut context = self.gate.lock();
        f(&mut *context)
    }

    /// Number of operations dispatched so far.
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    pub fn into_context(self) -> T {
        self.gate.into_inner()
    }
}

fn execute<T: FileSystemInterface>(
    context: &mut T,
    request: OperationRequest<T::FileContext>,
) -> FsResult<OperationResponse<T::FileContext>> {
    match request {
        OperationRequest::GetSecurity {
            file_name,
            mut security_buffer,
        } => {
            let info = context.get_security(&file_name, security_buffer.as_deref_mut())?;
            Ok(OperationResponse::GetSecurity {
                info,
                security_buffer,
            })
        }
        OperationRequest::Create {
            file_name,
            create_options,
            file_attributes,
            security_descriptor,
            allocation_size,
        } => context
            .create(
                &file_name,
                create_options,
                file_attributes,
                security_descriptor.as_deref(),
                allocation_size,
            )
            .map(OperationResponse::Opened),
        OperationRequest::Open {
            file_name,
            create_options,
        } => context.open(&file_name, create_options).map(OperationResponse::Opened),
        OperationRequest::Overwrite {
            file,
            file_attributes,
            replace_file_attributes,
        } => context
            .overwrite(file, file_attributes, replace_file_attributes)
            .map(OperationResponse::Overwritten),
        OperationRequest::Cleanup { file, delete } => {
            context.cleanup(file, delete);
            Ok(OperationResponse::Done)
        }
        OperationRequest::Close { file } => {
            context.close(file);
            Ok(OperationResponse::Done)
        }
    }
}
