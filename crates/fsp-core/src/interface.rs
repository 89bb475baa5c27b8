// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Operation table implemented by every volume

use serde::{Deserialize, Serialize};

use crate::error::FsResult;

/// File attribute bits as carried in `file_attributes` fields.
pub mod attributes {
    pub const FILE_ATTRIBUTE_READONLY: u32 = 0x0000_0001;
    pub const FILE_ATTRIBUTE_HIDDEN: u32 = 0x0000_0002;
    pub const FILE_ATTRIBUTE_SYSTEM: u32 = 0x0000_0004;
    pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;
    pub const FILE_ATTRIBUTE_ARCHIVE: u32 = 0x0000_0020;
    pub const FILE_ATTRIBUTE_NORMAL: u32 = 0x0000_0080;
    pub const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x0000_0100;
}

/// Create-option bits. Volumes may ignore the ones they have no use for.
pub mod create_options {
    pub const FILE_DIRECTORY_FILE: u32 = 0x0000_0001;
    pub const FILE_WRITE_THROUGH: u32 = 0x0000_0002;
    pub const FILE_NON_DIRECTORY_FILE: u32 = 0x0000_0040;
    pub const FILE_DELETE_ON_CLOSE: u32 = 0x0000_1000;
}

/// Metadata reported when a file is created or opened
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_attributes: u32,
    pub allocation_size: u64,
    pub file_size: u64,
}

/// Result of a successful create or open: the per-open context plus metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenedFile<C> {
    pub file_context: C,
    pub info: FileInfo,
}

/// Sizes reported by overwrite
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSizeInfo {
    pub allocation_size: u64,
    pub file_size: u64,
}

/// Outcome of a security query.
///
/// `security_descriptor_size` is always the size of the stored descriptor,
/// whether or not it was copied into the caller's buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityInfo {
    pub file_attributes: u32,
    pub security_descriptor_size: usize,
}

/// The fixed set of operations a volume services.
///
/// Methods take `&mut self`: the dispatcher only calls them while holding
/// the volume's gate, so an implementation sees a single writer at a time.
/// Security descriptors are opaque self-relative byte buffers.
pub trait FileSystemInterface: Send {
    /// Per-open handle returned by `create`/`open` and passed back to the
    /// handle-based operations.
    type FileContext: Copy + Send + std::fmt::Debug + 'static;

    /// Report attributes and the security descriptor of `file_name`.
    ///
    /// With no buffer only the required size is reported. With a buffer the
    /// descriptor is copied when it is non-empty and fits; otherwise the
    /// buffer is left untouched. Both cases succeed and report the size.
    fn get_security(
        &mut self,
        file_name: &str,
        security_buffer: Option<&mut [u8]>,
    ) -> FsResult<SecurityInfo>;

    fn create(
        &mut self,
        file_name: &str,
        create_options: u32,
        file_attributes: u32,
        security_descriptor: Option<&[u8]>,
        allocation_size: u64,
    ) -> FsResult<OpenedFile<Self::FileContext>>;

    fn open(
        &mut self,
        file_name: &str,
        create_options: u32,
    ) -> FsResult<OpenedFile<Self::FileContext>>;

    /// Truncate an open file, replacing or merging its attributes.
    fn overwrite(
        &mut self,
        file: Self::FileContext,
        file_attributes: u32,
        replace_file_attributes: bool,
    ) -> FsResult<FileSizeInfo>;

    /// Last handle of an open instance is going away; `delete` requests
    /// removal of the name.
    fn cleanup(&mut self, file: Self::FileContext, delete: bool);

    /// Release the per-open context.
    fn close(&mut self, file: Self::FileContext);
}
