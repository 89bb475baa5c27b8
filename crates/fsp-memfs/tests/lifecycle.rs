// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node lifecycle through the volume's dispatcher

use fsp_core::attributes::FILE_ATTRIBUTE_ARCHIVE;
use fsp_core::{DeviceKind, FsError, IoRequest, OperationRequest, OperationResponse};
use fsp_memfs::{MemfsConfig, MemfsVolume, NodeId, NodeLifecycle};

fn volume() -> MemfsVolume {
    let config = MemfsConfig {
        max_file_nodes: 100,
        max_file_size: 65536,
        ..MemfsConfig::default()
    };
    MemfsVolume::create(&config).expect("volume")
}

fn create(volume: &MemfsVolume, name: &str) -> Result<NodeId, FsError> {
    let response = volume.dispatch(OperationRequest::create(name, FILE_ATTRIBUTE_ARCHIVE, 1000))?;
    Ok(response.file_context().expect("handle"))
}

fn open_count(volume: &MemfsVolume, file: NodeId) -> Option<u32> {
    volume.with_memfs(|memfs| memfs.open_count(file))
}

fn lifecycle(volume: &MemfsVolume, file: NodeId) -> NodeLifecycle {
    volume.with_memfs(|memfs| memfs.lifecycle(file))
}

#[test]
fn create_open_delete_close_scenario() {
    let volume = volume();

    let created = volume
        .dispatch(OperationRequest::create("\\a.txt", FILE_ATTRIBUTE_ARCHIVE, 1000))
        .unwrap();
    let info = created.file_info().unwrap();
    assert_eq!(info.allocation_size, 1024);
    assert_eq!(info.file_size, 0);
    let first = created.file_context().unwrap();
    assert_eq!(open_count(&volume, first), Some(1));

    let opened = volume.dispatch(OperationRequest::open("\\a.txt")).unwrap();
    let second = opened.file_context().unwrap();
    assert_eq!(second, first);
    assert_eq!(opened.file_info(), Some(info));
    assert_eq!(open_count(&volume, first), Some(2));

    volume
        .dispatch(OperationRequest::Close { file: second })
        .unwrap();
    assert_eq!(open_count(&volume, first), Some(1));
    assert_eq!(lifecycle(&volume, first), NodeLifecycle::Tabled);
    assert_eq!(create(&volume, "\\a.txt"), Err(FsError::NameCollision));

    volume
        .dispatch(OperationRequest::Cleanup {
            file: first,
            delete: true,
        })
        .unwrap();
    assert_eq!(lifecycle(&volume, first), NodeLifecycle::Detached);
    assert_eq!(open_count(&volume, first), Some(1));

    let fresh = create(&volume, "\\a.txt").unwrap();
    assert_ne!(fresh, first);

    volume
        .dispatch(OperationRequest::Close { file: first })
        .unwrap();
    assert_eq!(lifecycle(&volume, first), NodeLifecycle::Freed);
    assert_eq!(lifecycle(&volume, fresh), NodeLifecycle::Tabled);
    assert_eq!(volume.stats().tabled, 1);
    assert_eq!(volume.stats().detached, 0);
}

#[test]
fn stale_handle_cleanup_leaves_reused_name_alone() {
    let volume = volume();
    let old = create(&volume, "\\r").unwrap();
    volume.dispatch(OperationRequest::open("\\r")).unwrap();
    volume
        .dispatch(OperationRequest::Cleanup {
            file: old,
            delete: true,
        })
        .unwrap();
    let fresh = create(&volume, "\\r").unwrap();

    // A second delete through the old handle must not take the new file.
    volume
        .dispatch(OperationRequest::Cleanup {
            file: old,
            delete: true,
        })
        .unwrap();
    assert_eq!(lifecycle(&volume, fresh), NodeLifecycle::Tabled);
    assert!(volume.dispatch(OperationRequest::open("\\r")).is_ok());
}

#[test]
fn cleanup_without_delete_changes_nothing() {
    let volume = volume();
    let file = create(&volume, "\\keep").unwrap();
    volume
        .dispatch(OperationRequest::Cleanup {
            file,
            delete: false,
        })
        .unwrap();
    assert_eq!(lifecycle(&volume, file), NodeLifecycle::Tabled);
    assert_eq!(open_count(&volume, file), Some(1));
}

#[test]
fn overwrite_through_dispatch_truncates() {
    let volume = volume();
    let file = create(&volume, "\\o").unwrap();
    let response = volume
        .dispatch(OperationRequest::Overwrite {
            file,
            file_attributes: 0,
            replace_file_attributes: false,
        })
        .unwrap();
    match response {
        OperationResponse::Overwritten(size) => {
            assert_eq!(size.allocation_size, 1024);
            assert_eq!(size.file_size, 0);
        }
        other => panic!("unexpected response {other:?}"),
    }
}

#[test]
fn get_security_round_trips_the_caller_buffer() {
    let volume = volume();
    let descriptor = vec![1u8, 0, 4, 0x80, 0x14, 0, 0, 0];
    volume
        .dispatch(OperationRequest::Create {
            file_name: "\\sd".into(),
            create_options: 0,
            file_attributes: FILE_ATTRIBUTE_ARCHIVE,
            security_descriptor: Some(descriptor.clone()),
            allocation_size: 0,
        })
        .unwrap();

    let probe = |buffer: Option<Vec<u8>>| {
        volume
            .dispatch(OperationRequest::GetSecurity {
                file_name: "\\sd".into(),
                security_buffer: buffer,
            })
            .unwrap()
    };

    match probe(None) {
        OperationResponse::GetSecurity {
            info,
            security_buffer,
        } => {
            assert_eq!(info.security_descriptor_size, 8);
            assert_eq!(security_buffer, None);
        }
        other => panic!("unexpected response {other:?}"),
    }

    match probe(Some(vec![0; 2])) {
        OperationResponse::GetSecurity {
            info,
            security_buffer,
        } => {
            assert_eq!(info.security_descriptor_size, 8);
            assert_eq!(security_buffer, Some(vec![0; 2]));
        }
        other => panic!("unexpected response {other:?}"),
    }

    match probe(Some(vec![0; 8])) {
        OperationResponse::GetSecurity {
            security_buffer, ..
        } => assert_eq!(security_buffer, Some(descriptor)),
        other => panic!("unexpected response {other:?}"),
    }
}

#[test]
fn quotas_reject_without_inserting() {
    let config = MemfsConfig {
        max_file_nodes: 2,
        max_file_size: 1000,
        ..MemfsConfig::default()
    };
    let volume = MemfsVolume::create(&config).unwrap();

    assert_eq!(
        volume
            .dispatch(OperationRequest::create("\\big", 0, 1025))
            .unwrap_err(),
        FsError::DiskFull
    );
    // 1000 is rounded up to the sector size.
    volume.dispatch(OperationRequest::create("\\a", 0, 1024)).unwrap();
    volume.dispatch(OperationRequest::create("\\b", 0, 0)).unwrap();
    assert_eq!(
        volume.dispatch(OperationRequest::create("\\c", 0, 0)).unwrap_err(),
        FsError::CannotMake
    );
    assert_eq!(volume.stats().tabled, 2);
}

#[test]
fn device_level_security_requests_are_not_serviced() {
    let volume = volume();
    assert_eq!(volume.device().kind(), DeviceKind::Volume);
    assert_eq!(
        volume.route(&IoRequest::query_security(0x4, 64)),
        Err(FsError::InvalidDeviceRequest)
    );
    assert_eq!(
        volume.route(&IoRequest::set_security(0x4, vec![1, 0, 4, 0x80])),
        Err(FsError::InvalidDeviceRequest)
    );
}
