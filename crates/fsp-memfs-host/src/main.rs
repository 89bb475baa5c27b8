// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! FSP memfs host
//!
//! Builds an in-memory volume from a JSON configuration, drives a smoke
//! workload through its dispatcher, prints the volume statistics and tears
//! the volume down.

use anyhow::{ensure, Context, Result};
use clap::Parser;
use fsp_core::attributes::FILE_ATTRIBUTE_ARCHIVE;
use fsp_core::{FsError, IoRequest, OperationRequest};
use fsp_logging::CliLoggingArgs;
use fsp_memfs::{MemfsConfig, MemfsVolume, NodeId, NodeLifecycle};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about = "Serve an in-memory FSP volume and exercise it")]
struct Args {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the network device path
    #[arg(long)]
    net: bool,

    /// Dispatch through a worker pool
    #[arg(long)]
    thread_pool: bool,

    /// Worker threads when pooled
    #[arg(long)]
    threads: Option<usize>,

    #[arg(long)]
    max_file_nodes: Option<usize>,

    #[arg(long)]
    max_file_size: Option<u64>,

    /// Number of extra files to create concurrently after the smoke run
    #[arg(long, default_value_t = 0)]
    stress: usize,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

fn load_config(config_path: Option<&PathBuf>) -> Result<MemfsConfig> {
    match config_path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = MemfsConfig::from_json_str(&content)?;
            Ok(config)
        }
        None => Ok(MemfsConfig::default()),
    }
}

fn apply_overrides(args: &Args, config: &mut MemfsConfig) {
    config.flags.net |= args.net;
    config.flags.thread_pool |= args.thread_pool;
    if let Some(threads) = args.threads {
        config.pool_threads = threads;
    }
    if let Some(max_file_nodes) = args.max_file_nodes {
        config.max_file_nodes = max_file_nodes;
    }
    if let Some(max_file_size) = args.max_file_size {
        config.max_file_size = max_file_size;
    }
}

fn create(volume: &MemfsVolume, name: &str, allocation_size: u64) -> Result<NodeId, FsError> {
    volume
        .dispatch(OperationRequest::create(name, FILE_ATTRIBUTE_ARCHIVE, allocation_size))?
        .file_context()
        .ok_or(FsError::InvalidHandle)
}

/// Create, reopen, delete and close one file, checking each step.
fn run_smoke(volume: &MemfsVolume) -> Result<()> {
    let name = "\\a.txt";

    let created = volume.dispatch(OperationRequest::create(name, FILE_ATTRIBUTE_ARCHIVE, 1000))?;
    let info = created.file_info().context("create returned no file info")?;
    ensure!(info.allocation_size == 1024, "allocation size {}", info.allocation_size);
    let file = created.file_context().context("create returned no handle")?;

    volume.dispatch(OperationRequest::open(name))?;
    volume.dispatch(OperationRequest::Close { file })?;
    ensure!(
        create(volume, name, 0) == Err(FsError::NameCollision),
        "duplicate create was admitted"
    );

    volume.dispatch(OperationRequest::Cleanup { file, delete: true })?;
    let fresh = create(volume, name, 0)?;

    volume.dispatch(OperationRequest::Close { file })?;
    let freed = volume.with_memfs(|memfs| memfs.lifecycle(file));
    ensure!(freed == NodeLifecycle::Freed, "deleted node is {freed:?}");

    volume.dispatch(OperationRequest::Cleanup {
        file: fresh,
        delete: true,
    })?;
    volume.dispatch(OperationRequest::Close { file: fresh })?;

    // Volume-level security is not serviced by this volume.
    let routed = volume.route(&IoRequest::query_security(0x4, 256));
    ensure!(
        routed == Err(FsError::InvalidDeviceRequest),
        "volume security query returned {routed:?}"
    );

    info!("smoke run passed");
    Ok(())
}

/// Create `count` files through `submit`; returns how many were refused.
fn run_stress(volume: &MemfsVolume, count: usize) -> Result<usize> {
    let pending = (0..count)
        .map(|i| volume.submit(OperationRequest::create(format!("\\stress-{i}"), 0, 512)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut refused = 0;
    for op in pending {
        match op.wait() {
            Ok(_) => {}
            Err(err) if err.is_recoverable() => refused += 1,
            Err(err) => return Err(err.into()),
        }
    }
    if refused > 0 {
        warn!(refused, "stress creates refused by quota");
    }
    Ok(refused)
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.logging.clone().init("fsp-memfs-host")?;

    info!("Starting FSP memfs host");

    let mut config = load_config(args.config.as_ref())?;
    apply_overrides(&args, &mut config);
    info!("Configuration loaded: {:?}", config);

    let volume = MemfsVolume::create(&config)?;
    run_smoke(&volume)?;
    if args.stress > 0 {
        let refused = run_stress(&volume, args.stress)?;
        info!(created = args.stress - refused, refused, "stress run finished");
    }

    println!("{}", serde_json::to_string_pretty(&volume.stats())?);
    volume.delete();
    Ok(())
}
