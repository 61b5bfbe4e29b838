// CLASSIFICATION: COMMUNITY
// Filename: main.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-08-02

//! Entry point for the filegate binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use filegate::server::DEFAULT_WORKER_THREADS;
use filegate::{Config, FileGate};

/// Serve per-user workspace directories over an authenticated HTTP API.
#[derive(Parser)]
#[command(name = "filegate", about = "Authenticated HTTP door onto per-user workspaces")]
struct Args {
    /// Listen port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Workspace base directory (overrides VFS_WORKSPACE_BASE).
    #[arg(long)]
    workspace_base: Option<PathBuf>,
    /// Service token pairs, "svc1:tok1,svc2:tok2" (overrides VFS_SERVICE_TOKENS).
    #[arg(long)]
    service_tokens: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::resolve(args.port, args.workspace_base, args.service_tokens)?;
    let port = config.port;
    let workspace = config.workspace_base.display().to_string();

    let gate = FileGate::new(config)?;
    info!("filegate listening on :{port} (workspace={workspace})");
    let handle = gate.serve(&format!("0.0.0.0:{port}"), DEFAULT_WORKER_THREADS)?;
    handle.join();
    Ok(())
}
