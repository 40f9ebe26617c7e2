pub mod handlers;

use clap::Parser;
use coldstore_core::error::Result;
use tracing_subscriber::EnvFilter;

use crate::presentation::cli::{BinpackArgs, ManageDiskArgs};

/// Logs go to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run_binpack() -> Result<()> {
    handlers::handle_binpack(BinpackArgs::parse())
}

pub fn run_manage_disk() -> Result<()> {
    handlers::handle_manage_disk(ManageDiskArgs::parse())
}
