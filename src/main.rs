//! maintain-btrfs - periodic btrfs maintenance
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use maintain_btrfs::actions;
use maintain_btrfs::config::{CliArgs, MaintainConfig};
use maintain_btrfs::progress::print_version;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    if args.version {
        print_version();
        return Ok(true);
    }

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = MaintainConfig::from_args(args)
        .context("Invalid configuration (run with --help for usage)")?;

    debug!(
        mountpoints = config.mountpoints.len(),
        scrub = config.actions.scrub,
        defragment = config.actions.defragment,
        balance = config.actions.balance,
        trim = config.actions.trim,
        "Starting maintenance"
    );

    let ok = actions::run_all(&config);

    if ok {
        debug!("Maintenance completed successfully");
    } else {
        info!("Maintenance completed with errors");
    }

    Ok(ok)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("maintain_btrfs=debug,warn")
    } else {
        EnvFilter::new("maintain_btrfs=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Failed to initialize logging")?;

    Ok(())
}
