//! Trim: discard unused space on the underlying devices

use super::header;
use crate::btrfs::MountTarget;
use crate::config::MaintainConfig;
use crate::error::is_unsupported;
use crate::progress::{format_bytes, format_number};
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Report the result of a `FITRIM` call
pub fn evaluate(mountpoint: &Path, result: io::Result<u64>) -> bool {
    match result {
        Ok(bytes) => {
            debug!(
                mountpoint = %mountpoint.display(),
                "Trimmed {} unused bytes ({})",
                format_number(bytes),
                format_bytes(bytes)
            );
            true
        }
        Err(e) if is_unsupported(&e) => {
            debug!(mountpoint = %mountpoint.display(), "Trim not supported");
            true
        }
        Err(e) => {
            error!(mountpoint = %mountpoint.display(), error = %e, "Trim failed");
            false
        }
    }
}

/// Trim the filesystem mounted at `mountpoint`
pub fn run(mountpoint: &Path, config: &MaintainConfig) -> bool {
    header(config, "Trim", mountpoint);

    match MountTarget::open(mountpoint) {
        Ok(target) => evaluate(mountpoint, target.handle().trim()),
        Err(e) => {
            error!(error = %e, "Cannot trim");
            false
        }
    }
}
