//! Error types for maintain-btrfs
//!
//! This module defines the error hierarchy that covers:
//! - btrfs ioctl and filesystem handle errors
//! - Device enumeration errors
//! - Configuration and CLI errors
//! - Worker thread and signal bridge errors
//! - Tree walk errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors carry the mountpoint, path or device they concern
//! - Preserve error chains for debugging

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the maintain-btrfs library
#[derive(Error, Debug)]
pub enum MaintainError {
    /// btrfs ioctl errors
    #[error("btrfs error: {0}")]
    Btrfs(#[from] BtrfsError),

    /// Device enumeration errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Tree walk errors
    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),

    /// Signal handling errors
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from opening a filesystem or issuing a btrfs ioctl
#[derive(Error, Debug)]
pub enum BtrfsError {
    /// Failed to open the mountpoint
    #[error("Failed to open '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    /// An ioctl failed
    #[error("{request} failed on '{path}': {source}")]
    Ioctl {
        request: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl BtrfsError {
    /// Wrap a failed ioctl with the request name and mountpoint
    pub fn ioctl(request: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        BtrfsError::Ioctl {
            request,
            path: path.into(),
            source,
        }
    }
}

/// Device enumeration errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The filesystem declared more devices than the id space contained
    #[error("expected to find {expected} devices but only found {found}")]
    CountMismatch { expected: u64, found: u64 },

    /// Querying the filesystem or a device failed
    #[error("device query failed: {0}")]
    Query(#[from] io::Error),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No mountpoints given
    #[error("At least one filesystem mount point must be specified")]
    NoMountpoints,

    /// Mountpoint is not a directory
    #[error("Invalid mount point '{path}': {reason}")]
    InvalidMountpoint { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked")]
    Panicked { id: usize },

    /// Worker thread could not be spawned
    #[error("Failed to spawn worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },
}

/// Tree walk errors that abort the whole walk
#[derive(Error, Debug)]
pub enum WalkError {
    /// The traversal stack could not grow
    #[error("Failed to grow traversal stack: {0}")]
    StackAlloc(#[from] std::collections::TryReserveError),
}

/// Cancellation signal bridge errors
#[derive(Error, Debug)]
pub enum SignalError {
    /// Changing the signal mask failed
    #[error("Failed to change signal mask: {0}")]
    Mask(nix::Error),

    /// Creating the signalfd failed
    #[error("Failed to create signalfd: {0}")]
    SignalFd(nix::Error),

    /// Spawning the bridge thread failed
    #[error("Failed to spawn signal bridge: {0}")]
    Bridge(io::Error),
}

/// Result type alias for MaintainError
pub type Result<T> = std::result::Result<T, MaintainError>;

/// Result type alias for BtrfsError
pub type BtrfsResult<T> = std::result::Result<T, BtrfsError>;

/// Check if an error is the kernel reporting a cancelled operation
pub fn is_cancelled(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ECANCELED)
}

/// Check if an error is a write refused on a read-only subvolume or mount
pub fn is_read_only(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EROFS)
}

/// Check if an error means the entry vanished between listing and opening
pub fn is_vanished(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOENT)
}

/// Check if an error means the request is not supported by the filesystem
pub fn is_unsupported(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EOPNOTSUPP)
}

/// Check if an error means a device id is not in use
pub fn is_no_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENODEV)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_classification() {
        let cancelled = io::Error::from_raw_os_error(libc::ECANCELED);
        assert!(is_cancelled(&cancelled));
        assert!(!is_read_only(&cancelled));

        let rofs = io::Error::from_raw_os_error(libc::EROFS);
        assert!(is_read_only(&rofs));

        let gone = io::Error::from_raw_os_error(libc::ENOENT);
        assert!(is_vanished(&gone));
        assert!(!is_vanished(&io::Error::other("synthetic")));
    }

    #[test]
    fn test_error_conversion() {
        let dev_err = DeviceError::CountMismatch {
            expected: 3,
            found: 2,
        };
        let err: MaintainError = dev_err.into();
        assert!(matches!(err, MaintainError::Device(_)));
        assert_eq!(
            err.to_string(),
            "Device error: expected to find 3 devices but only found 2"
        );
    }
}
