//! Safe wrappers around the btrfs ioctls
//!
//! A [`MountTarget`] owns the directory handle opened on a mountpoint for the
//! duration of one action. Workers get a cheap [`FsHandle`] clone so the
//! descriptor stays open until the last of them has been joined.

use super::ffi;
use super::types::{BalanceStat, DeviceDescriptor, DeviceStats, FsInfo, Fsid, ScrubProgress};
use crate::error::{is_no_device, BtrfsError, BtrfsResult};
use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One mounted filesystem under maintenance
#[derive(Debug)]
pub struct MountTarget {
    path: PathBuf,
    handle: FsHandle,
}

impl MountTarget {
    /// Open the mountpoint directory
    pub fn open(path: impl AsRef<Path>) -> BtrfsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY | libc::O_CLOEXEC)
            .open(&path)
            .map_err(|source| BtrfsError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            handle: FsHandle(Arc::new(OwnedFd::from(file))),
        })
    }

    /// Mountpoint path as given on the command line
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared handle for issuing ioctls
    pub fn handle(&self) -> &FsHandle {
        &self.handle
    }
}

/// Shareable open handle on a btrfs filesystem
#[derive(Debug, Clone)]
pub struct FsHandle(Arc<OwnedFd>);

impl FsHandle {
    fn raw(&self) -> libc::c_int {
        self.0.as_raw_fd()
    }

    /// Device count, highest device id and fsid
    pub fn fs_info(&self) -> io::Result<FsInfo> {
        fs_info(self.0.as_fd())
    }

    /// Look up one device id; `None` if the id is not in use
    pub fn dev_info(&self, devid: u64) -> io::Result<Option<DeviceDescriptor>> {
        let mut args = ffi::btrfs_ioctl_dev_info_args::for_device(devid);
        match unsafe { ffi::btrfs_dev_info(self.raw(), &mut args) } {
            Ok(_) => Ok(Some(DeviceDescriptor::from(&args))),
            Err(errno) => {
                let err = io::Error::from(errno);
                if is_no_device(&err) {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Run a scrub on one device; blocks until it finishes or is cancelled
    pub fn scrub(&self, args: &mut ffi::btrfs_ioctl_scrub_args) -> io::Result<()> {
        unsafe { ffi::btrfs_scrub(self.raw(), args) }
            .map(drop)
            .map_err(io::Error::from)
    }

    /// Cancel every running scrub on this filesystem
    pub fn scrub_cancel(&self) -> io::Result<()> {
        unsafe { ffi::btrfs_scrub_cancel(self.raw()) }
            .map(drop)
            .map_err(io::Error::from)
    }

    /// Counters of the scrub currently running on `devid`
    pub fn scrub_progress(&self, devid: u64) -> io::Result<ScrubProgress> {
        let mut args = ffi::btrfs_ioctl_scrub_args::for_device(devid);
        unsafe { ffi::btrfs_scrub_progress(self.raw(), &mut args) }.map_err(io::Error::from)?;
        Ok(args.progress)
    }

    /// Run a balance; blocks until it finishes or is cancelled
    pub fn balance(&self, args: &mut ffi::btrfs_ioctl_balance_args) -> io::Result<()> {
        unsafe { ffi::btrfs_balance_v2(self.raw(), args) }
            .map(drop)
            .map_err(io::Error::from)
    }

    /// Request cancellation of the running balance
    pub fn balance_cancel(&self) -> io::Result<()> {
        unsafe { ffi::btrfs_balance_ctl(self.raw(), ffi::BTRFS_BALANCE_CTL_CANCEL) }
            .map(drop)
            .map_err(io::Error::from)
    }

    /// Chunk counters of the running balance
    pub fn balance_progress(&self) -> io::Result<BalanceStat> {
        let mut args = ffi::btrfs_ioctl_balance_args::zeroed();
        unsafe { ffi::btrfs_balance_progress(self.raw(), &mut args) }.map_err(io::Error::from)?;
        Ok(args.stat)
    }

    /// Persistent error counters of one device
    pub fn dev_stats(&self, devid: u64) -> io::Result<DeviceStats> {
        let mut args = ffi::btrfs_ioctl_get_dev_stats::for_device(devid);
        unsafe { ffi::btrfs_get_dev_stats(self.raw(), &mut args) }.map_err(io::Error::from)?;
        Ok(DeviceStats::from(&args))
    }

    /// Discard all unused space; returns the number of bytes trimmed
    pub fn trim(&self) -> io::Result<u64> {
        let mut range = ffi::fstrim_range {
            start: 0,
            len: u64::MAX,
            minlen: 0,
        };
        unsafe { ffi::fitrim(self.raw(), &mut range) }.map_err(io::Error::from)?;
        Ok(range.len)
    }
}

/// `BTRFS_IOC_FS_INFO` on any descriptor inside the filesystem
pub fn fs_info(fd: impl AsFd) -> io::Result<FsInfo> {
    let mut args = ffi::btrfs_ioctl_fs_info_args::zeroed();
    unsafe { ffi::btrfs_fs_info(fd.as_fd().as_raw_fd(), &mut args) }.map_err(io::Error::from)?;
    Ok(FsInfo::from(&args))
}

/// Filesystem identity of the pool holding `fd`
pub fn fsid(fd: impl AsFd) -> io::Result<Fsid> {
    fs_info(fd).map(|info| info.fsid)
}

/// Defragment the whole file (or subvolume tree root) behind `fd`
pub fn defrag_range(fd: impl AsFd, extent_threshold: u32) -> io::Result<()> {
    let args = ffi::btrfs_ioctl_defrag_range_args {
        len: u64::MAX,
        extent_thresh: extent_threshold,
        ..Default::default()
    };
    unsafe { ffi::btrfs_defrag_range(fd.as_fd().as_raw_fd(), &args) }
        .map(drop)
        .map_err(io::Error::from)
}
