//! btrfs value types
//!
//! Safe, copyable views of the data the kernel hands back through the
//! ioctls in [`super::ffi`].

use super::ffi;
use std::fmt;

/// Scrub counters reported by the kernel for one device
pub type ScrubProgress = ffi::btrfs_scrub_progress;

/// Balance chunk counters
pub type BalanceStat = ffi::btrfs_balance_progress;

/// Filesystem identity token shared by every subvolume of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fsid(pub [u8; ffi::BTRFS_FSID_SIZE]);

impl fmt::Display for Fsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Device number of the filesystem holding an inode
///
/// Every btrfs subvolume gets its own anonymous device number, so a change
/// between a directory and its parent marks a subvolume or mount boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceNumber {
    pub major: u32,
    pub minor: u32,
}

impl DeviceNumber {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Filesystem-wide information from `BTRFS_IOC_FS_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    /// Number of devices participating in the filesystem
    pub num_devices: u64,

    /// Highest device id in use (ids below it may be unused)
    pub max_id: u64,

    /// Filesystem identity
    pub fsid: Fsid,
}

impl From<&ffi::btrfs_ioctl_fs_info_args> for FsInfo {
    fn from(args: &ffi::btrfs_ioctl_fs_info_args) -> Self {
        Self {
            num_devices: args.num_devices,
            max_id: args.max_id,
            fsid: Fsid(args.fsid),
        }
    }
}

/// One participating storage device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Device id within the filesystem
    pub devid: u64,

    /// Bytes allocated on the device
    pub bytes_used: u64,

    /// Device size in bytes
    pub total_bytes: u64,
}

impl From<&ffi::btrfs_ioctl_dev_info_args> for DeviceDescriptor {
    fn from(args: &ffi::btrfs_ioctl_dev_info_args) -> Self {
        Self {
            devid: args.devid,
            bytes_used: args.bytes_used,
            total_bytes: args.total_bytes,
        }
    }
}

/// Persistent per-device error counters from `BTRFS_IOC_GET_DEV_STATS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    pub devid: u64,

    /// Counter values indexed by `BTRFS_DEV_STAT_*`; `None` when the kernel
    /// returned fewer items than this index
    pub values: [Option<u64>; ffi::BTRFS_DEV_STAT_VALUES_MAX],
}

impl From<&ffi::btrfs_ioctl_get_dev_stats> for DeviceStats {
    fn from(args: &ffi::btrfs_ioctl_get_dev_stats) -> Self {
        let mut values = [None; ffi::BTRFS_DEV_STAT_VALUES_MAX];
        for (i, slot) in values.iter_mut().enumerate() {
            if (i as u64) < args.nr_items {
                *slot = Some(args.values[i]);
            }
        }
        Self {
            devid: args.devid,
            values,
        }
    }
}

impl ScrubProgress {
    /// Bytes of data and metadata verified so far
    pub fn bytes_scrubbed(&self) -> u64 {
        self.data_bytes_scrubbed
            .saturating_add(self.tree_bytes_scrubbed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fsid_display() {
        let fsid = Fsid([
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef,
        ]);
        assert_eq!(fsid.to_string(), "12345678-9abc-def0-0123-456789abcdef");
    }

    #[test]
    fn test_dev_stats_respects_nr_items() {
        let mut raw = ffi::btrfs_ioctl_get_dev_stats::for_device(3);
        raw.nr_items = 2;
        raw.values = [7, 0, 9, 9, 9];
        let stats = DeviceStats::from(&raw);
        assert_eq!(stats.devid, 3);
        assert_eq!(stats.values, [Some(7), Some(0), None, None, None]);
    }
}
