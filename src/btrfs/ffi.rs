//! Raw btrfs ioctl interface
//!
//! Layouts mirror `linux/btrfs.h` and `linux/fs.h`. The request functions are
//! generated with nix's ioctl macros and are all `unsafe`; the safe wrappers
//! live in [`super::target`].

#![allow(non_camel_case_types)]

pub const BTRFS_IOCTL_MAGIC: u8 = 0x94;
pub const BTRFS_FSID_SIZE: usize = 16;
pub const BTRFS_UUID_SIZE: usize = 16;
pub const BTRFS_DEVICE_PATH_NAME_MAX: usize = 1024;

pub const BTRFS_BALANCE_DATA: u64 = 1 << 0;
pub const BTRFS_BALANCE_SYSTEM: u64 = 1 << 1;
pub const BTRFS_BALANCE_METADATA: u64 = 1 << 2;

pub const BTRFS_BALANCE_ARGS_USAGE: u64 = 1 << 1;

pub const BTRFS_BALANCE_CTL_CANCEL: nix::sys::ioctl::ioctl_param_type = 2;

pub const BTRFS_BALANCE_STATE_CANCEL_REQ: u64 = 1 << 2;

pub const BTRFS_DEV_STAT_WRITE_ERRS: usize = 0;
pub const BTRFS_DEV_STAT_READ_ERRS: usize = 1;
pub const BTRFS_DEV_STAT_FLUSH_ERRS: usize = 2;
pub const BTRFS_DEV_STAT_CORRUPTION_ERRS: usize = 3;
pub const BTRFS_DEV_STAT_GENERATION_ERRS: usize = 4;
pub const BTRFS_DEV_STAT_VALUES_MAX: usize = 5;

/// Inode number of the placeholder directory left where a nested subvolume
/// was in the source of a snapshot
pub const BTRFS_EMPTY_SUBVOL_DIR_OBJECTID: u64 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct btrfs_scrub_progress {
    pub data_extents_scrubbed: u64,
    pub tree_extents_scrubbed: u64,
    pub data_bytes_scrubbed: u64,
    pub tree_bytes_scrubbed: u64,
    pub read_errors: u64,
    pub csum_errors: u64,
    pub verify_errors: u64,
    pub no_csum: u64,
    pub csum_discards: u64,
    pub super_errors: u64,
    pub malloc_errors: u64,
    pub uncorrectable_errors: u64,
    pub corrected_errors: u64,
    pub last_physical: u64,
    pub unverified_errors: u64,
}

const SCRUB_UNUSED: usize = (1024 - 32 - std::mem::size_of::<btrfs_scrub_progress>()) / 8;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct btrfs_ioctl_scrub_args {
    pub devid: u64,
    pub start: u64,
    pub end: u64,
    pub flags: u64,
    pub progress: btrfs_scrub_progress,
    pub unused: [u64; SCRUB_UNUSED],
}

impl btrfs_ioctl_scrub_args {
    /// Arguments scrubbing the whole of one device
    pub fn for_device(devid: u64) -> Self {
        Self {
            devid,
            start: 0,
            end: u64::MAX,
            flags: 0,
            progress: btrfs_scrub_progress::default(),
            unused: [0; SCRUB_UNUSED],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct btrfs_ioctl_fs_info_args {
    pub max_id: u64,
    pub num_devices: u64,
    pub fsid: [u8; BTRFS_FSID_SIZE],
    pub nodesize: u32,
    pub sectorsize: u32,
    pub clone_alignment: u32,
    pub csum_type: u16,
    pub csum_size: u16,
    pub flags: u64,
    pub generation: u64,
    pub metadata_uuid: [u8; BTRFS_FSID_SIZE],
    pub reserved: [u8; 944],
}

impl btrfs_ioctl_fs_info_args {
    pub fn zeroed() -> Self {
        Self {
            max_id: 0,
            num_devices: 0,
            fsid: [0; BTRFS_FSID_SIZE],
            nodesize: 0,
            sectorsize: 0,
            clone_alignment: 0,
            csum_type: 0,
            csum_size: 0,
            flags: 0,
            generation: 0,
            metadata_uuid: [0; BTRFS_FSID_SIZE],
            reserved: [0; 944],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct btrfs_ioctl_dev_info_args {
    pub devid: u64,
    pub uuid: [u8; BTRFS_UUID_SIZE],
    pub bytes_used: u64,
    pub total_bytes: u64,
    pub fsid: [u8; BTRFS_UUID_SIZE],
    pub unused: [u64; 377],
    pub path: [u8; BTRFS_DEVICE_PATH_NAME_MAX],
}

impl btrfs_ioctl_dev_info_args {
    pub fn for_device(devid: u64) -> Self {
        Self {
            devid,
            uuid: [0; BTRFS_UUID_SIZE],
            bytes_used: 0,
            total_bytes: 0,
            fsid: [0; BTRFS_UUID_SIZE],
            unused: [0; 377],
            path: [0; BTRFS_DEVICE_PATH_NAME_MAX],
        }
    }
}

/// Per-chunk-type balance filter (`__packed__` in the kernel header; every
/// field is naturally aligned so `repr(C)` yields the same layout)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct btrfs_balance_args {
    pub profiles: u64,
    pub usage: u64,
    pub devid: u64,
    pub pstart: u64,
    pub pend: u64,
    pub vstart: u64,
    pub vend: u64,
    pub target: u64,
    pub flags: u64,
    pub limit: u64,
    pub stripes_min: u32,
    pub stripes_max: u32,
    pub unused: [u64; 6],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct btrfs_balance_progress {
    pub expected: u64,
    pub considered: u64,
    pub completed: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct btrfs_ioctl_balance_args {
    pub flags: u64,
    pub state: u64,
    pub data: btrfs_balance_args,
    pub meta: btrfs_balance_args,
    pub sys: btrfs_balance_args,
    pub stat: btrfs_balance_progress,
    pub unused: [u64; 72],
}

impl btrfs_ioctl_balance_args {
    pub fn zeroed() -> Self {
        Self {
            flags: 0,
            state: 0,
            data: btrfs_balance_args::default(),
            meta: btrfs_balance_args::default(),
            sys: btrfs_balance_args::default(),
            stat: btrfs_balance_progress::default(),
            unused: [0; 72],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct btrfs_ioctl_get_dev_stats {
    pub devid: u64,
    pub nr_items: u64,
    pub flags: u64,
    pub values: [u64; BTRFS_DEV_STAT_VALUES_MAX],
    pub unused: [u64; 128 - 2 - BTRFS_DEV_STAT_VALUES_MAX],
}

impl btrfs_ioctl_get_dev_stats {
    pub fn for_device(devid: u64) -> Self {
        Self {
            devid,
            nr_items: BTRFS_DEV_STAT_VALUES_MAX as u64,
            flags: 0,
            values: [0; BTRFS_DEV_STAT_VALUES_MAX],
            unused: [0; 128 - 2 - BTRFS_DEV_STAT_VALUES_MAX],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct btrfs_ioctl_defrag_range_args {
    pub start: u64,
    pub len: u64,
    pub flags: u64,
    pub extent_thresh: u32,
    pub compress_type: u32,
    pub unused: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct fstrim_range {
    pub start: u64,
    pub len: u64,
    pub minlen: u64,
}

nix::ioctl_write_ptr!(
    btrfs_defrag_range,
    BTRFS_IOCTL_MAGIC,
    16,
    btrfs_ioctl_defrag_range_args
);
nix::ioctl_readwrite!(btrfs_scrub, BTRFS_IOCTL_MAGIC, 27, btrfs_ioctl_scrub_args);
nix::ioctl_none!(btrfs_scrub_cancel, BTRFS_IOCTL_MAGIC, 28);
nix::ioctl_readwrite!(
    btrfs_scrub_progress,
    BTRFS_IOCTL_MAGIC,
    29,
    btrfs_ioctl_scrub_args
);
nix::ioctl_readwrite!(btrfs_dev_info, BTRFS_IOCTL_MAGIC, 30, btrfs_ioctl_dev_info_args);
nix::ioctl_read!(btrfs_fs_info, BTRFS_IOCTL_MAGIC, 31, btrfs_ioctl_fs_info_args);
nix::ioctl_readwrite!(btrfs_balance_v2, BTRFS_IOCTL_MAGIC, 32, btrfs_ioctl_balance_args);
nix::ioctl_write_int!(btrfs_balance_ctl, BTRFS_IOCTL_MAGIC, 33);
nix::ioctl_read!(
    btrfs_balance_progress,
    BTRFS_IOCTL_MAGIC,
    34,
    btrfs_ioctl_balance_args
);
nix::ioctl_readwrite!(
    btrfs_get_dev_stats,
    BTRFS_IOCTL_MAGIC,
    52,
    btrfs_ioctl_get_dev_stats
);
nix::ioctl_readwrite!(fitrim, b'X', 121, fstrim_range);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_struct_sizes_match_kernel() {
        assert_eq!(size_of::<btrfs_scrub_progress>(), 120);
        assert_eq!(size_of::<btrfs_ioctl_scrub_args>(), 1024);
        assert_eq!(size_of::<btrfs_ioctl_fs_info_args>(), 1024);
        assert_eq!(size_of::<btrfs_ioctl_dev_info_args>(), 4096);
        assert_eq!(size_of::<btrfs_balance_args>(), 136);
        assert_eq!(size_of::<btrfs_ioctl_balance_args>(), 1024);
        assert_eq!(size_of::<btrfs_ioctl_get_dev_stats>(), 1032);
        assert_eq!(size_of::<btrfs_ioctl_defrag_range_args>(), 48);
        assert_eq!(size_of::<fstrim_range>(), 24);
    }
}
