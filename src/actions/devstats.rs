//! Device statistics: report persistent per-device error counters

use crate::btrfs::ffi::{
    BTRFS_DEV_STAT_CORRUPTION_ERRS, BTRFS_DEV_STAT_FLUSH_ERRS, BTRFS_DEV_STAT_GENERATION_ERRS,
    BTRFS_DEV_STAT_READ_ERRS, BTRFS_DEV_STAT_WRITE_ERRS,
};
use crate::btrfs::{devices, DeviceSource, DeviceStats, FsHandle, MountTarget};
use crate::config::MaintainConfig;
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Counter index and label, in report order
pub static DEV_STAT_COUNTERS: [(usize, &str); 5] = [
    (BTRFS_DEV_STAT_WRITE_ERRS, "write errors"),
    (BTRFS_DEV_STAT_READ_ERRS, "read errors"),
    (BTRFS_DEV_STAT_FLUSH_ERRS, "flush errors"),
    (BTRFS_DEV_STAT_CORRUPTION_ERRS, "corruption errors"),
    (BTRFS_DEV_STAT_GENERATION_ERRS, "generation errors"),
];

/// Source of device error counters
pub trait DevStatsSource: DeviceSource {
    fn dev_stats(&self, devid: u64) -> io::Result<DeviceStats>;
}

impl DevStatsSource for FsHandle {
    fn dev_stats(&self, devid: u64) -> io::Result<DeviceStats> {
        FsHandle::dev_stats(self, devid)
    }
}

/// A nonzero counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevStatFinding {
    pub devid: u64,
    pub label: &'static str,
    pub count: u64,
}

/// Nonzero counters of one device; counters the kernel did not return are
/// ignored
pub fn check_device(mountpoint: &Path, stats: &DeviceStats) -> Vec<DevStatFinding> {
    let mut findings = Vec::new();

    for &(index, label) in DEV_STAT_COUNTERS.iter() {
        match stats.values[index] {
            Some(0) => {
                debug!(mountpoint = %mountpoint.display(), devid = stats.devid, "Zero {label}");
            }
            Some(count) => {
                error!(mountpoint = %mountpoint.display(), devid = stats.devid, count, "Nonzero {label}");
                findings.push(DevStatFinding {
                    devid: stats.devid,
                    label,
                    count,
                });
            }
            None => {}
        }
    }

    findings
}

/// Check every device; stops at the first device that cannot be queried
pub fn check_devices<S: DevStatsSource + ?Sized>(mountpoint: &Path, source: &S) -> bool {
    let devices = match devices::enumerate(source) {
        Ok(devices) => devices,
        Err(e) => {
            error!(mountpoint = %mountpoint.display(), error = %e, "Device enumeration failed");
            return false;
        }
    };

    let mut ok = true;
    for device in &devices {
        match source.dev_stats(device.devid) {
            Ok(stats) => ok &= check_device(mountpoint, &stats).is_empty(),
            Err(e) => {
                error!(mountpoint = %mountpoint.display(), devid = device.devid, error = %e, "Failed to read device statistics");
                return false;
            }
        }
    }
    ok
}

/// Report device statistics of the filesystem mounted at `mountpoint`
pub fn run(mountpoint: &Path, _config: &MaintainConfig) -> bool {
    match MountTarget::open(mountpoint) {
        Ok(target) => check_devices(mountpoint, target.handle()),
        Err(e) => {
            error!(error = %e, "Cannot read device statistics");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btrfs::{DeviceDescriptor, FsInfo, Fsid};
    use std::collections::HashMap;

    struct FakeStats {
        stats: HashMap<u64, [Option<u64>; 5]>,
    }

    impl DeviceSource for FakeStats {
        fn fs_info(&self) -> io::Result<FsInfo> {
            Ok(FsInfo {
                num_devices: self.stats.len() as u64,
                max_id: self.stats.keys().copied().max().unwrap_or(0),
                fsid: Fsid::default(),
            })
        }

        fn dev_info(&self, devid: u64) -> io::Result<Option<DeviceDescriptor>> {
            Ok(self.stats.contains_key(&devid).then_some(DeviceDescriptor {
                devid,
                bytes_used: 0,
                total_bytes: 0,
            }))
        }
    }

    impl DevStatsSource for FakeStats {
        fn dev_stats(&self, devid: u64) -> io::Result<DeviceStats> {
            match self.stats.get(&devid) {
                Some(values) => Ok(DeviceStats {
                    devid,
                    values: *values,
                }),
                None => Err(io::Error::from_raw_os_error(libc::ENODEV)),
            }
        }
    }

    #[test]
    fn test_all_zero_is_ok() {
        let source = FakeStats {
            stats: HashMap::from([(1, [Some(0); 5]), (2, [Some(0); 5])]),
        };
        assert!(check_devices(Path::new("/mnt/pool"), &source));
    }

    #[test]
    fn test_nonzero_counter_fails() {
        let source = FakeStats {
            stats: HashMap::from([
                (1, [Some(0); 5]),
                (3, [Some(0), Some(0), Some(0), Some(7), Some(0)]),
            ]),
        };
        assert!(!check_devices(Path::new("/mnt/pool"), &source));
    }

    #[test]
    fn test_check_device_labels() {
        let stats = DeviceStats {
            devid: 4,
            values: [Some(1), Some(0), Some(2), Some(0), Some(0)],
        };
        let findings = check_device(Path::new("/"), &stats);
        assert_eq!(
            findings,
            vec![
                DevStatFinding {
                    devid: 4,
                    label: "write errors",
                    count: 1
                },
                DevStatFinding {
                    devid: 4,
                    label: "flush errors",
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn test_missing_items_ignored() {
        // Older kernels return fewer counters
        let stats = DeviceStats {
            devid: 1,
            values: [Some(0), Some(0), None, None, None],
        };
        assert!(check_device(Path::new("/"), &stats).is_empty());
    }
}
