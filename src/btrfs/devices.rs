//! Device enumeration
//!
//! The device id space of a btrfs filesystem is sparse: ids of removed
//! devices are never reused. Enumeration probes ids upward from zero until it
//! has found as many devices as the filesystem declares, and fails if it runs
//! past the highest id first.

use super::target::FsHandle;
use super::types::{DeviceDescriptor, FsInfo};
use crate::error::DeviceError;
use std::io;
use tracing::trace;

/// Source of device information for one filesystem
pub trait DeviceSource {
    /// Filesystem-wide device count and highest id
    fn fs_info(&self) -> io::Result<FsInfo>;

    /// One device, or `None` if the id is unused
    fn dev_info(&self, devid: u64) -> io::Result<Option<DeviceDescriptor>>;
}

impl DeviceSource for FsHandle {
    fn fs_info(&self) -> io::Result<FsInfo> {
        FsHandle::fs_info(self)
    }

    fn dev_info(&self, devid: u64) -> io::Result<Option<DeviceDescriptor>> {
        FsHandle::dev_info(self, devid)
    }
}

/// List every participating device, in id order
pub fn enumerate<S: DeviceSource + ?Sized>(source: &S) -> Result<Vec<DeviceDescriptor>, DeviceError> {
    let info = source.fs_info()?;
    let mut devices = Vec::with_capacity(info.num_devices.min(256) as usize);

    let mut devid = 0u64;
    let mut found = 0u64;
    while found < info.num_devices {
        if devid > info.max_id {
            return Err(DeviceError::CountMismatch {
                expected: info.num_devices,
                found,
            });
        }

        match source.dev_info(devid)? {
            Some(device) => {
                trace!(devid, bytes_used = device.bytes_used, "Found device");
                devices.push(device);
                found += 1;
            }
            None => trace!(devid, "Device id unused"),
        }

        devid += 1;
    }

    Ok(devices)
}
