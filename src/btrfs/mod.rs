//! btrfs kernel interface
//!
//! Everything the maintenance actions need from the kernel goes through
//! ioctls on an open directory handle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    MountTarget                       │
//! │  - Opened once per action, closed on drop           │
//! │  - Hands out FsHandle clones to worker threads      │
//! └───────────────────────────┬─────────────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 btrfs ioctls (ffi)                   │
//! │  - SCRUB / BALANCE_V2 block until done or cancelled │
//! │  - FS_INFO / DEV_INFO / GET_DEV_STATS / FITRIM      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use maintain_btrfs::btrfs::{devices, MountTarget};
//!
//! let target = MountTarget::open("/mnt/pool").unwrap();
//! for device in devices::enumerate(target.handle()).unwrap() {
//!     println!("device {} uses {} bytes", device.devid, device.bytes_used);
//! }
//! ```

pub mod devices;
pub mod ffi;
mod target;
pub mod types;

pub use devices::{enumerate, DeviceSource};
pub use target::{defrag_range, fs_info, fsid, FsHandle, MountTarget};
pub use types::{BalanceStat, DeviceDescriptor, DeviceNumber, DeviceStats, FsInfo, Fsid, ScrubProgress};
