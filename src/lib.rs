//! maintain-btrfs - Periodic maintenance for btrfs filesystems
//!
//! Scrubs, defragments, balances and trims mounted btrfs pools, and reports
//! the persistent device error counters.
//!
//! # Features
//!
//! - **Cancellable kernel operations**: scrub and balance run as blocking,
//!   uninterruptible ioctls on worker threads. SIGINT, SIGQUIT and SIGTERM
//!   are turned into a clean cancel, after which the signal is delivered.
//!
//! - **Concurrent scrub**: one worker per device, with per-device progress.
//!
//! - **Race-free defragmentation walk**: iterative traversal that never
//!   follows symlinks, identifies every entry through an `O_PATH` handle, and
//!   stays within the pool it started on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        actions::run_all                          │
//! │   scrub ─► device stats ─► defragment ─► balance ─► trim         │
//! └──────┬──────────────────────────┬──────────────────────┬────────┘
//!        │                          │                      │
//!        ▼                          ▼                      ▼
//! ┌──────────────┐          ┌──────────────┐       ┌──────────────┐
//! │  Supervisor  │          │  TreeWalker  │       │ btrfs ioctls │
//! │  + workers   │          │  + stack     │       │ (MountTarget)│
//! │  + signals   │          │              │       │              │
//! └──────┬───────┘          └──────┬───────┘       └──────────────┘
//!        │                         │
//!        └─────────────┬───────────┘
//!                      ▼
//!              ┌──────────────┐
//!              │ btrfs kernel │
//!              └──────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Everything, on two filesystems
//! maintain-btrfs / /home
//!
//! # Only scrub and trim, with progress
//! maintain-btrfs --no-defragment --no-balance -v /mnt/pool
//! ```

pub mod actions;
pub mod btrfs;
pub mod config;
pub mod error;
pub mod progress;
pub mod supervisor;
pub mod walker;

pub use config::{ActionSet, CliArgs, MaintainConfig};
pub use error::{MaintainError, Result};
pub use supervisor::{Operation, Progress, Supervisor, SupervisorReport};
pub use walker::{TreeFs, TreeWalker, WalkSummary};
