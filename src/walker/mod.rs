//! Defragmenting filesystem walker
//!
//! Traverses a btrfs mountpoint iteratively, without recursion and without
//! following symlinks, and defragments every regular file and every
//! subvolume root of the same pool.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │      TreeWalker         │
//!                     │  - entry admission      │
//!                     │  - loop / pool checks   │
//!                     │  - defrag dispatch      │
//!                     └───────────┬─────────────┘
//!                                 │
//!             ┌───────────────────┴───────────────────┐
//!             │                                       │
//!   ┌─────────▼─────────┐                   ┌─────────▼─────────┐
//!   │  TraversalStack   │                   │      TreeFs       │
//!   │  root .. current  │                   │  O_PATH, statx,   │
//!   │  8-node chunks    │                   │  /proc/self/fd    │
//!   └───────────────────┘                   └───────────────────┘
//! ```

pub mod fs;
pub mod stack;
pub mod tree;

pub use fs::{BtrfsTree, DirEntry, EntryHint, NodeKind, NodeStat, TreeFs, EXTENT_THRESHOLD};
pub use stack::{TraversalStack, CHUNK_CAPACITY};
pub use tree::{TraversalNode, TreeWalker, WalkSummary, PROGRESS_THROTTLE};
