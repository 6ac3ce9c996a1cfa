//! Iterative tree walker
//!
//! Pre-order depth-first traversal with an explicit [`TraversalStack`]:
//! the top node's entry stream is read one entry at a time, each entry is
//! admitted (identified, checked, defragmented) and directories are pushed.
//! An exhausted stream pops its directory. Depth is bounded only by memory.

use super::fs::{DirEntry, EntryHint, NodeKind, NodeStat, TreeFs};
use super::stack::TraversalStack;
use crate::btrfs::ffi::BTRFS_EMPTY_SUBVOL_DIR_OBJECTID;
use crate::btrfs::{DeviceNumber, Fsid};
use crate::error::{is_read_only, is_vanished, WalkError};
use crate::progress::ProgressReporter;
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Minimum interval between two path updates on the progress line
pub const PROGRESS_THROTTLE: Duration = Duration::from_millis(250);

/// One open directory on the current path
pub struct TraversalNode<S> {
    pub dev: DeviceNumber,
    pub inode: u64,

    /// Entry name (the full root path for the bottom node)
    pub name: OsString,

    pub stream: S,
}

/// Counters of one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Regular files defragmented
    pub files: u64,

    /// Subvolume roots defragmented (the walk root included)
    pub subvolumes: u64,

    /// Directories pushed
    pub directories: u64,

    /// Entries skipped as vanished, foreign or not applicable
    pub skipped: u64,

    /// Filesystem loops detected
    pub loops: u64,

    /// Per-node errors, loops included
    pub errors: u64,
}

impl WalkSummary {
    /// Whether every admitted node was handled without error
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    /// Total defragmentation requests that succeeded
    pub fn defragmented(&self) -> u64 {
        self.files + self.subvolumes
    }
}

/// Per-walk state
struct WalkState<S> {
    stack: TraversalStack<TraversalNode<S>>,
    fsid: Option<Fsid>,
    summary: WalkSummary,
    last_render: Option<Instant>,
}

/// Outcome of admitting one entry
enum Admission {
    Done,
    Skipped,
    Failed,
}

/// Defragmenting tree walker
pub struct TreeWalker<F: TreeFs> {
    fs: F,
    reporter: Option<ProgressReporter>,
}

impl<F: TreeFs> TreeWalker<F> {
    pub fn new(fs: F) -> Self {
        Self { fs, reporter: None }
    }

    /// Show the directory being walked on `reporter`
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Filesystem the walker runs on
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Walk and defragment everything under `root` on the same pool
    ///
    /// Per-node failures are logged and counted in the summary; only a
    /// failure to grow the traversal stack aborts the walk.
    pub fn walk(&self, root: &Path) -> Result<WalkSummary, WalkError> {
        let mut state = WalkState {
            stack: TraversalStack::new(),
            fsid: None,
            summary: WalkSummary::default(),
            last_render: None,
        };

        debug!(root = %root.display(), "Starting defragmentation walk");
        self.admit(&mut state, root.as_os_str())?;

        while let Some(top) = state.stack.top_mut() {
            match self.fs.next_entry(&mut top.stream) {
                None => {
                    state.stack.pop();
                }
                Some(Err(e)) => {
                    error!(path = %current_path(&state.stack).display(), error = %e, "Failed to read directory");
                    state.summary.errors += 1;
                    state.stack.pop();
                }
                Some(Ok(entry)) => {
                    if !wanted(&entry) {
                        continue;
                    }
                    self.admit(&mut state, &entry.name)?;
                }
            }
        }

        let summary = state.summary;
        debug!(
            root = %root.display(),
            files = summary.files,
            subvolumes = summary.subvolumes,
            directories = summary.directories,
            errors = summary.errors,
            "Defragmentation walk complete"
        );
        Ok(summary)
    }

    fn admit(&self, state: &mut WalkState<F::Stream>, name: &OsStr) -> Result<(), WalkError> {
        match self.admit_entry(state, name)? {
            Admission::Done => {}
            Admission::Skipped => state.summary.skipped += 1,
            Admission::Failed => state.summary.errors += 1,
        }
        Ok(())
    }

    fn admit_entry(
        &self,
        state: &mut WalkState<F::Stream>,
        name: &OsStr,
    ) -> Result<Admission, WalkError> {
        let parent = state.stack.top();

        let probe = match self.fs.open_probe(parent.map(|node| &node.stream), name) {
            Ok(probe) => probe,
            Err(e) if is_vanished(&e) => {
                debug!(path = %entry_path(&state.stack, name).display(), "Entry vanished");
                return Ok(Admission::Skipped);
            }
            Err(e) => return Ok(report(&state.stack, name, "open", &e)),
        };

        let stat: NodeStat = match self.fs.stat(&probe) {
            Ok(stat) => stat,
            Err(e) => return Ok(report(&state.stack, name, "stat", &e)),
        };

        match self.fs.is_target_fs(&probe) {
            Ok(true) => {}
            Ok(false) => {
                debug!(path = %entry_path(&state.stack, name).display(), "Not on btrfs, skipping");
                return Ok(Admission::Skipped);
            }
            Err(e) => return Ok(report(&state.stack, name, "statfs", &e)),
        }

        if stat.kind == NodeKind::Other {
            return Ok(Admission::Skipped);
        }

        let node = match self.fs.reopen(&probe) {
            Ok(node) => node,
            Err(e) => return Ok(report(&state.stack, name, "reopen", &e)),
        };
        drop(probe);

        let is_dir = stat.kind == NodeKind::Directory;

        if is_dir
            && state
                .stack
                .iter_top_down()
                .any(|node| node.dev == stat.dev && node.inode == stat.inode)
        {
            error!(path = %entry_path(&state.stack, name).display(), "Filesystem loop detected");
            state.summary.loops += 1;
            return Ok(Admission::Failed);
        }

        if state.stack.is_empty() && state.fsid.is_none() {
            match self.fs.fsid(&node) {
                Ok(fsid) => {
                    debug!(fsid = %fsid, "Captured filesystem identity");
                    state.fsid = Some(fsid);
                }
                Err(e) => return Ok(report(&state.stack, name, "fs info", &e)),
            }
        }

        let new_device = state.stack.top().map_or(true, |parent| parent.dev != stat.dev);

        if is_dir && new_device && !state.stack.is_empty() {
            if stat.inode == BTRFS_EMPTY_SUBVOL_DIR_OBJECTID {
                debug!(path = %entry_path(&state.stack, name).display(), "Empty subvolume placeholder, skipping");
                return Ok(Admission::Skipped);
            }

            match self.fs.fsid(&node) {
                Ok(fsid) if Some(fsid) == state.fsid => {}
                Ok(fsid) => {
                    debug!(
                        path = %entry_path(&state.stack, name).display(),
                        fsid = %fsid,
                        "Different filesystem, skipping"
                    );
                    return Ok(Admission::Skipped);
                }
                Err(e) => return Ok(report(&state.stack, name, "fs info", &e)),
            }
        }

        // A failed defragment still descends into the directory
        let mut outcome = Admission::Done;
        if stat.kind == NodeKind::Regular || new_device {
            let defragmented = match self.fs.defragment(&node) {
                Ok(()) => true,
                Err(e) if is_read_only(&e) => {
                    debug!(path = %entry_path(&state.stack, name).display(), "Read-only, not defragmented");
                    true
                }
                Err(e) => {
                    outcome = report(&state.stack, name, "defragment", &e);
                    false
                }
            };
            if defragmented && is_dir {
                state.summary.subvolumes += 1;
            } else if defragmented {
                state.summary.files += 1;
            }
        }

        if !is_dir {
            return Ok(outcome);
        }

        let stream = match self.fs.open_stream(node) {
            Ok(stream) => stream,
            Err(e) => return Ok(report(&state.stack, name, "open directory", &e)),
        };

        let name = if state.stack.is_empty() {
            strip_trailing_slashes(name)
        } else {
            name.to_os_string()
        };
        state.stack.push(TraversalNode {
            dev: stat.dev,
            inode: stat.inode,
            name,
            stream,
        })?;
        state.summary.directories += 1;

        self.render(state);
        Ok(outcome)
    }

    fn render(&self, state: &mut WalkState<F::Stream>) {
        let Some(reporter) = &self.reporter else {
            return;
        };
        let now = Instant::now();
        if state
            .last_render
            .is_some_and(|last| now.duration_since(last) < PROGRESS_THROTTLE)
        {
            return;
        }
        state.last_render = Some(now);
        reporter.set_status(&current_path(&state.stack).display().to_string());
    }
}

/// Skip dot entries and entries the listing already reports as neither
/// directory nor regular file
fn wanted(entry: &DirEntry) -> bool {
    !entry.is_dot() && entry.hint != EntryHint::Other
}

fn report<S>(stack: &TraversalStack<TraversalNode<S>>, name: &OsStr, what: &str, err: &io::Error) -> Admission {
    error!(path = %entry_path(stack, name).display(), error = %err, "Failed to {what}");
    Admission::Failed
}

/// Full path of the directory on top of the stack
fn current_path<S>(stack: &TraversalStack<TraversalNode<S>>) -> PathBuf {
    stack.iter_bottom_up().map(|node| node.name.as_os_str()).collect()
}

fn entry_path<S>(stack: &TraversalStack<TraversalNode<S>>, name: &OsStr) -> PathBuf {
    let mut path = current_path(stack);
    path.push(name);
    path
}

/// Remove trailing `/` from a root path, keeping `/` itself
fn strip_trailing_slashes(name: &OsStr) -> OsString {
    let bytes = name.as_bytes();
    let mut end = bytes.len();
    while end > 1 && bytes[end - 1] == b'/' {
        end -= 1;
    }
    OsStr::from_bytes(&bytes[..end]).to_os_string()
}
