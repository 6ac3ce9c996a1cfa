//! Filesystem access used by the tree walker
//!
//! [`TreeFs`] is the seam between the walk algorithm and the kernel. The
//! btrfs implementation follows the race-free open pattern: every entry is
//! first opened with `O_PATH | O_NOFOLLOW` relative to its parent's
//! descriptor, identified through that handle, and only then re-opened for
//! reading through `/proc/self/fd`. A rename between listing and opening can
//! therefore never make the walker act on a different object than the one it
//! identified.

use crate::btrfs::{self, DeviceNumber, Fsid};
use nix::dir::{Dir, OwningIter, Type};
use nix::sys::statfs::{fstatfs, BTRFS_SUPER_MAGIC};
use std::ffi::{CString, OsStr, OsString};
use std::fs::{File, OpenOptions};
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;

/// Extent size below which the kernel rewrites an extent while defragmenting
pub const EXTENT_THRESHOLD: u32 = 32 * 1024 * 1024;

/// Object type of an opened node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    Regular,
    Other,
}

/// Identity of an opened node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStat {
    pub kind: NodeKind,
    pub dev: DeviceNumber,
    pub inode: u64,
}

/// Type reported by the directory listing, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryHint {
    Directory,
    Regular,
    Other,
    Unknown,
}

/// One directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub hint: EntryHint,
}

impl DirEntry {
    pub fn new(name: impl Into<OsString>, hint: EntryHint) -> Self {
        Self {
            name: name.into(),
            hint,
        }
    }

    /// `.` or `..`
    pub fn is_dot(&self) -> bool {
        let bytes = self.name.as_bytes();
        bytes == b"." || bytes == b".."
    }
}

/// Operations the tree walker needs from a filesystem
pub trait TreeFs {
    /// Path-only handle used to identify an entry
    type Probe;

    /// Full read-only handle on an admitted node
    type Node;

    /// Open entry stream of an admitted directory
    type Stream;

    /// Open `name` without following symlinks, relative to the directory
    /// behind `parent` (or the working directory for the walk root)
    fn open_probe(&self, parent: Option<&Self::Stream>, name: &OsStr) -> io::Result<Self::Probe>;

    /// Type, device number and inode of the probed entry
    fn stat(&self, probe: &Self::Probe) -> io::Result<NodeStat>;

    /// Whether the probed entry lives on a btrfs filesystem
    fn is_target_fs(&self, probe: &Self::Probe) -> io::Result<bool>;

    /// Re-open the probed entry for reading
    fn reopen(&self, probe: &Self::Probe) -> io::Result<Self::Node>;

    /// Identity of the pool holding the node
    fn fsid(&self, node: &Self::Node) -> io::Result<Fsid>;

    /// Defragment a file or a subvolume root
    fn defragment(&self, node: &Self::Node) -> io::Result<()>;

    /// Turn a directory node into an entry stream
    fn open_stream(&self, node: Self::Node) -> io::Result<Self::Stream>;

    /// Next entry, `None` once exhausted
    fn next_entry(&self, stream: &mut Self::Stream) -> Option<io::Result<DirEntry>>;
}

/// [`TreeFs`] over the real kernel interfaces
#[derive(Debug, Clone, Copy, Default)]
pub struct BtrfsTree;

/// Open directory stream
pub struct BtrfsStream {
    /// Descriptor owned by `entries`, used as the `openat` base
    fd: RawFd,
    entries: OwningIter,
}

impl TreeFs for BtrfsTree {
    type Probe = OwnedFd;
    type Node = File;
    type Stream = BtrfsStream;

    fn open_probe(&self, parent: Option<&BtrfsStream>, name: &OsStr) -> io::Result<OwnedFd> {
        let dirfd = parent.map_or(libc::AT_FDCWD, |stream| stream.fd);
        let name = CString::new(name.as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let flags = libc::O_PATH | libc::O_NOFOLLOW | libc::O_NOATIME | libc::O_CLOEXEC;

        let fd = unsafe { libc::openat(dirfd, name.as_ptr(), flags) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn stat(&self, probe: &OwnedFd) -> io::Result<NodeStat> {
        let wanted = libc::STATX_TYPE | libc::STATX_INO;
        let mut buf = MaybeUninit::<libc::statx>::zeroed();

        let ret = unsafe {
            libc::statx(
                probe.as_raw_fd(),
                c"".as_ptr(),
                libc::AT_EMPTY_PATH,
                wanted,
                buf.as_mut_ptr(),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        let stx = unsafe { buf.assume_init() };
        if stx.stx_mask & wanted != wanted {
            return Err(io::Error::other(format!(
                "statx returned mask {:#x}, wanted {:#x}",
                stx.stx_mask, wanted
            )));
        }

        let kind = match u32::from(stx.stx_mode) & libc::S_IFMT {
            libc::S_IFDIR => NodeKind::Directory,
            libc::S_IFREG => NodeKind::Regular,
            _ => NodeKind::Other,
        };

        Ok(NodeStat {
            kind,
            dev: DeviceNumber::new(stx.stx_dev_major, stx.stx_dev_minor),
            inode: stx.stx_ino,
        })
    }

    fn is_target_fs(&self, probe: &OwnedFd) -> io::Result<bool> {
        let stat = fstatfs(probe).map_err(io::Error::from)?;
        Ok(stat.filesystem_type() == BTRFS_SUPER_MAGIC)
    }

    fn reopen(&self, probe: &OwnedFd) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOATIME | libc::O_CLOEXEC)
            .open(format!("/proc/self/fd/{}", probe.as_raw_fd()))
    }

    fn fsid(&self, node: &File) -> io::Result<Fsid> {
        btrfs::fsid(node)
    }

    fn defragment(&self, node: &File) -> io::Result<()> {
        btrfs::defrag_range(node, EXTENT_THRESHOLD)
    }

    fn open_stream(&self, node: File) -> io::Result<BtrfsStream> {
        let fd = node.as_raw_fd();
        let dir = Dir::from(node).map_err(io::Error::from)?;
        Ok(BtrfsStream {
            fd,
            entries: dir.into_iter(),
        })
    }

    fn next_entry(&self, stream: &mut BtrfsStream) -> Option<io::Result<DirEntry>> {
        let entry = stream.entries.next()?;
        Some(entry.map_err(io::Error::from).map(|entry| {
            let hint = match entry.file_type() {
                Some(Type::Directory) => EntryHint::Directory,
                Some(Type::File) => EntryHint::Regular,
                Some(_) => EntryHint::Other,
                None => EntryHint::Unknown,
            };
            DirEntry::new(OsStr::from_bytes(entry.file_name().to_bytes()), hint)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::{symlink, MetadataExt};

    fn collect_names(tree: &BtrfsTree, stream: &mut BtrfsStream) -> Vec<(OsString, EntryHint)> {
        let mut names = Vec::new();
        while let Some(entry) = tree.next_entry(stream) {
            let entry = entry.unwrap();
            if !entry.is_dot() {
                names.push((entry.name, entry.hint));
            }
        }
        names.sort_by(|a, b| a.0.cmp(&b.0));
        names
    }

    #[test]
    fn test_probe_stat_matches_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("data.bin");
        fs::write(&file_path, b"payload").unwrap();

        let tree = BtrfsTree;
        let probe = tree.open_probe(None, file_path.as_os_str()).unwrap();
        let stat = tree.stat(&probe).unwrap();
        let meta = fs::metadata(&file_path).unwrap();

        assert_eq!(stat.kind, NodeKind::Regular);
        assert_eq!(stat.inode, meta.ino());
    }

    #[test]
    fn test_probe_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

        let tree = BtrfsTree;
        let probe = tree.open_probe(None, dir.path().join("link").as_os_str()).unwrap();
        assert_eq!(tree.stat(&probe).unwrap().kind, NodeKind::Other);
    }

    #[test]
    fn test_missing_entry_is_enoent() {
        let dir = tempfile::tempdir().unwrap();
        let err = BtrfsTree
            .open_probe(None, dir.path().join("gone").as_os_str())
            .unwrap_err();
        assert!(crate::error::is_vanished(&err));
    }

    #[test]
    fn test_stream_lists_and_opens_children() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("file"), b"x").unwrap();

        let tree = BtrfsTree;
        let probe = tree.open_probe(None, dir.path().as_os_str()).unwrap();
        assert_eq!(tree.stat(&probe).unwrap().kind, NodeKind::Directory);
        let node = tree.reopen(&probe).unwrap();
        let mut stream = tree.open_stream(node).unwrap();

        // Relative open through the stream's descriptor
        let child = tree.open_probe(Some(&stream), OsStr::new("sub")).unwrap();
        assert_eq!(tree.stat(&child).unwrap().kind, NodeKind::Directory);

        let names = collect_names(&tree, &mut stream);
        let names: Vec<&OsStr> = names.iter().map(|(name, _)| name.as_os_str()).collect();
        assert_eq!(names, vec![OsStr::new("file"), OsStr::new("sub")]);
    }

    #[test]
    fn test_dot_entries() {
        assert!(DirEntry::new(".", EntryHint::Directory).is_dot());
        assert!(DirEntry::new("..", EntryHint::Directory).is_dot());
        assert!(!DirEntry::new("...", EntryHint::Regular).is_dot());
    }
}
