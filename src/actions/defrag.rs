//! Defragment: walk the pool and defragment files and subvolume roots

use super::header;
use crate::config::MaintainConfig;
use crate::progress::ProgressReporter;
use crate::walker::{BtrfsTree, TreeFs, TreeWalker};
use std::path::Path;
use tracing::error;

/// Walk `root` on `fs` and report whether every node was handled cleanly
pub fn defragment<F: TreeFs>(fs: F, root: &Path, reporter: Option<ProgressReporter>) -> bool {
    let mut walker = TreeWalker::new(fs);
    if let Some(reporter) = reporter.clone() {
        walker = walker.with_progress(reporter);
    }

    let result = walker.walk(root);

    if let Some(reporter) = reporter {
        reporter.finish_and_clear();
    }

    match result {
        Ok(summary) => summary.is_clean(),
        Err(e) => {
            error!(root = %root.display(), error = %e, "Defragmentation aborted");
            false
        }
    }
}

/// Defragment the filesystem mounted at `mountpoint`
pub fn run(mountpoint: &Path, config: &MaintainConfig) -> bool {
    header(config, "Defragment", mountpoint);
    let reporter = config.verbose.then(ProgressReporter::new);
    defragment(BtrfsTree, mountpoint, reporter)
}
