//! Balance: relocate nearly empty chunks
//!
//! A single supervised job. Only chunks whose usage is below the thresholds
//! are relocated, which compacts free space without rewriting the pool.

use super::{header, supervise};
use crate::btrfs::ffi::{
    btrfs_balance_args, btrfs_ioctl_balance_args, BTRFS_BALANCE_ARGS_USAGE, BTRFS_BALANCE_DATA,
    BTRFS_BALANCE_METADATA, BTRFS_BALANCE_STATE_CANCEL_REQ, BTRFS_BALANCE_SYSTEM,
};
use crate::btrfs::{FsHandle, MountTarget};
use crate::config::MaintainConfig;
use crate::progress::UNKNOWN_PROGRESS;
use crate::supervisor::{JobStatus, Operation, Progress, Sample, SupervisorReport};
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Data chunks less than this percent full are relocated
pub const DATA_USAGE_THRESHOLD: u64 = 30;

/// Metadata chunks less than this percent full are relocated
pub const METADATA_USAGE_THRESHOLD: u64 = 10;

/// System chunks less than this percent full are relocated
pub const SYSTEM_USAGE_THRESHOLD: u64 = METADATA_USAGE_THRESHOLD;

fn usage_filter(threshold: u64) -> btrfs_balance_args {
    btrfs_balance_args {
        flags: BTRFS_BALANCE_ARGS_USAGE,
        usage: threshold,
        ..Default::default()
    }
}

/// Balance arguments for all three chunk types with usage filters
pub fn balance_args() -> btrfs_ioctl_balance_args {
    let mut args = btrfs_ioctl_balance_args::zeroed();
    args.flags = BTRFS_BALANCE_DATA | BTRFS_BALANCE_METADATA | BTRFS_BALANCE_SYSTEM;
    args.data = usage_filter(DATA_USAGE_THRESHOLD);
    args.meta = usage_filter(METADATA_USAGE_THRESHOLD);
    args.sys = usage_filter(SYSTEM_USAGE_THRESHOLD);
    args
}

/// Balance operation on one filesystem
pub struct BalanceOp {
    handle: FsHandle,
}

impl BalanceOp {
    pub fn new(handle: FsHandle) -> Self {
        Self { handle }
    }
}

impl Operation for BalanceOp {
    type Job = btrfs_ioctl_balance_args;

    fn name(&self) -> &'static str {
        "balance"
    }

    fn execute(&self, job: &mut btrfs_ioctl_balance_args) -> io::Result<()> {
        self.handle.balance(job)
    }

    fn cancel(&self) -> io::Result<()> {
        self.handle.balance_cancel()
    }

    fn query_progress(&self, _job: &btrfs_ioctl_balance_args) -> io::Result<Progress> {
        let stat = self.handle.balance_progress()?;
        Ok(Progress::new(stat.considered, stat.expected))
    }

    fn final_progress(&self, job: &btrfs_ioctl_balance_args) -> Progress {
        Progress::new(job.stat.considered, job.stat.expected)
    }
}

/// Result of a finished balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceOutcome {
    /// Chunks relocated out of chunks considered
    Relocated { completed: u64, considered: u64 },

    /// The kernel finished after a cancel request
    CancelRequested,

    /// Cancelled at our request
    Cancelled,

    Failed,
}

impl BalanceOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Relocated { .. } | Self::CancelRequested)
    }
}

/// Check the balance result
pub fn evaluate(mountpoint: &Path, report: &SupervisorReport<btrfs_ioctl_balance_args>) -> BalanceOutcome {
    let Some(job_report) = report.jobs.first() else {
        return BalanceOutcome::Failed;
    };
    let args = &job_report.job;

    match report.status(job_report) {
        JobStatus::Succeeded if args.state & BTRFS_BALANCE_STATE_CANCEL_REQ != 0 => {
            BalanceOutcome::CancelRequested
        }
        JobStatus::Succeeded => {
            debug!(
                mountpoint = %mountpoint.display(),
                "Relocated {} / {} chunks",
                args.stat.completed,
                args.stat.considered
            );
            BalanceOutcome::Relocated {
                completed: args.stat.completed,
                considered: args.stat.considered,
            }
        }
        JobStatus::Cancelled => BalanceOutcome::Cancelled,
        JobStatus::Failed(e) => {
            error!(mountpoint = %mountpoint.display(), error = %e, "Balance failed");
            BalanceOutcome::Failed
        }
    }
}

fn render(samples: &[Sample<'_, btrfs_ioctl_balance_args>]) -> String {
    match samples.first().and_then(|s| s.progress) {
        Some(progress) => format!(
            "{} / {} considered = {:.1}%",
            progress.observed,
            progress.expected,
            progress.percent()
        ),
        None => UNKNOWN_PROGRESS.to_string(),
    }
}

/// Balance the filesystem mounted at `mountpoint`
pub fn run(mountpoint: &Path, config: &MaintainConfig) -> bool {
    header(config, "Balance", mountpoint);

    let target = match MountTarget::open(mountpoint) {
        Ok(target) => target,
        Err(e) => {
            error!(error = %e, "Cannot balance");
            return false;
        }
    };

    let result = supervise(
        BalanceOp::new(target.handle().clone()),
        vec![balance_args()],
        config.sampling(),
        render,
        |report| evaluate(mountpoint, report).is_ok(),
    );

    match result {
        Ok(ok) => ok,
        Err(e) => {
            error!(mountpoint = %mountpoint.display(), error = %e, "Balance could not run");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::JobReport;

    fn report(job: btrfs_ioctl_balance_args, result: io::Result<()>, cancel_requested: bool) -> SupervisorReport<btrfs_ioctl_balance_args> {
        SupervisorReport {
            interrupted: cancel_requested,
            cancel_requested,
            jobs: vec![JobReport { job, result }],
        }
    }

    #[test]
    fn test_default_filter() {
        let args = balance_args();
        assert_eq!(
            args.flags,
            BTRFS_BALANCE_DATA | BTRFS_BALANCE_METADATA | BTRFS_BALANCE_SYSTEM
        );
        assert_eq!(args.data.flags, BTRFS_BALANCE_ARGS_USAGE);
        assert_eq!(args.data.usage, 30);
        assert_eq!(args.meta.usage, 10);
        assert_eq!(args.sys.usage, 10);
        assert_eq!(args.state, 0);
        assert_eq!(args.stat.expected, 0);
    }

    #[test]
    fn test_nothing_to_relocate_is_success() {
        let outcome = evaluate(Path::new("/mnt/pool"), &report(balance_args(), Ok(()), false));
        assert_eq!(
            outcome,
            BalanceOutcome::Relocated {
                completed: 0,
                considered: 0
            }
        );
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_relocated_counts() {
        let mut args = balance_args();
        args.stat.considered = 12;
        args.stat.completed = 4;

        let outcome = evaluate(Path::new("/"), &report(args, Ok(()), false));
        assert_eq!(
            outcome,
            BalanceOutcome::Relocated {
                completed: 4,
                considered: 12
            }
        );
    }

    #[test]
    fn test_cancel_requested_state() {
        let mut args = balance_args();
        args.state = BTRFS_BALANCE_STATE_CANCEL_REQ;
        let outcome = evaluate(Path::new("/"), &report(args, Ok(()), false));
        assert_eq!(outcome, BalanceOutcome::CancelRequested);
    }

    #[test]
    fn test_cancelled_not_ok() {
        let err = io::Error::from_raw_os_error(libc::ECANCELED);
        let outcome = evaluate(Path::new("/"), &report(balance_args(), Err(err), true));
        assert_eq!(outcome, BalanceOutcome::Cancelled);
        assert!(!outcome.is_ok());
    }

    #[test]
    fn test_kernel_failure() {
        let err = io::Error::from_raw_os_error(libc::ENOSPC);
        let outcome = evaluate(Path::new("/"), &report(balance_args(), Err(err), false));
        assert_eq!(outcome, BalanceOutcome::Failed);
    }

    #[test]
    fn test_render() {
        let mut args = balance_args();
        args.stat.expected = 8;
        args.stat.considered = 2;
        let samples = [Sample {
            job: &args,
            progress: Some(Progress::new(2, 8)),
        }];
        assert_eq!(render(&samples), "2 / 8 considered = 25.0%");

        let unknown = [Sample {
            job: &args,
            progress: None,
        }];
        assert_eq!(render(&unknown), "???");
    }
}
