//! Scrub: verify every checksum on every device of the pool
//!
//! One supervised job per device, all running concurrently. After the run,
//! each device's counters are checked against [`SCRUB_COUNTERS`].

use super::{header, supervise};
use crate::btrfs::ffi::btrfs_ioctl_scrub_args;
use crate::btrfs::{devices, DeviceDescriptor, FsHandle, MountTarget, ScrubProgress};
use crate::config::MaintainConfig;
use crate::progress::format_device_progress;
use crate::supervisor::{JobStatus, Operation, Progress, Sample, SupervisorReport};
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Counter accessor and label
pub type ScrubCounter = (fn(&ScrubProgress) -> u64, &'static str);

/// Counters that fail the scrub when nonzero
pub static SCRUB_COUNTERS: [ScrubCounter; 8] = [
    (|p| p.read_errors, "read"),
    (|p| p.csum_errors, "checksum"),
    (|p| p.verify_errors, "verify"),
    (|p| p.super_errors, "superblock"),
    (|p| p.malloc_errors, "allocation"),
    (|p| p.uncorrectable_errors, "uncorrectable"),
    (|p| p.corrected_errors, "corrected"),
    (|p| p.unverified_errors, "unverified"),
];

/// Scrub of one device
#[derive(Debug, Clone)]
pub struct ScrubJob {
    pub devid: u64,

    /// Bytes allocated on the device, the progress denominator
    pub bytes_used: u64,

    pub args: btrfs_ioctl_scrub_args,
}

impl ScrubJob {
    pub fn new(device: &DeviceDescriptor) -> Self {
        Self {
            devid: device.devid,
            bytes_used: device.bytes_used,
            args: btrfs_ioctl_scrub_args::for_device(device.devid),
        }
    }

    /// Progress recorded in the job's arguments
    pub fn progress(&self) -> Progress {
        progress_of(&self.args.progress, self.bytes_used)
    }
}

fn progress_of(counters: &ScrubProgress, bytes_used: u64) -> Progress {
    let errors = SCRUB_COUNTERS
        .iter()
        .fold(0u64, |sum, &(counter, _)| sum.saturating_add(counter(counters)));
    Progress::new(counters.bytes_scrubbed(), bytes_used).with_errors(errors)
}

/// Scrub operation on one filesystem
pub struct ScrubOp {
    handle: FsHandle,
}

impl ScrubOp {
    pub fn new(handle: FsHandle) -> Self {
        Self { handle }
    }
}

impl Operation for ScrubOp {
    type Job = ScrubJob;

    fn name(&self) -> &'static str {
        "scrub"
    }

    fn execute(&self, job: &mut ScrubJob) -> io::Result<()> {
        self.handle.scrub(&mut job.args)
    }

    fn cancel(&self) -> io::Result<()> {
        self.handle.scrub_cancel()
    }

    fn query_progress(&self, job: &ScrubJob) -> io::Result<Progress> {
        let counters = self.handle.scrub_progress(job.devid)?;
        Ok(progress_of(&counters, job.bytes_used))
    }

    fn final_progress(&self, job: &ScrubJob) -> Progress {
        job.progress()
    }
}

/// A nonzero error counter on one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubFinding {
    pub devid: u64,
    pub label: &'static str,
    pub count: u64,
}

/// Result of checking a finished scrub
#[derive(Debug, Default)]
pub struct ScrubSummary {
    /// Nonzero counters, by device in job order
    pub findings: Vec<ScrubFinding>,

    /// Devices whose scrub call failed
    pub failed_devices: Vec<u64>,

    /// Devices whose scrub was cancelled at our request
    pub cancelled_devices: Vec<u64>,
}

impl ScrubSummary {
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty() && self.failed_devices.is_empty() && self.cancelled_devices.is_empty()
    }
}

/// Check every device's result and counters
pub fn evaluate(mountpoint: &Path, report: &SupervisorReport<ScrubJob>) -> ScrubSummary {
    let mut summary = ScrubSummary::default();

    for job_report in &report.jobs {
        let job = &job_report.job;
        match report.status(job_report) {
            JobStatus::Succeeded => {
                check_counters(mountpoint, job, &mut summary);
            }
            JobStatus::Cancelled => {
                debug!(mountpoint = %mountpoint.display(), devid = job.devid, "Scrub cancelled");
                summary.cancelled_devices.push(job.devid);
            }
            JobStatus::Failed(e) => {
                error!(mountpoint = %mountpoint.display(), devid = job.devid, error = %e, "Scrub failed");
                summary.failed_devices.push(job.devid);
            }
        }
    }

    summary
}

fn check_counters(mountpoint: &Path, job: &ScrubJob, summary: &mut ScrubSummary) {
    let counters = &job.args.progress;

    for &(counter, label) in SCRUB_COUNTERS.iter() {
        let count = counter(counters);
        if count != 0 {
            error!(
                mountpoint = %mountpoint.display(),
                devid = job.devid,
                count,
                "Scrub detected {label} errors"
            );
            summary.findings.push(ScrubFinding {
                devid: job.devid,
                label,
                count,
            });
        } else {
            debug!(mountpoint = %mountpoint.display(), devid = job.devid, "Scrub detected 0 {label} errors");
        }
    }

    if counters.no_csum != 0 {
        debug!(
            mountpoint = %mountpoint.display(),
            devid = job.devid,
            blocks = counters.no_csum,
            "Scrub skipped blocks without checksum"
        );
    }
    if counters.csum_discards != 0 {
        debug!(
            mountpoint = %mountpoint.display(),
            devid = job.devid,
            checksums = counters.csum_discards,
            "Scrub ignored checksums without data"
        );
    }
}

fn render(samples: &[Sample<'_, ScrubJob>]) -> String {
    format_device_progress(samples.iter().map(|s| (s.job.devid, s.progress)))
}

/// Scrub every device of the filesystem mounted at `mountpoint`
pub fn run(mountpoint: &Path, config: &MaintainConfig) -> bool {
    header(config, "Scrub", mountpoint);

    let target = match MountTarget::open(mountpoint) {
        Ok(target) => target,
        Err(e) => {
            error!(error = %e, "Cannot scrub");
            return false;
        }
    };

    let devices = match devices::enumerate(target.handle()) {
        Ok(devices) => devices,
        Err(e) => {
            error!(mountpoint = %mountpoint.display(), error = %e, "Device enumeration failed");
            return false;
        }
    };

    let jobs: Vec<ScrubJob> = devices.iter().map(ScrubJob::new).collect();
    debug!(mountpoint = %mountpoint.display(), devices = jobs.len(), "Starting scrub");

    let result = supervise(
        ScrubOp::new(target.handle().clone()),
        jobs,
        config.sampling(),
        render,
        |report| evaluate(mountpoint, report).is_ok(),
    );

    match result {
        Ok(ok) => ok,
        Err(e) => {
            error!(mountpoint = %mountpoint.display(), error = %e, "Scrub could not run");
            false
        }
    }
}
