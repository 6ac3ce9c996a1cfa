//! Maintenance actions and the per-mountpoint outer loop
//!
//! Actions run in a fixed order, each over every mountpoint: scrub, device
//! statistics, defragment, balance, trim. A failure of one action on one
//! mountpoint never stops the others; the run succeeds only if all of them
//! did.

pub mod balance;
pub mod defrag;
pub mod devstats;
pub mod scrub;
pub mod trim;

use crate::config::MaintainConfig;
use crate::error::Result;
use crate::progress::{print_header, ProgressReporter};
use crate::supervisor::{Operation, Sample, SignalBridge, Supervisor, SupervisorReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Run every enabled action on every mountpoint
///
/// Returns `true` only if every action succeeded on every mountpoint.
pub fn run_all(config: &MaintainConfig) -> bool {
    let mut ok = true;

    if config.actions.scrub {
        ok &= for_each_mountpoint(config, "scrub", scrub::run);
    }
    ok &= for_each_mountpoint(config, "device statistics", devstats::run);
    if config.actions.defragment {
        ok &= for_each_mountpoint(config, "defragment", defrag::run);
    }
    if config.actions.balance {
        ok &= for_each_mountpoint(config, "balance", balance::run);
    }
    if config.actions.trim {
        ok &= for_each_mountpoint(config, "trim", trim::run);
    }

    ok
}

fn for_each_mountpoint(
    config: &MaintainConfig,
    action: &str,
    run: fn(&Path, &MaintainConfig) -> bool,
) -> bool {
    let mut ok = true;
    for mountpoint in &config.mountpoints {
        let succeeded = run(mountpoint, config);
        if !succeeded {
            info!(action, mountpoint = %mountpoint.display(), "Action did not complete cleanly");
        }
        ok &= succeeded;
    }
    ok
}

/// Print the action header in verbose mode
pub(crate) fn header(config: &MaintainConfig, action: &str, mountpoint: &Path) {
    if config.verbose {
        print_header(action, mountpoint);
    }
}

/// Run `op` over `jobs` under a signal bridge and evaluate the report
///
/// Termination signals stay blocked until `evaluate` has returned, so a
/// signal that interrupted the operation is delivered only after the
/// results have been reported.
pub(crate) fn supervise<O, R, E>(
    op: O,
    jobs: Vec<O::Job>,
    sampling: Option<Duration>,
    render: R,
    evaluate: E,
) -> Result<bool>
where
    O: Operation,
    R: Fn(&[Sample<'_, O::Job>]) -> String,
    E: FnOnce(&SupervisorReport<O::Job>) -> bool,
{
    let bridge = SignalBridge::install()?;

    // Threads spawned from here on inherit the blocked mask
    let reporter = sampling.map(|_| ProgressReporter::new());
    let mut supervisor = Supervisor::start(Arc::new(op), jobs)?;

    supervisor.monitor(bridge.requests(), sampling, |samples| {
        if let Some(reporter) = &reporter {
            reporter.set_status(&render(samples));
        }
    });

    let report = supervisor.finish();
    if let Some(reporter) = reporter {
        reporter.finish_and_clear();
    }
    if report.interrupted {
        error!("Interrupted by termination signal");
    }

    let ok = evaluate(&report) && !report.interrupted;
    drop(bridge);
    Ok(ok)
}
