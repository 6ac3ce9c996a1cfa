//! Long-running operation supervisor
//!
//! Scrub and balance share one pattern: a blocking, uninterruptible ioctl per
//! job, a supervising thread that waits for completions or a termination
//! signal, optional progress sampling, cancellation, and an unconditional
//! join of every worker.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────────────────────┐
//!                │          Supervisor              │
//!                │  select! over:                   │
//!                │   - SignalBridge requests        │
//!                │   - CompletionNotifier           │
//!                │   - progress tick                │
//!                └────────────────┬─────────────────┘
//!                                 │ spawn / cancel / join
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 0 │             │  Worker 1 │             │  Worker N │
//! │  ioctl()  │             │  ioctl()  │             │  ioctl()  │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └──────── one Completion each ──────────────────────┘
//! ```

mod coordinator;
pub mod notifier;
pub mod signals;
mod worker;

pub use coordinator::{JobReport, JobStatus, MonitorOutcome, Supervisor, SupervisorReport};
pub use notifier::{Completion, CompletionNotifier, CompletionPoster};
pub use signals::{SignalBridge, TerminationRequest};
pub use worker::Worker;

use std::io;

/// Percentage reported when the expected total is unknown (zero)
pub const INDETERMINATE_PERCENT: f64 = 50.0;

/// A blocking kernel maintenance operation run by the [`Supervisor`]
///
/// One value is shared by all workers; each worker owns one `Job` and hands
/// it back, as the kernel left it, through its completion.
pub trait Operation: Send + Sync + 'static {
    /// Per-worker arguments
    type Job: Clone + Send + 'static;

    /// Short name for threads and log messages
    fn name(&self) -> &'static str;

    /// Issue the blocking call for one job
    fn execute(&self, job: &mut Self::Job) -> io::Result<()>;

    /// Ask the kernel to cancel every in-flight job of this operation
    fn cancel(&self) -> io::Result<()>;

    /// Query the kernel for the progress of a job still running
    fn query_progress(&self, job: &Self::Job) -> io::Result<Progress>;

    /// Progress recorded in the arguments of a finished job
    fn final_progress(&self, job: &Self::Job) -> Progress;
}

/// Progress counters of one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Units processed so far
    pub observed: u64,

    /// Units expected in total (zero if unknown)
    pub expected: u64,

    /// Errors found so far
    pub errors: u64,
}

impl Progress {
    pub fn new(observed: u64, expected: u64) -> Self {
        Self {
            observed,
            expected,
            errors: 0,
        }
    }

    pub fn with_errors(mut self, errors: u64) -> Self {
        self.errors = errors;
        self
    }

    /// Completion percentage, clamped to 100
    pub fn percent(&self) -> f64 {
        if self.expected == 0 {
            return INDETERMINATE_PERCENT;
        }
        let permille = self.observed.min(self.expected) as u128 * 1000 / self.expected as u128;
        permille as f64 / 10.0
    }

    /// Whether `percent` is the placeholder rather than a measurement
    pub fn is_indeterminate(&self) -> bool {
        self.expected == 0
    }
}

/// Progress of one job at a sampling instant
#[derive(Debug)]
pub struct Sample<'a, J> {
    pub job: &'a J,

    /// `None` if the kernel could not be queried (usually because the job
    /// finished a moment ago and its completion is not yet drained)
    pub progress: Option<Progress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(Progress::new(0, 200).percent(), 0.0);
        assert_eq!(Progress::new(50, 200).percent(), 25.0);
        assert_eq!(Progress::new(1, 3).percent(), 33.3);
        assert_eq!(Progress::new(200, 200).percent(), 100.0);
    }

    #[test]
    fn test_percent_clamps_overshoot() {
        assert_eq!(Progress::new(500, 200).percent(), 100.0);
    }

    #[test]
    fn test_percent_indeterminate() {
        let progress = Progress::new(12345, 0);
        assert!(progress.is_indeterminate());
        assert_eq!(progress.percent(), INDETERMINATE_PERCENT);
    }

    #[test]
    fn test_percent_huge_values() {
        assert_eq!(Progress::new(u64::MAX / 2, u64::MAX).percent(), 49.9);
    }
}
