//! Supervisor - orchestrates the workers of one maintenance operation
//!
//! The supervisor is responsible for:
//! - Spawning one worker per job (and cleaning up if spawning fails)
//! - Waiting for completions or a termination request
//! - Progress sampling
//! - Cancelling unfinished jobs
//! - Joining every worker and collecting per-job results

use super::notifier::{Completion, CompletionNotifier};
use super::signals::TerminationRequest;
use super::worker::Worker;
use super::{Operation, Sample};
use crate::error::{is_cancelled, WorkerError};
use crossbeam_channel::{never, select, tick, Receiver};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How monitoring ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Every job reported completion
    Completed,

    /// A termination request arrived first
    Interrupted,
}

/// Per-job bookkeeping
struct JobSlot<J> {
    /// Arguments the job was started with
    initial: J,

    /// Worker thread, until joined
    worker: Option<Worker>,

    /// Completion, once drained from the notifier
    finished: Option<Completion<J>>,
}

/// Coordinates the workers of one operation
pub struct Supervisor<O: Operation> {
    /// Shared operation
    op: Arc<O>,

    /// Jobs in start order
    jobs: Vec<JobSlot<O::Job>>,

    /// Completion channel
    notifier: CompletionNotifier<O::Job>,

    /// Jobs not yet reported complete
    remaining: usize,

    /// Whether a termination request ended monitoring
    interrupted: bool,

    /// Whether a cancel was sent to the kernel
    cancel_requested: bool,
}

impl<O: Operation> Supervisor<O> {
    /// Spawn one worker per job
    ///
    /// If any spawn fails, the operation is cancelled, every worker already
    /// started is joined, and the spawn error is returned.
    pub fn start(op: Arc<O>, jobs: Vec<O::Job>) -> Result<Self, WorkerError> {
        Self::start_with(op, jobs, |id, name, body| Worker::spawn(id, name, body))
    }

    fn start_with<S>(op: Arc<O>, jobs: Vec<O::Job>, mut spawn: S) -> Result<Self, WorkerError>
    where
        S: FnMut(usize, String, Box<dyn FnOnce() + Send + 'static>) -> Result<Worker, WorkerError>,
    {
        let notifier = CompletionNotifier::new();
        let mut slots: Vec<JobSlot<O::Job>> = Vec::with_capacity(jobs.len());

        for (index, initial) in jobs.into_iter().enumerate() {
            let poster = notifier.poster(index, initial.clone());
            let worker_op = Arc::clone(&op);
            let mut job = initial.clone();
            let body: Box<dyn FnOnce() + Send + 'static> = Box::new(move || {
                let result = worker_op.execute(&mut job);
                poster.complete(job, result);
            });

            match spawn(index, format!("{}-{}", op.name(), index), body) {
                Ok(worker) => slots.push(JobSlot {
                    initial,
                    worker: Some(worker),
                    finished: None,
                }),
                Err(e) => {
                    error!(operation = op.name(), error = %e, "Failed to start worker");
                    // Best effort: some kernel operations may already be running
                    if let Err(cancel_err) = op.cancel() {
                        debug!(operation = op.name(), error = %cancel_err, "Cancel after spawn failure failed");
                    }
                    for slot in slots {
                        if let Some(worker) = slot.worker {
                            let _ = worker.join();
                        }
                    }
                    return Err(e);
                }
            }
        }

        let remaining = slots.len();
        debug!(operation = op.name(), count = remaining, "Workers spawned");

        Ok(Self {
            op,
            jobs: slots,
            notifier,
            remaining,
            interrupted: false,
            cancel_requested: false,
        })
    }

    /// Number of jobs
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Number of jobs that have not reported completion yet
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Block until every job completes or a termination request arrives
    ///
    /// With an `interval`, `on_sample` is called with the progress of every
    /// job on each tick and after each batch of completions.
    pub fn monitor<F>(
        &mut self,
        requests: &Receiver<TerminationRequest>,
        interval: Option<Duration>,
        mut on_sample: F,
    ) -> MonitorOutcome
    where
        F: FnMut(&[Sample<'_, O::Job>]),
    {
        let ticker = match interval {
            Some(period) => tick(period),
            None => never(),
        };
        let completions = self.notifier.receiver().clone();
        let mut requests = requests.clone();

        while self.remaining > 0 {
            let mut requests_closed = false;

            select! {
                recv(requests) -> msg => match msg {
                    Ok(TerminationRequest) => {
                        info!(operation = self.op.name(), "Termination requested");
                        self.interrupted = true;
                        return MonitorOutcome::Interrupted;
                    }
                    Err(_) => requests_closed = true,
                },
                recv(completions) -> msg => {
                    if let Ok(completion) = msg {
                        self.record(completion);
                    }
                    for completion in self.notifier.drain() {
                        self.record(completion);
                    }
                },
                recv(ticker) -> _ => {},
            }

            if requests_closed {
                warn!(operation = self.op.name(), "Termination request channel closed");
                requests = never();
            }

            if interval.is_some() {
                let samples = self.sample();
                on_sample(&samples);
            }
        }

        MonitorOutcome::Completed
    }

    /// Current progress of every job, in job order
    pub fn sample(&self) -> Vec<Sample<'_, O::Job>> {
        self.jobs
            .iter()
            .map(|slot| match &slot.finished {
                Some(completion) => Sample {
                    job: &completion.job,
                    progress: Some(self.op.final_progress(&completion.job)),
                },
                None => Sample {
                    job: &slot.initial,
                    progress: self.op.query_progress(&slot.initial).ok(),
                },
            })
            .collect()
    }

    fn record(&mut self, completion: Completion<O::Job>) {
        let index = completion.index;
        let Some(slot) = self.jobs.get_mut(index) else {
            warn!(operation = self.op.name(), index, "Completion for unknown job");
            return;
        };

        if slot.finished.is_some() {
            warn!(operation = self.op.name(), index, "Duplicate completion ignored");
            return;
        }

        debug!(operation = self.op.name(), index, ok = completion.result.is_ok(), "Job completed");
        slot.finished = Some(completion);
        self.remaining -= 1;
    }

    /// Cancel unfinished jobs, join every worker, and report
    pub fn finish(mut self) -> SupervisorReport<O::Job> {
        self.shutdown();

        let jobs = std::mem::take(&mut self.jobs)
            .into_iter()
            .map(|slot| match slot.finished {
                Some(completion) => JobReport {
                    job: completion.job,
                    result: completion.result,
                },
                None => JobReport {
                    job: slot.initial,
                    result: Err(io::Error::other("worker never reported completion")),
                },
            })
            .collect();

        SupervisorReport {
            interrupted: self.interrupted,
            cancel_requested: self.cancel_requested,
            jobs,
        }
    }

    fn shutdown(&mut self) {
        if self.remaining > 0 && !self.cancel_requested {
            info!(
                operation = self.op.name(),
                remaining = self.remaining,
                "Cancelling unfinished jobs"
            );
            self.cancel_requested = true;
            if let Err(e) = self.op.cancel() {
                warn!(operation = self.op.name(), error = %e, "Cancel request failed");
            }
        }

        for slot in &mut self.jobs {
            if let Some(worker) = slot.worker.take() {
                if let Err(e) = worker.join() {
                    error!(operation = self.op.name(), error = %e, "Worker failed to join cleanly");
                }
            }
        }

        // Every worker has posted by now
        for completion in self.notifier.drain() {
            self.record(completion);
        }
    }
}

impl<O: Operation> Drop for Supervisor<O> {
    fn drop(&mut self) {
        if self.jobs.iter().any(|slot| slot.worker.is_some()) {
            self.shutdown();
        }
    }
}

/// How one job ended
#[derive(Debug)]
pub enum JobStatus<'a> {
    /// The kernel call succeeded
    Succeeded,

    /// The kernel call was cancelled at our request
    Cancelled,

    /// The kernel call failed
    Failed(&'a io::Error),
}

/// Result of one job
#[derive(Debug)]
pub struct JobReport<J> {
    /// Arguments as the kernel left them
    pub job: J,

    /// Outcome of the blocking call
    pub result: io::Result<()>,
}

/// Aggregate result of a supervised operation
#[derive(Debug)]
pub struct SupervisorReport<J> {
    /// A termination request ended monitoring early
    pub interrupted: bool,

    /// A cancel was sent to the kernel
    pub cancel_requested: bool,

    /// Per-job results in start order
    pub jobs: Vec<JobReport<J>>,
}

impl<J> SupervisorReport<J> {
    /// Classify one job's result
    pub fn status<'a>(&self, report: &'a JobReport<J>) -> JobStatus<'a> {
        match &report.result {
            Ok(()) => JobStatus::Succeeded,
            Err(e) if self.cancel_requested && is_cancelled(e) => JobStatus::Cancelled,
            Err(e) => JobStatus::Failed(e),
        }
    }

    /// Whether every job's kernel call succeeded
    pub fn all_succeeded(&self) -> bool {
        self.jobs.iter().all(|job| job.result.is_ok())
    }
}
