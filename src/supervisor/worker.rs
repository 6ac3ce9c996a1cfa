//! Worker thread handle
//!
//! Each job runs on its own named OS thread. The btrfs maintenance ioctls
//! block uninterruptibly inside the kernel until they finish or are
//! cancelled, so the supervising thread never issues them itself.

use crate::error::WorkerError;
use std::thread::{self, JoinHandle};
use tracing::trace;

/// A spawned worker thread
pub struct Worker {
    /// Worker ID (the job index)
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a new worker thread running `body`
    pub fn spawn<F>(id: usize, name: String, body: F) -> Result<Self, WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name)
            .spawn(body)
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        trace!(worker = id, "Worker spawned");
        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| WorkerError::Panicked { id: self.id }),
            None => Ok(()),
        }
    }
}
