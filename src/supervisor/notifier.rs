//! Completion notifier
//!
//! Each worker reports its finished job exactly once by posting a
//! [`Completion`] to a channel shared with the supervising thread. The poster
//! is a drop guard: if the worker unwinds before reporting, the guard posts a
//! failure on its behalf, so the supervisor's remaining-count always reaches
//! zero.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io;

/// One finished job
#[derive(Debug)]
pub struct Completion<J> {
    /// Position of the job in the supervisor's job list
    pub index: usize,

    /// Job arguments as the kernel left them
    pub job: J,

    /// Outcome of the blocking call
    pub result: io::Result<()>,
}

/// Counting completion channel shared by all workers of one supervisor
pub struct CompletionNotifier<J> {
    sender: Sender<Completion<J>>,
    receiver: Receiver<Completion<J>>,
}

impl<J> CompletionNotifier<J> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Create the poster handed to the worker running job `index`
    ///
    /// `fallback` is reported if the worker never calls
    /// [`CompletionPoster::complete`].
    pub fn poster(&self, index: usize, fallback: J) -> CompletionPoster<J> {
        CompletionPoster {
            index,
            fallback: Some(fallback),
            sender: self.sender.clone(),
        }
    }

    /// Receiver to wait on in a `select!`
    pub fn receiver(&self) -> &Receiver<Completion<J>> {
        &self.receiver
    }

    /// Take every completion posted since the last drain
    pub fn drain(&self) -> Vec<Completion<J>> {
        self.receiver.try_iter().collect()
    }
}

impl<J> Default for CompletionNotifier<J> {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker-side handle that posts exactly one completion
pub struct CompletionPoster<J> {
    index: usize,
    fallback: Option<J>,
    sender: Sender<Completion<J>>,
}

impl<J> CompletionPoster<J> {
    /// Report the finished job
    pub fn complete(mut self, job: J, result: io::Result<()>) {
        self.fallback = None;
        self.post(job, result);
    }

    fn post(&self, job: J, result: io::Result<()>) {
        // The supervisor owns the receiver until every worker is joined
        let _ = self.sender.send(Completion {
            index: self.index,
            job,
            result,
        });
    }
}

impl<J> Drop for CompletionPoster<J> {
    fn drop(&mut self) {
        if let Some(job) = self.fallback.take() {
            self.post(
                job,
                Err(io::Error::other("worker exited without reporting a result")),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_each_poster_counts_once() {
        let notifier = CompletionNotifier::new();
        let posters: Vec<_> = (0..16).map(|i| notifier.poster(i, i)).collect();

        let handles: Vec<_> = posters
            .into_iter()
            .enumerate()
            .map(|(i, poster)| thread::spawn(move || poster.complete(i * 10, Ok(()))))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut drained = notifier.drain();
        assert_eq!(drained.len(), 16);
        drained.sort_by_key(|c| c.index);
        for (i, completion) in drained.iter().enumerate() {
            assert_eq!(completion.index, i);
            assert_eq!(completion.job, i * 10);
        }
        assert!(notifier.drain().is_empty());
    }

    #[test]
    fn test_dropped_poster_reports_failure() {
        let notifier = CompletionNotifier::new();
        let poster = notifier.poster(3, "initial");

        let result = thread::spawn(move || {
            let _poster = poster;
            panic!("worker blew up");
        })
        .join();
        assert!(result.is_err());

        let drained = notifier.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].index, 3);
        assert_eq!(drained[0].job, "initial");
        assert!(drained[0].result.is_err());
    }
}
