//! Cancellation signal bridge
//!
//! The scrub and balance ioctls cannot be interrupted by signals, so while
//! one is running SIGINT, SIGQUIT and SIGTERM are blocked and their arrival
//! is observed through a signalfd instead. A bridge thread polls the
//! signalfd and forwards a [`TerminationRequest`] on a channel the
//! supervisor can `select!` on.
//!
//! The pending signal is deliberately left unread. When the bridge is
//! dropped the previous signal mask is restored and the signal is delivered
//! with whatever disposition it had before, after the operation has been
//! cancelled and joined.
//!
//! Only threads spawned after [`SignalBridge::install`] inherit the blocked
//! mask, so install the bridge before starting workers or progress tickers.

use crate::error::SignalError;
use crossbeam_channel::{bounded, Receiver, Sender};
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::io;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Signals that request termination of a monitored operation
pub const TERMINATION_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTERM];

/// How long the bridge thread waits in poll before checking its stop flag
const POLL_TIMEOUT_MS: libc::c_int = 100;

/// A termination signal is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationRequest;

/// Scoped guard turning termination signals into channel messages
pub struct SignalBridge {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    requests: Receiver<TerminationRequest>,

    // Dropped after the bridge thread has been joined
    _mask: MaskGuard,
}

impl SignalBridge {
    /// Block the termination signals and start watching for them
    pub fn install() -> Result<Self, SignalError> {
        let mut signals = SigSet::empty();
        for signal in TERMINATION_SIGNALS {
            signals.add(signal);
        }

        let mut previous = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&signals), Some(&mut previous))
            .map_err(SignalError::Mask)?;
        let mask = MaskGuard { previous };

        let fd = SignalFd::with_flags(&signals, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .map_err(SignalError::SignalFd)?;

        let (sender, requests) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("signal-bridge".into())
            .spawn(move || bridge_loop(fd, sender, stop_flag))
            .map_err(SignalError::Bridge)?;

        debug!("Termination signals blocked");
        Ok(Self {
            stop,
            thread: Some(thread),
            requests,
            _mask: mask,
        })
    }

    /// Channel that receives one message when a termination signal arrives
    pub fn requests(&self) -> &Receiver<TerminationRequest> {
        &self.requests
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Signal bridge thread panicked");
            }
        }
    }
}

/// Restores the signal mask captured before blocking
struct MaskGuard {
    previous: SigSet,
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        if let Err(e) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None) {
            error!(error = %e, "Failed to restore signal mask");
        } else {
            debug!("Signal mask restored");
        }
    }
}

fn bridge_loop(fd: SignalFd, sender: Sender<TerminationRequest>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        let mut pfd = libc::pollfd {
            fd: fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        let ret = unsafe { libc::poll(&mut pfd, 1, POLL_TIMEOUT_MS) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            warn!(error = %err, "poll on signalfd failed");
            break;
        }

        if ret > 0 && pfd.revents & libc::POLLIN != 0 {
            debug!("Termination signal pending");
            let _ = sender.send(TerminationRequest);
            break;
        }
    }
}
