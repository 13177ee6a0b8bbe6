//! Progress reporting contract between the orchestrator and its caller.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Receives progress events for one deploy or undeploy call.
///
/// The orchestrator calls [`ProgressSink::finish`] exactly once per call,
/// whatever the outcome. Cancellation is polled between phases through
/// [`ProgressSink::is_cancelled`].
pub trait ProgressSink: Send + Sync {
    /// Report a progress message
    fn progress(&self, message: &str);

    /// Whether the caller asked to cancel
    fn is_cancelled(&self) -> bool {
        false
    }

    /// The call is over
    fn finish(&self);
}

/// Progress sink that forwards to `tracing` and holds a cancel flag
#[derive(Debug, Default)]
pub struct LoggingProgress {
    cancelled: AtomicBool,
    finished: AtomicBool,
}

impl LoggingProgress {
    /// Create a new logging progress sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next phase boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether `finish` has been called
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ProgressSink for LoggingProgress {
    fn progress(&self, message: &str) {
        info!("{}", message);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}
