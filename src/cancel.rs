//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancellation flag.
///
/// The executor polls it between phases (resolution, compilation,
/// execution) and the evaluator polls it before every statement and loop
/// iteration. Cancellation inside a builtin is not observed until it returns.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for the next submission.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// The shared flag itself, for handlers that can only set an
    /// `AtomicBool` (such as a SIGINT hook).
    pub fn flag(&self) -> &Arc<AtomicBool> {
        &self.flag
    }
}
