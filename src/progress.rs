//! Progress reporting and cancellation support.
//!
//! This module provides [`CancellationToken`] for cooperative cancellation,
//! used both to stop the decoder thread once every task is done and to let
//! callers abort a batch between tasks, and [`ProgressCallback`] for
//! observing completed clips.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clipcut::{CutOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} clips done, last: {}", info.completed, info.destination);
//!     }
//! }
//!
//! let options = CutOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

/// A snapshot taken after a clip has been finalized and reported.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Number of tasks completed so far in this batch.
    pub completed: u64,
    /// Id of the task that just completed.
    pub task_id: u64,
    /// Destination of the task that just completed.
    pub destination: String,
    /// Frames encoded into that clip.
    pub frames: usize,
    /// Total frames encoded so far in this batch.
    pub frames_total: u64,
    /// Wall-clock time elapsed since the batch started.
    pub elapsed: Duration,
}

/// Trait for receiving progress updates during a batch.
///
/// Callbacks are **infallible**: they observe but cannot halt the batch.
/// Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called once per completed task.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state; call [`cancel`](CancellationToken::cancel) from any
/// thread. Loops poll [`is_cancelled`](CancellationToken::is_cancelled)
/// between units of work and never abort mid-unit.
///
/// # Example
///
/// ```
/// use clipcut::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// assert!(!observer.is_cancelled());
///
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
