//! Progress and cancellation protocol shared by every batch operation.
//!
//! A batch fixes its unit count before the first unit runs. After each unit
//! the sink receives `(completed, total, label)` and answers whether to keep
//! going. Returning `false` is the only way to cancel; a unit that already
//! started always runs to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub completed: u64,
    pub total: u64,
    /// Display name of the unit that was just processed.
    pub label: String,
}

impl Progress {
    pub fn new(completed: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            completed,
            total,
            label: label.into(),
        }
    }
}

/// Callback handed to archive primitives (repack, merge): completed units,
/// total units, native-encoded virtual path of the unit. Returns `false` to stop.
pub type UnitCallback<'a> = dyn FnMut(u64, u64, &[u8]) -> bool + 'a;

pub trait ProgressSink {
    /// Returns `true` to continue or `false` to request cancellation.
    fn on_progress(&mut self, progress: &Progress) -> bool;
}

impl<F> ProgressSink for F
where
    F: FnMut(&Progress) -> bool,
{
    fn on_progress(&mut self, progress: &Progress) -> bool {
        self(progress)
    }
}

/// Sink that never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _progress: &Progress) -> bool {
        true
    }
}

/// Shared cancellation flag, e.g. set from a Ctrl-C handler.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Forwards progress to `inner` and cancels once the flag is raised.
pub struct Cancellable<S> {
    flag: CancelFlag,
    inner: S,
}

impl<S: ProgressSink> Cancellable<S> {
    pub fn new(flag: CancelFlag, inner: S) -> Self {
        Self { flag, inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: ProgressSink> ProgressSink for Cancellable<S> {
    fn on_progress(&mut self, progress: &Progress) -> bool {
        let keep_going = self.inner.on_progress(progress);
        keep_going && !self.flag.is_cancelled()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchStatus {
    Completed,
    /// Cooperative cancellation observed between units. Not a failure.
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchReport {
    pub status: BatchStatus,
    /// Units processed, including skipped ones.
    pub completed: u64,
    pub total: u64,
    /// Units that failed and were skipped (extraction only).
    pub skipped: u64,
}

impl BatchReport {
    pub fn is_cancelled(&self) -> bool {
        self.status == BatchStatus::Cancelled
    }
}
