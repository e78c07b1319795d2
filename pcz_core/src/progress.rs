//! Completion events emitted by the pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Consumer of pipeline progress.
///
/// The pipeline calls [`start`](Progress::start) once with the number of
/// chunks, [`tick`](Progress::tick) once per finished chunk in completion
/// order, and [`finish`](Progress::finish) after a successful reassembly.
/// Implementations observe only; nothing they do feeds back into the
/// pipeline.
pub trait Progress: Send + Sync {
    fn start(&self, total: usize);

    fn tick(&self);

    fn finish(&self) {}
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _total: usize) {}

    fn tick(&self) {}
}

/// Counts events; handy for callers that poll and for tests.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: AtomicUsize,
    done: AtomicUsize,
    finished: AtomicUsize,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total announced by the last `start`.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Ticks received so far.
    pub fn done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    /// Whether `finish` has been called.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire) > 0
    }
}

impl Progress for ProgressCounter {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Release);
        self.done.store(0, Ordering::Release);
    }

    fn tick(&self) {
        self.done.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::AcqRel);
    }
}
