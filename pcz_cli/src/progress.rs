use std::sync::atomic::{AtomicUsize, Ordering};

use pcz_core::Progress;

/// Renders pipeline progress as log lines.
///
/// Every tick is a `trace!` event; crossing each quarter of the chunk total
/// is an `info!` event, so a large file reports at 25/50/75/100% and a small
/// one stays quiet at the default level.
pub struct LogProgress {
    label: String,
    total: AtomicUsize,
    done: AtomicUsize,
    quarters: AtomicUsize,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            quarters: AtomicUsize::new(0),
        }
    }

    /// Chunks completed so far.
    pub fn done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    /// Chunk total announced by the pipeline.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }
}

impl Progress for LogProgress {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Release);
        self.done.store(0, Ordering::Release);
        self.quarters.store(0, Ordering::Release);
        tracing::debug!(file = %self.label, chunks = total, "started");
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::AcqRel) + 1;
        let total = self.total.load(Ordering::Acquire).max(1);
        tracing::trace!(file = %self.label, done, total, "chunk completed");

        // Files with fewer than four chunks get no milestones.
        if total < 4 {
            return;
        }
        let quarter = done * 4 / total;
        if quarter > self.quarters.fetch_max(quarter, Ordering::AcqRel) {
            tracing::info!(
                file = %self.label,
                "{:>3}% ({done}/{total} chunks)",
                quarter * 25
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_ticks() {
        let progress = LogProgress::new("file.bin");
        progress.start(10);
        for _ in 0..10 {
            progress.tick();
        }
        assert_eq!(progress.total(), 10);
        assert_eq!(progress.done(), 10);
    }

    #[test]
    fn test_restart_resets_counters() {
        let progress = LogProgress::new("file.bin");
        progress.start(3);
        progress.tick();
        progress.start(5);
        assert_eq!(progress.done(), 0);
        assert_eq!(progress.total(), 5);
    }
}
