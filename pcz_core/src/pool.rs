//! Scoped worker pool applying a codec operation to chunks in parallel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam::channel;

use crate::chunker::Chunk;
use crate::error::{PipelineError, PipelineResult};
use crate::progress::Progress;

/// Output of one chunk, tagged with the index of the chunk it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub bytes: Vec<u8>,
}

/// Fixed-size pool of OS threads.
///
/// The pool owns no threads between calls: every [`run`](WorkerPool::run)
/// spawns its workers inside a `std::thread::scope` and joins them before
/// returning, on success and on failure alike.
///
/// # Topology
/// ```text
/// feeder ──bounded(jobs)──▶ worker × N ──bounded(results)──▶ caller thread
/// ```
/// Both channels hold at most `worker_count` items, so no more than about
/// `3 × worker_count` chunks are queued, running, or awaiting collection at
/// any moment.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> PipelineResult<Self> {
        if worker_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "worker count must be greater than zero".into(),
            ));
        }
        Ok(Self { worker_count })
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Apply `op` to every chunk and hand each result to `on_result`.
    ///
    /// `on_result` runs on the calling thread, once per chunk, in completion
    /// order; `progress` is ticked right after each call. The first error,
    /// from `op` or from `on_result`, stops the run: workers stop taking
    /// chunks, chunks already running finish and are dropped, and that
    /// error is returned.
    pub fn run<'a, I, F, R>(
        &self,
        chunks: I,
        op: F,
        progress: &dyn Progress,
        on_result: R,
    ) -> PipelineResult<()>
    where
        I: IntoIterator<Item = Chunk<'a>>,
        I::IntoIter: Send,
        F: Fn(Chunk<'a>) -> PipelineResult<Vec<u8>> + Sync,
        R: FnMut(ChunkResult) -> PipelineResult<()>,
    {
        if self.worker_count == 1 {
            run_sequential(chunks, &op, progress, on_result)
        } else {
            self.run_parallel(chunks.into_iter(), &op, progress, on_result)
        }
    }

    fn run_parallel<'a, I, F, R>(
        &self,
        chunks: I,
        op: &F,
        progress: &dyn Progress,
        mut on_result: R,
    ) -> PipelineResult<()>
    where
        I: Iterator<Item = Chunk<'a>> + Send,
        F: Fn(Chunk<'a>) -> PipelineResult<Vec<u8>> + Sync,
        R: FnMut(ChunkResult) -> PipelineResult<()>,
    {
        let (job_tx, job_rx) = channel::bounded::<Chunk<'a>>(self.worker_count);
        let (result_tx, result_rx) =
            channel::bounded::<PipelineResult<ChunkResult>>(self.worker_count);
        let cancelled = AtomicBool::new(false);
        let cancelled = &cancelled;

        thread::scope(|scope| {
            scope.spawn(move || {
                for chunk in chunks {
                    if cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    // Fails once every worker has gone away.
                    if job_tx.send(chunk).is_err() {
                        break;
                    }
                }
            });

            for worker_id in 0..self.worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    tracing::trace!(worker_id, "worker started");
                    while let Ok(chunk) = job_rx.recv() {
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        let index = chunk.index;
                        let outcome = op(chunk).map(|bytes| ChunkResult { index, bytes });
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                    tracing::trace!(worker_id, "worker exiting");
                });
            }

            // Only the workers may keep these alive, so the result stream ends
            // when the last worker exits.
            drop(job_rx);
            drop(result_tx);

            let mut outcome = Ok(());
            for result in result_rx.iter() {
                if let Err(e) = result.and_then(&mut on_result) {
                    outcome = Err(e);
                    break;
                }
                progress.tick();
            }

            if let Err(e) = &outcome {
                tracing::debug!(error = %e, "cancelling outstanding chunks");
                cancelled.store(true, Ordering::Release);
            }
            // Unblocks any worker parked on a full result channel.
            drop(result_rx);
            outcome
        })
    }
}

fn run_sequential<'a, I, F, R>(
    chunks: I,
    op: &F,
    progress: &dyn Progress,
    mut on_result: R,
) -> PipelineResult<()>
where
    I: IntoIterator<Item = Chunk<'a>>,
    F: Fn(Chunk<'a>) -> PipelineResult<Vec<u8>>,
    R: FnMut(ChunkResult) -> PipelineResult<()>,
{
    for chunk in chunks {
        let index = chunk.index;
        let bytes = op(chunk)?;
        on_result(ChunkResult { index, bytes })?;
        progress.tick();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::chunker::split;
    use crate::progress::{NoProgress, ProgressCounter};

    fn upper(chunk: Chunk<'_>) -> PipelineResult<Vec<u8>> {
        Ok(chunk.bytes.to_ascii_uppercase())
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_every_chunk_yields_one_result() {
        let data = b"abcdefghijklmnopqrstuvwxyz".repeat(10);
        for workers in [1, 2, 4, 8] {
            let pool = WorkerPool::new(workers).unwrap();
            let mut seen = Vec::new();
            pool.run(split(&data, 7).unwrap(), upper, &NoProgress, |r| {
                seen.push(r.index);
                Ok(())
            })
            .unwrap();
            seen.sort_unstable();
            let expected: Vec<usize> = (0..data.len().div_ceil(7)).collect();
            assert_eq!(seen, expected, "workers={workers}");
        }
    }

    #[test]
    fn test_results_may_complete_out_of_order() {
        // Earlier chunks sleep longer, so later chunks tend to finish first.
        let data = vec![7u8; 8];
        let pool = WorkerPool::new(4).unwrap();
        let order = Mutex::new(Vec::new());
        pool.run(
            split(&data, 1).unwrap(),
            |chunk| {
                thread::sleep(Duration::from_millis(5 * (8 - chunk.index as u64)));
                Ok(vec![chunk.index as u8])
            },
            &NoProgress,
            |r| {
                assert_eq!(r.bytes, vec![r.index as u8]);
                order.lock().unwrap().push(r.index);
                Ok(())
            },
        )
        .unwrap();
        let order = order.into_inner().unwrap();
        assert_eq!(order.len(), 8);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_progress_ticks_once_per_result() {
        let data = vec![1u8; 1000];
        let pool = WorkerPool::new(3).unwrap();
        let progress = ProgressCounter::new();
        pool.run(split(&data, 64).unwrap(), upper, &progress, |_| Ok(()))
            .unwrap();
        assert_eq!(progress.done(), 16);
    }

    #[test]
    fn test_first_failure_aborts_run() {
        let data = vec![0u8; 10_000];
        let calls = AtomicUsize::new(0);
        let pool = WorkerPool::new(4).unwrap();
        let err = pool
            .run(
                split(&data, 10).unwrap(),
                |chunk| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if chunk.index == 3 {
                        return Err(PipelineError::CorruptChunk {
                            index: chunk.index,
                            reason: "boom".into(),
                        });
                    }
                    thread::sleep(Duration::from_millis(1));
                    Ok(chunk.bytes.to_vec())
                },
                &NoProgress,
                |_| Ok(()),
            )
            .unwrap_err();
        assert_eq!(err.chunk_index(), Some(3));
        // 1000 chunks were available; cancellation must stop the feed early.
        assert!(calls.load(Ordering::SeqCst) < 1000);
    }

    #[test]
    fn test_sequential_failure_stops_immediately() {
        let data = vec![0u8; 100];
        let calls = AtomicUsize::new(0);
        let pool = WorkerPool::new(1).unwrap();
        let err = pool
            .run(
                split(&data, 10).unwrap(),
                |chunk| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if chunk.index == 2 {
                        return Err(PipelineError::Encode {
                            index: 2,
                            reason: "boom".into(),
                        });
                    }
                    Ok(Vec::new())
                },
                &NoProgress,
                |_| Ok(()),
            )
            .unwrap_err();
        assert_eq!(err.chunk_index(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_collector_error_aborts_run() {
        let data = vec![0u8; 1000];
        let pool = WorkerPool::new(2).unwrap();
        let err = pool
            .run(split(&data, 10).unwrap(), upper, &NoProgress, |_| {
                Err(PipelineError::Reassembly("rejected".into()))
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Reassembly(_)));
    }
}
