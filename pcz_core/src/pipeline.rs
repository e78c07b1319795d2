//! The pipeline driver: chunker → worker pool → reassembler for one payload.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::{self, Chunk};
use crate::codec::Codec;
use crate::error::{PipelineError, PipelineResult};
use crate::format::{self, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::pool::WorkerPool;
use crate::progress::{NoProgress, Progress};
use crate::reassembler::Reassembler;

/// Direction of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Raw payload → concatenated frames.
    Encode,
    /// Concatenated frames → raw payload.
    Decode,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Encode => f.write_str("encode"),
            Mode::Decode => f.write_str("decode"),
        }
    }
}

/// The two pipeline tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw bytes per chunk when encoding.
    pub chunk_size: usize,
    /// Upper bound on parallel workers.
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_count: num_cpus::get().max(1),
        }
    }
}

impl PipelineConfig {
    pub fn new(chunk_size: usize, worker_count: usize) -> Self {
        Self {
            chunk_size,
            worker_count,
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(PipelineError::InvalidConfig(format!(
                "chunk size {} exceeds the frame limit of {} bytes",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.worker_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "worker count must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Runs one payload at a time through a codec, in parallel.
///
/// A `Pipeline` holds only its codec and configuration. Each call to
/// [`process`](Pipeline::process) builds its own [`WorkerPool`] and tears it
/// down before returning, so concurrent calls never share threads or state.
///
/// # Decoding
/// Encoded payloads are a concatenation of self-delimiting frames, one per
/// chunk. Decoding splits along frame boundaries rather than `chunk_size`,
/// so a payload decodes correctly whatever chunk size it was encoded with.
#[derive(Clone)]
pub struct Pipeline {
    codec: Arc<dyn Codec>,
    config: PipelineConfig,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("codec", &self.codec.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline, validating `config` up front.
    pub fn new(codec: Arc<dyn Codec>, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { codec, config })
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compress `payload` without progress reporting.
    pub fn encode(&self, payload: &[u8]) -> PipelineResult<Vec<u8>> {
        self.process(payload, Mode::Encode, &NoProgress)
    }

    /// Decompress `payload` without progress reporting.
    pub fn decode(&self, payload: &[u8]) -> PipelineResult<Vec<u8>> {
        self.process(payload, Mode::Decode, &NoProgress)
    }

    /// Run `payload` through the pipeline in the given direction.
    ///
    /// `progress` receives the chunk total before dispatch and one tick per
    /// completed chunk. The first failing chunk fails the whole payload and
    /// nothing is returned for the chunks that did succeed.
    pub fn process(
        &self,
        payload: &[u8],
        mode: Mode,
        progress: &dyn Progress,
    ) -> PipelineResult<Vec<u8>> {
        let span = tracing::debug_span!(
            "pipeline",
            %mode,
            codec = self.codec.name(),
            bytes = payload.len()
        );
        let _enter = span.enter();

        let result = match mode {
            Mode::Encode => {
                debug!("splitting payload into {}-byte chunks", self.config.chunk_size);
                let chunks = chunker::split(payload, self.config.chunk_size)?;
                let total = chunks.len();
                let codec = self.codec.as_ref();
                self.dispatch(chunks, total, progress, |chunk: Chunk<'_>| {
                    format::encode_frame(codec, chunk.bytes).map_err(|e| PipelineError::Encode {
                        index: chunk.index,
                        reason: format!("{e:#}"),
                    })
                })
            }
            Mode::Decode => {
                debug!("splitting payload along frame boundaries");
                let frames = chunker::split_frames(payload)?;
                let total = frames.len();
                let codec = self.codec.as_ref();
                self.dispatch(frames, total, progress, |chunk: Chunk<'_>| {
                    format::decode_frame(codec, chunk.bytes).map_err(|e| {
                        PipelineError::CorruptChunk {
                            index: chunk.index,
                            reason: format!("{e:#}"),
                        }
                    })
                })
            }
        };

        match &result {
            Ok(output) => debug!(output_bytes = output.len(), "payload completed"),
            Err(e) => debug!(error = %e, "payload failed"),
        }
        result
    }

    fn dispatch<'a, I, F>(
        &self,
        chunks: I,
        total: usize,
        progress: &dyn Progress,
        op: F,
    ) -> PipelineResult<Vec<u8>>
    where
        I: IntoIterator<Item = Chunk<'a>>,
        I::IntoIter: Send,
        F: Fn(Chunk<'a>) -> PipelineResult<Vec<u8>> + Sync,
    {
        progress.start(total);
        if total == 0 {
            debug!("empty payload, no chunks to dispatch");
            progress.finish();
            return Ok(Vec::new());
        }

        // Never spawn more workers than there are chunks.
        let pool = WorkerPool::new(self.config.worker_count.min(total))?;
        debug!(chunks = total, workers = pool.worker_count(), "dispatching");

        let mut reassembler = Reassembler::new(total);
        pool.run(chunks, op, progress, |result| reassembler.insert(result))?;

        debug!("reassembling {} chunks", total);
        let output = reassembler.finish()?;
        progress.finish();
        Ok(output)
    }
}
