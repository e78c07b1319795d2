//! Error types for the chunk pipeline.

/// Errors surfaced by a single pipeline invocation.
///
/// The pipeline never performs I/O, so there is no I/O variant here: reading
/// and writing payloads is the batch runner's concern.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Rejected before any work started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An encoded chunk did not decode to valid bytes.
    #[error("corrupt chunk {index}: {reason}")]
    CorruptChunk {
        /// Position of the offending frame in the encoded payload.
        index: usize,
        /// Underlying decode failure.
        reason: String,
    },

    /// A codec failed to compress a chunk.
    #[error("failed to encode chunk {index}: {reason}")]
    Encode {
        /// Position of the chunk in the payload.
        index: usize,
        /// Underlying codec failure.
        reason: String,
    },

    /// The worker pool handed the reassembler a gap or a duplicate.
    ///
    /// This indicates a bug in the pool, not bad input.
    #[error("reassembly invariant violated: {0}")]
    Reassembly(String),
}

impl PipelineError {
    /// Index of the chunk that caused the failure, if any.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::CorruptChunk { index, .. } | Self::Encode { index, .. } => Some(*index),
            Self::InvalidConfig(_) | Self::Reassembly(_) => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
