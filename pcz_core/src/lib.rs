pub mod chunker;
pub mod codec;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod reassembler;

pub use chunker::{split, split_frames, Chunk, Chunks};
pub use codec::Codec;
pub use error::{PipelineError, PipelineResult};
pub use format::{FrameHeader, DEFAULT_CHUNK_SIZE, FRAME_HEADER_SIZE, MAGIC};
pub use pipeline::{Mode, Pipeline, PipelineConfig};
pub use pool::{ChunkResult, WorkerPool};
pub use progress::{NoProgress, Progress, ProgressCounter};
pub use reassembler::{assemble, Reassembler};
