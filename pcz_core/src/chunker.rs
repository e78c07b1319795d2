//! Splitting payloads into ordered, indexed chunks.

use std::iter::Enumerate;
use std::slice;

use crate::error::{PipelineError, PipelineResult};
use crate::format;

/// A borrowed slice of a payload, tagged with its position.
///
/// `index` is the only ordering key used downstream of the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub bytes: &'a [u8],
}

/// Lazy, restartable sequence of fixed-size chunks.
///
/// A clone is an independent cursor over the same slices.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    inner: Enumerate<slice::Chunks<'a, u8>>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(index, bytes)| Chunk { index, bytes })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Number of chunks `split` yields for a payload of `len` bytes.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// Split `data` into `ceil(len / chunk_size)` chunks.
///
/// All chunks but the last are exactly `chunk_size` bytes. Empty data yields
/// no chunks.
pub fn split(data: &[u8], chunk_size: usize) -> PipelineResult<Chunks<'_>> {
    if chunk_size == 0 {
        return Err(PipelineError::InvalidConfig(
            "chunk size must be greater than zero".into(),
        ));
    }
    Ok(Chunks {
        inner: data.chunks(chunk_size).enumerate(),
    })
}

/// Split an encoded payload along its frame boundaries.
///
/// Each chunk holds one whole frame. Walking is header-only, so this fails
/// fast on a truncated or foreign stream before any worker is started.
pub fn split_frames(encoded: &[u8]) -> PipelineResult<Vec<Chunk<'_>>> {
    format::frames(encoded)
        .map(|frame| {
            frame.map(|f| Chunk {
                index: f.index,
                bytes: f.bytes,
            })
        })
        .collect()
}
