/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Is identified by a stable numeric `id()` stored in every frame header.
/// - Must compress/decompress individual chunks independently; no cross-chunk
///   state (dictionary, window, counters) is permitted. This is the invariant
///   that lets the worker pool process chunks in any order.
/// - Is shared by reference across worker threads, hence `Send + Sync`.
pub trait Codec: Send + Sync {
    /// Stable codec ID stored in the frame header.
    fn id(&self) -> u16;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Compress a single independent chunk.
    ///
    /// Must accept arbitrary bytes. The output may be larger than the input
    /// for small or incompressible chunks.
    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decompress a single independent chunk.
    ///
    /// `raw_len` is the original length recorded in the frame header. Codecs
    /// may use it to pre-size the output; the frame layer checks the result
    /// length independently, so a codec is free to ignore it.
    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>>;
}
