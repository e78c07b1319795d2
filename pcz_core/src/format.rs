use xxhash_rust::xxh3::xxh3_64;

use crate::codec::Codec;
use crate::error::{PipelineError, PipelineResult};

/// Magic bytes opening every frame.
pub const MAGIC: &[u8; 2] = b"PZ";

/// Current frame format version.
pub const FORMAT_VERSION: u8 = 1;

/// Fixed size of a frame header in bytes.
///   magic[2] + version:u8 + reserved:u8 + codec_id:u16 + raw_len:u32
///   + compressed_len:u32 + checksum:u64 + _pad[2]
///   = 2 + 1 + 1 + 2 + 4 + 4 + 8 + 2 = 24
pub const FRAME_HEADER_SIZE: usize = 24;

/// Default raw chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Largest chunk a frame can describe (`raw_len` is a u32).
pub const MAX_CHUNK_SIZE: usize = u32::MAX as usize;

// ── Codec IDs ──────────────────────────────────────────────────────────────

pub const CODEC_PASSTHROUGH: u16 = 0;
pub const CODEC_ZSTD: u16 = 1;
pub const CODEC_LZ4: u16 = 2;
pub const CODEC_ZLIB: u16 = 3;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 24-byte frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub codec_id: u16,
    /// Length of the chunk before compression.
    pub raw_len: u32,
    /// Length of the codec output following the header.
    pub compressed_len: u32,
    /// xxhash3-64 of the compressed bytes.
    pub checksum: u64,
}

impl FrameHeader {
    /// Serialize to exactly `FRAME_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..2].copy_from_slice(MAGIC);
        buf[2] = self.version;
        // buf[3] reserved, stays zero
        buf[4..6].copy_from_slice(&self.codec_id.to_le_bytes());
        buf[6..10].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[10..14].copy_from_slice(&self.compressed_len.to_le_bytes());
        buf[14..22].copy_from_slice(&self.checksum.to_le_bytes());
        // buf[22..24] padding, stays zero
        buf
    }

    /// Deserialize from `FRAME_HEADER_SIZE` bytes, checking magic and version.
    pub fn from_bytes(buf: &[u8; FRAME_HEADER_SIZE]) -> anyhow::Result<Self> {
        if &buf[0..2] != MAGIC {
            anyhow::bail!("invalid frame magic bytes, not a pcz stream");
        }
        let version = buf[2];
        if version != FORMAT_VERSION {
            anyhow::bail!(
                "unsupported frame version {} (only version {} is supported)",
                version,
                FORMAT_VERSION
            );
        }
        Ok(Self {
            version,
            codec_id: u16::from_le_bytes(buf[4..6].try_into()?),
            raw_len: u32::from_le_bytes(buf[6..10].try_into()?),
            compressed_len: u32::from_le_bytes(buf[10..14].try_into()?),
            checksum: u64::from_le_bytes(buf[14..22].try_into()?),
        })
    }

    /// Total frame length on the wire, header included.
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.compressed_len as usize
    }

    /// Parse the header at the start of `bytes`.
    fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        let head: &[u8; FRAME_HEADER_SIZE] = bytes
            .get(..FRAME_HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "truncated frame header: {} bytes left, need {}",
                    bytes.len(),
                    FRAME_HEADER_SIZE
                )
            })?;
        Self::from_bytes(head)
    }
}

// ── Frame encode / decode ──────────────────────────────────────────────────

/// Compress `raw` with `codec` and wrap it in a self-delimiting frame.
pub fn encode_frame(codec: &dyn Codec, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
    let raw_len = u32::try_from(raw.len())
        .map_err(|_| anyhow::anyhow!("chunk of {} bytes exceeds frame limit", raw.len()))?;
    let compressed = codec.compress_block(raw)?;
    let compressed_len = u32::try_from(compressed.len()).map_err(|_| {
        anyhow::anyhow!("compressed chunk of {} bytes exceeds frame limit", compressed.len())
    })?;

    let header = FrameHeader {
        version: FORMAT_VERSION,
        codec_id: codec.id(),
        raw_len,
        compressed_len,
        checksum: xxh3_64(&compressed),
    };

    let mut frame = Vec::with_capacity(header.frame_len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&compressed);
    Ok(frame)
}

/// Verify and decompress one complete frame.
///
/// Rejects, rather than passes through, any frame whose header, length,
/// codec, checksum or decompressed size does not check out.
pub fn decode_frame(codec: &dyn Codec, frame: &[u8]) -> anyhow::Result<Vec<u8>> {
    let header = FrameHeader::parse(frame)?;

    if frame.len() != header.frame_len() {
        anyhow::bail!(
            "frame length mismatch: header says {} bytes but frame has {}",
            header.frame_len(),
            frame.len()
        );
    }
    if header.codec_id != codec.id() {
        anyhow::bail!(
            "codec mismatch: frame uses codec {} but provided codec has id {}",
            header.codec_id,
            codec.id()
        );
    }

    let compressed = &frame[FRAME_HEADER_SIZE..];
    let computed = xxh3_64(compressed);
    if computed != header.checksum {
        anyhow::bail!(
            "checksum mismatch: expected {:016x}, got {:016x}",
            header.checksum,
            computed
        );
    }

    let raw = codec.decompress_block(compressed, header.raw_len as usize)?;
    if raw.len() != header.raw_len as usize {
        anyhow::bail!(
            "decompressed to {} bytes but header says {}",
            raw.len(),
            header.raw_len
        );
    }
    Ok(raw)
}

// ── Frame walking ──────────────────────────────────────────────────────────

/// One frame located inside an encoded payload.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    /// Position of the frame in the payload (0-based).
    pub index: usize,
    /// Byte offset of the frame header within the payload.
    pub offset: usize,
    pub header: FrameHeader,
    /// The whole frame, header included.
    pub bytes: &'a [u8],
}

/// Iterator over the frames of an encoded payload.
///
/// Only headers are inspected; payload bytes are sliced, never copied or
/// decompressed. Yields at most one error and then stops.
pub struct Frames<'a> {
    data: &'a [u8],
    offset: usize,
    index: usize,
    failed: bool,
}

/// Walk the frames of `encoded` in order.
pub fn frames(encoded: &[u8]) -> Frames<'_> {
    Frames {
        data: encoded,
        offset: 0,
        index: 0,
        failed: false,
    }
}

impl<'a> Frames<'a> {
    fn corrupt(&mut self, reason: String) -> PipelineError {
        self.failed = true;
        PipelineError::CorruptChunk {
            index: self.index,
            reason,
        }
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = PipelineResult<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let data: &'a [u8] = self.data;
        let rest = &data[self.offset..];
        let header = match FrameHeader::parse(rest) {
            Ok(h) => h,
            Err(e) => return Some(Err(self.corrupt(format!("{e:#}")))),
        };
        if header.frame_len() > rest.len() {
            let reason = format!(
                "truncated frame: header declares {} bytes but only {} remain",
                header.frame_len(),
                rest.len()
            );
            return Some(Err(self.corrupt(reason)));
        }

        let frame = Frame {
            index: self.index,
            offset: self.offset,
            bytes: &rest[..header.frame_len()],
            header,
        };
        self.offset += frame.bytes.len();
        self.index += 1;
        Some(Ok(frame))
    }
}

/// Codec id of the first frame, or `None` for an empty payload.
///
/// Lets callers pick the right codec before decoding a whole file.
pub fn peek_codec_id(encoded: &[u8]) -> PipelineResult<Option<u16>> {
    frames(encoded)
        .next()
        .transpose()
        .map(|frame| frame.map(|f| f.header.codec_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stores chunks verbatim; enough to exercise the framing.
    struct Identity;

    impl Codec for Identity {
        fn id(&self) -> u16 {
            CODEC_PASSTHROUGH
        }

        fn name(&self) -> &'static str {
            "identity"
        }

        fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
            Ok(raw.to_vec())
        }

        fn decompress_block(&self, compressed: &[u8], _raw_len: usize) -> anyhow::Result<Vec<u8>> {
            Ok(compressed.to_vec())
        }
    }

    #[test]
    fn test_header_layout() {
        let header = FrameHeader {
            version: FORMAT_VERSION,
            codec_id: CODEC_ZLIB,
            raw_len: 0x0102_0304,
            compressed_len: 7,
            checksum: 0xAABB_CCDD_EEFF_0011,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..2], b"PZ");
        assert_eq!(bytes[2], 1);
        assert_eq!(&bytes[6..10], &[4, 3, 2, 1]);
        assert_eq!(&bytes[22..24], &[0, 0]);
        assert_eq!(FrameHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes[0..2].copy_from_slice(b"ZZ");
        let err = FrameHeader::from_bytes(&bytes).unwrap_err().to_string();
        assert!(err.contains("magic"), "got: {err}");
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = encode_frame(&Identity, b"hello frame").unwrap();
        assert_eq!(frame.len(), FRAME_HEADER_SIZE + 11);
        assert_eq!(decode_frame(&Identity, &frame).unwrap(), b"hello frame");
    }

    #[test]
    fn test_flipped_payload_byte_fails_checksum() {
        let mut frame = encode_frame(&Identity, b"checksummed payload").unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        let err = decode_frame(&Identity, &frame).unwrap_err().to_string();
        assert!(err.contains("checksum mismatch"), "got: {err}");
    }

    #[test]
    fn test_frames_walks_concatenation() {
        let mut encoded = encode_frame(&Identity, b"first").unwrap();
        encoded.extend(encode_frame(&Identity, b"second!").unwrap());

        let found: Vec<_> = frames(&encoded).collect::<Result<_, _>>().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].index, 0);
        assert_eq!(found[0].offset, 0);
        assert_eq!(found[1].index, 1);
        assert_eq!(found[1].offset, FRAME_HEADER_SIZE + 5);
        assert_eq!(found[1].header.raw_len, 7);
    }

    #[test]
    fn test_frames_reports_truncation_index() {
        let mut encoded = encode_frame(&Identity, b"intact").unwrap();
        let second = encode_frame(&Identity, b"cut short").unwrap();
        encoded.extend_from_slice(&second[..second.len() - 3]);

        let results: Vec<_> = frames(&encoded).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(PipelineError::CorruptChunk { index, reason }) => {
                assert_eq!(*index, 1);
                assert!(reason.contains("truncated"), "got: {reason}");
            }
            other => panic!("expected CorruptChunk, got {other:?}"),
        }
    }

    #[test]
    fn test_peek_codec_id() {
        assert_eq!(peek_codec_id(b"").unwrap(), None);
        let frame = encode_frame(&Identity, b"x").unwrap();
        assert_eq!(peek_codec_id(&frame).unwrap(), Some(CODEC_PASSTHROUGH));
    }
}
