//! Batch runner: feeds every file of a directory tree through the pipeline.
//!
//! The pipeline itself only sees byte buffers. Everything path-related lives
//! here: traversal, output naming, reading and writing, and carrying on past
//! files that fail.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use pcz_codecs::codec_by_id;
use pcz_core::format::peek_codec_id;
use pcz_core::{Codec, Mode, Pipeline, PipelineConfig};

use crate::progress::LogProgress;

/// Suffix appended on compression and stripped on decompression.
pub const COMPRESSED_SUFFIX: &str = ".compressed";

/// Output file name for `file_name`, or `None` when the file is not ours to
/// process in this mode.
///
/// Compression appends [`COMPRESSED_SUFFIX`]; decompression strips exactly
/// one trailing occurrence of it.
pub fn output_name(file_name: &str, mode: Mode) -> Option<String> {
    match mode {
        Mode::Encode => Some(format!("{file_name}{COMPRESSED_SUFFIX}")),
        Mode::Decode => file_name
            .strip_suffix(COMPRESSED_SUFFIX)
            .filter(|stem| !stem.is_empty())
            .map(str::to_owned),
    }
}

/// Files under `input` in traversal order; `input` may itself be a file.
pub fn collect_inputs(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let meta = fs::metadata(input).with_context(|| format!("reading {:?}", input))?;
    if meta.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {:?}", input))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Outcome for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub chunks: usize,
    pub error: Option<String>,
}

impl FileReport {
    fn failed(input: &Path, err: &anyhow::Error) -> Self {
        Self {
            input: input.to_path_buf(),
            output: None,
            input_bytes: 0,
            output_bytes: 0,
            chunks: 0,
            error: Some(format!("{err:#}")),
        }
    }
}

/// Summary of one batch run, serializable as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub mode: Mode,
    /// Codec used for compression; decompression resolves it per file.
    pub codec: Option<String>,
    pub config: PipelineConfig,
    pub files: Vec<FileReport>,
    /// Inputs passed over because their name does not fit the mode.
    pub skipped: usize,
    pub elapsed_secs: f64,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.files.len() - self.failed()
    }

    pub fn input_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.input_bytes).sum()
    }

    pub fn output_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.output_bytes).sum()
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing report {:?}", path))
    }
}

/// Runs a whole directory tree through the pipeline, one file at a time.
///
/// Chunk-level parallelism happens inside each file; files themselves are
/// processed sequentially in traversal order.
pub struct BatchRunner {
    mode: Mode,
    config: PipelineConfig,
    /// Fixed codec for compression; `None` resolves it from each file.
    codec: Option<Arc<dyn Codec>>,
}

impl BatchRunner {
    pub fn compress(codec: Arc<dyn Codec>, config: PipelineConfig) -> Self {
        Self {
            mode: Mode::Encode,
            config,
            codec: Some(codec),
        }
    }

    pub fn decompress(config: PipelineConfig) -> Self {
        Self {
            mode: Mode::Decode,
            config,
            codec: None,
        }
    }

    /// Process every eligible file under `input`, writing into `output_dir`.
    ///
    /// Outputs are placed directly in `output_dir` under their transformed
    /// file name; existing files are overwritten. A failing file is logged
    /// and recorded, and the run moves on to the next one. Only problems
    /// with the run as a whole (bad config, unreadable input root, output
    /// directory not creatable) are returned as `Err`.
    pub fn run(&self, input: &Path, output_dir: &Path) -> anyhow::Result<BatchReport> {
        self.config.validate()?;
        let inputs = collect_inputs(input)?;
        fs::create_dir_all(output_dir)
            .with_context(|| format!("creating output directory {:?}", output_dir))?;

        let t0 = Instant::now();
        let mut files = Vec::new();
        let mut skipped = 0;

        for path in inputs {
            let Some(out_name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| output_name(n, self.mode))
            else {
                debug!(file = ?path, "skipping, name does not match mode");
                skipped += 1;
                continue;
            };
            let out_path = output_dir.join(out_name);

            info!(file = ?path, "processing");
            match self.process_file(&path, &out_path) {
                Ok(report) => {
                    info!(
                        file = ?path,
                        output = ?out_path,
                        chunks = report.chunks,
                        "{} → {} bytes",
                        report.input_bytes,
                        report.output_bytes
                    );
                    files.push(report);
                }
                Err(e) => {
                    error!(file = ?path, "failed: {e:#}");
                    files.push(FileReport::failed(&path, &e));
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, "some inputs were skipped");
        }

        Ok(BatchReport {
            mode: self.mode,
            codec: self.codec.as_ref().map(|c| c.name().to_string()),
            config: self.config.clone(),
            files,
            skipped,
            elapsed_secs: t0.elapsed().as_secs_f64(),
        })
    }

    /// Read, transform and write a single file.
    ///
    /// Nothing is written unless the whole payload succeeded.
    pub fn process_file(&self, input: &Path, output: &Path) -> anyhow::Result<FileReport> {
        let payload = fs::read(input).with_context(|| format!("reading {:?}", input))?;

        let codec = match &self.codec {
            Some(codec) => codec.clone(),
            None => match peek_codec_id(&payload)? {
                Some(id) => codec_by_id(id)?,
                // Empty input: no frames, any codec decodes it to nothing.
                None => Arc::new(pcz_codecs::PassThroughCodec),
            },
        };

        let pipeline = Pipeline::new(codec, self.config.clone())?;
        let progress = LogProgress::new(input.display().to_string());
        let transformed = pipeline
            .process(&payload, self.mode, &progress)
            .with_context(|| format!("{} of {:?}", self.mode, input))?;

        fs::write(output, &transformed).with_context(|| format!("writing {:?}", output))?;
        debug!(chunks = progress.total(), completed = progress.done(), "file written");

        Ok(FileReport {
            input: input.to_path_buf(),
            output: Some(output.to_path_buf()),
            input_bytes: payload.len() as u64,
            output_bytes: transformed.len() as u64,
            chunks: progress.total(),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcz_codecs::ZlibCodec;

    fn config() -> PipelineConfig {
        PipelineConfig::new(64, 3)
    }

    fn write(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("a.txt", Mode::Encode).as_deref(), Some("a.txt.compressed"));
        assert_eq!(output_name("a.txt.compressed", Mode::Decode).as_deref(), Some("a.txt"));
        // Exactly one suffix is stripped.
        assert_eq!(
            output_name("a.compressed.compressed", Mode::Decode).as_deref(),
            Some("a.compressed")
        );
        assert_eq!(output_name("a.compressed.txt", Mode::Decode), None);
        assert_eq!(output_name(".compressed", Mode::Decode), None);
        assert_eq!(output_name("plain.bin", Mode::Decode), None);
    }

    #[test]
    fn test_tree_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let packed = dir.path().join("packed");
        let unpacked = dir.path().join("unpacked");

        let big: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        write(&src.join("big.bin"), &big);
        write(&src.join("nested/deeper/notes.txt"), b"some notes, nested two levels down");
        write(&src.join("empty.dat"), b"");

        let report = BatchRunner::compress(Arc::new(ZlibCodec::default()), config())
            .run(&src, &packed)
            .unwrap();
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.failed(), 0);
        assert!(packed.join("big.bin.compressed").is_file());
        // Outputs are flattened into the output directory.
        assert!(packed.join("notes.txt.compressed").is_file());
        assert!(packed.join("empty.dat.compressed").is_file());

        let report = BatchRunner::decompress(config()).run(&packed, &unpacked).unwrap();
        assert_eq!(report.succeeded(), 3);
        assert_eq!(fs::read(unpacked.join("big.bin")).unwrap(), big);
        assert_eq!(
            fs::read(unpacked.join("notes.txt")).unwrap(),
            b"some notes, nested two levels down"
        );
        assert!(fs::read(unpacked.join("empty.dat")).unwrap().is_empty());
    }

    #[test]
    fn test_decompress_skips_foreign_files_and_continues_past_corrupt_ones() {
        let dir = tempfile::tempdir().unwrap();
        let packed = dir.path().join("packed");
        let out = dir.path().join("out");

        let pipeline = Pipeline::new(Arc::new(ZlibCodec::default()), config()).unwrap();
        let good = pipeline.encode(&[7u8; 500]).unwrap();
        let mut bad = good.clone();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        write(&packed.join("a_bad.bin.compressed"), &bad);
        write(&packed.join("b_good.bin.compressed"), &good);
        write(&packed.join("readme.txt"), b"not compressed");

        let report = BatchRunner::decompress(config()).run(&packed, &out).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.failed(), 1);

        let failure = &report.files[0];
        assert!(failure.input.ends_with("a_bad.bin.compressed"));
        let message = failure.error.as_deref().unwrap();
        assert!(message.contains("corrupt chunk"), "got: {message}");
        assert!(!out.join("a_bad.bin").exists(), "no partial output on failure");

        assert_eq!(fs::read(out.join("b_good.bin")).unwrap(), vec![7u8; 500]);
    }

    #[test]
    fn test_existing_output_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.bin");
        let out = dir.path().join("out");
        write(&input, b"fresh contents");
        write(&out.join("data.bin.compressed"), b"stale");

        let report = BatchRunner::compress(Arc::new(ZlibCodec::default()), config())
            .run(&input, &out)
            .unwrap();
        assert_eq!(report.failed(), 0);

        let packed = fs::read(out.join("data.bin.compressed")).unwrap();
        assert_ne!(packed, b"stale");
        let pipeline = Pipeline::new(Arc::new(ZlibCodec::default()), config()).unwrap();
        assert_eq!(pipeline.decode(&packed).unwrap(), b"fresh contents");
    }

    #[test]
    fn test_invalid_config_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let err = BatchRunner::decompress(PipelineConfig::new(0, 1))
            .run(dir.path(), &dir.path().join("out"))
            .unwrap_err();
        assert!(err.to_string().contains("chunk size"), "got: {err}");
    }

    #[test]
    fn test_report_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("x.bin");
        write(&input, b"xyz");
        let report = BatchRunner::compress(Arc::new(ZlibCodec::default()), config())
            .run(&input, &dir.path().join("out"))
            .unwrap();

        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["mode"], "encode");
        assert_eq!(value["codec"], "zlib");
        assert_eq!(value["config"]["chunk_size"], 64);
        assert_eq!(value["files"][0]["input_bytes"], 3);
    }
}
