mod batch;
mod progress;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use pcz_codecs::{codec_by_id, codec_by_name, CODEC_NAMES};
use pcz_core::format::frames;
use pcz_core::{PipelineConfig, DEFAULT_CHUNK_SIZE};

use batch::{BatchReport, BatchRunner};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pcz",
    about = "Chunk-parallel compression for files and directory trees",
    version
)]
struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Tunables shared by `compress` and `decompress`.
#[derive(Args)]
struct PipelineArgs {
    /// Raw bytes per chunk (decompression takes boundaries from the frames)
    #[arg(short = 's', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    /// Parallel workers per file (default: number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Write a JSON report of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl PipelineArgs {
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig {
            chunk_size: self.chunk_size,
            ..PipelineConfig::default()
        };
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file or every file under a directory
    Compress {
        /// Source file or directory
        input: PathBuf,
        /// Directory receiving `<name>.compressed` outputs
        output_dir: PathBuf,
        /// Codec to use: zlib | zstd | lz4 | passthrough
        #[arg(short, long, default_value = "zlib")]
        codec: String,
        /// Compression level (zlib 0-9, zstd 1-22)
        #[arg(short, long)]
        level: Option<i32>,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Decompress every `.compressed` file under a directory
    Decompress {
        /// Source file or directory
        input: PathBuf,
        /// Directory receiving the restored files
        output_dir: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Print frame statistics for a compressed file
    Inspect {
        /// Compressed file to inspect
        file: PathBuf,
        /// Print per-frame details
        #[arg(long)]
        frames: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{}'", level))?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
    Ok(())
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn ratio(raw: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        1.0
    } else {
        raw as f64 / compressed as f64
    }
}

fn print_summary(report: &BatchReport) {
    let (raw, packed) = match report.mode {
        pcz_core::Mode::Encode => (report.input_bytes(), report.output_bytes()),
        pcz_core::Mode::Decode => (report.output_bytes(), report.input_bytes()),
    };

    eprintln!();
    if let Some(codec) = &report.codec {
        eprintln!("  codec       : {}", codec);
    }
    eprintln!("  chunk size  : {}", human_bytes(report.config.chunk_size as u64));
    eprintln!("  workers     : {}", report.config.worker_count);
    eprintln!(
        "  files       : {} ok, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped
    );
    eprintln!("  raw size    : {}", human_bytes(raw));
    eprintln!("  compressed  : {}", human_bytes(packed));
    eprintln!("  ratio       : {:.2}x", ratio(raw, packed));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((raw as f64 / report.elapsed_secs.max(1e-9)) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", report.elapsed_secs);
}

fn finish_batch(report: BatchReport, report_path: Option<&Path>) -> anyhow::Result<()> {
    print_summary(&report);
    if let Some(path) = report_path {
        report.write_json(path)?;
        eprintln!("  report      : {:?}", path);
    }

    let failed = report.failed();
    if failed > 0 {
        for file in report.files.iter().filter(|f| f.error.is_some()) {
            eprintln!(
                "  failed      : {:?}: {}",
                file.input,
                file.error.as_deref().unwrap_or_default()
            );
        }
        anyhow::bail!("{} of {} files failed", failed, report.files.len());
    }
    Ok(())
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output_dir: PathBuf,
    codec_name: &str,
    level: Option<i32>,
    args: PipelineArgs,
) -> anyhow::Result<()> {
    let codec = codec_by_name(codec_name, level)?;
    let report = BatchRunner::compress(codec, args.config()).run(&input, &output_dir)?;
    finish_batch(report, args.report.as_deref())
}

fn run_decompress(input: PathBuf, output_dir: PathBuf, args: PipelineArgs) -> anyhow::Result<()> {
    let report = BatchRunner::decompress(args.config()).run(&input, &output_dir)?;
    finish_batch(report, args.report.as_deref())
}

fn run_inspect(file: PathBuf, show_frames: bool) -> anyhow::Result<()> {
    let data = std::fs::read(&file).with_context(|| format!("reading {:?}", file))?;

    if show_frames {
        println!(
            "  {:>8}  {:>14}  {:>8}  {:>12}  {:>12}  {:>16}",
            "frame", "offset", "codec", "compressed", "raw", "checksum"
        );
        println!("  {}", "-".repeat(80));
    }

    let mut count = 0u64;
    let mut raw_total = 0u64;
    let mut codec_ids = Vec::new();
    for frame in frames(&data) {
        let frame = frame?;
        count += 1;
        raw_total += frame.header.raw_len as u64;
        if !codec_ids.contains(&frame.header.codec_id) {
            codec_ids.push(frame.header.codec_id);
        }
        if show_frames {
            println!(
                "  {:>8}  {:>14}  {:>8}  {:>12}  {:>12}  {:016x}",
                frame.index,
                frame.offset,
                frame.header.codec_id,
                human_bytes(frame.header.compressed_len as u64),
                human_bytes(frame.header.raw_len as u64),
                frame.header.checksum
            );
        }
    }

    let codecs: Vec<String> = codec_ids
        .iter()
        .map(|&id| match codec_by_id(id) {
            Ok(codec) => format!("{} (id={})", codec.name(), id),
            Err(_) => format!("unknown (id={})", id),
        })
        .collect();

    if show_frames {
        println!();
    }
    println!("=== {:?} ===", file);
    println!();
    println!("  codec          : {}", if codecs.is_empty() { "-".to_string() } else { codecs.join(", ") });
    println!("  frames         : {}", count);
    println!("  raw size       : {}", human_bytes(raw_total));
    println!("  file on disk   : {}", human_bytes(data.len() as u64));
    println!("  ratio          : {:.2}x", ratio(raw_total, data.len() as u64));
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    tracing::debug!(codecs = ?CODEC_NAMES, "pcz starting");

    match cli.command {
        Commands::Compress {
            input,
            output_dir,
            codec,
            level,
            pipeline,
        } => run_compress(input, output_dir, &codec, level, pipeline),
        Commands::Decompress {
            input,
            output_dir,
            pipeline,
        } => run_decompress(input, output_dir, pipeline),
        Commands::Inspect { file, frames } => run_inspect(file, frames),
    }
}
