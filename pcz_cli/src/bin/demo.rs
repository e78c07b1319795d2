//! pcz demo
//!
//! Generates a deterministic synthetic access-log payload, runs it through
//! the chunk pipeline at several worker counts, and compares the result
//! against a single-stream gzip baseline. Every pipeline run is decoded
//! again and checked byte for byte.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;

use pcz_codecs::{Lz4Codec, ZlibCodec, ZstdCodec};
use pcz_core::format::frames;
use pcz_core::{split, Codec, Pipeline, PipelineConfig, ProgressCounter};

// ── constants ──────────────────────────────────────────────────────────────

const TARGET_RAW_BYTES: usize = 32 * 1024 * 1024;

/// Chunk size for the worked example: 2.5 MB payload, 1 MB chunks.
const SCENARIO_BYTES: usize = 2_500_000;
const SCENARIO_CHUNK: usize = 1_000_000;
const SCENARIO_WORKERS: usize = 4;

const IPS: &[&str] = &[
    "203.0.113.42", "198.51.100.77", "192.0.2.15", "10.10.10.88",
    "172.16.254.1", "203.0.113.99", "198.51.100.3", "192.0.2.200",
];
const METHODS: &[&str] = &["GET", "GET", "GET", "POST", "PUT", "DELETE"];
const PATHS: &[&str] = &[
    "/api/v1/catalog/items?page={page}",
    "/api/v1/orders/{id}/status",
    "/api/v1/users/{id}/profile",
    "/api/v1/search?q=laptop&page={page}",
    "/static/assets/bundle.js",
    "/health",
];
const STATUSES: &[(u16, u32)] = &[
    (200, 4821), (200, 1204), (201, 312), (304, 0),
    (400, 188),  (404, 95),   (200, 22480), (500, 512),
];

// ── data generator ──────────────────────────────────────────────────────────

/// Deterministic access-log line for entry `i`.
fn generate_log_line(i: u64) -> Vec<u8> {
    let ip     = IPS[(i as usize * 7 + 3) % IPS.len()];
    let method = METHODS[(i as usize * 3 + 1) % METHODS.len()];
    let path   = PATHS[(i as usize * 11 + 5) % PATHS.len()]
        .replace("{page}", &((i % 200) + 1).to_string())
        .replace("{id}", &(i * 13 % 9_999_999).to_string());
    let (status, size) = STATUSES[(i as usize * 5 + 2) % STATUSES.len()];
    let lat_ms = (((i * 137 + 42) % 900) + 10) as f64 / 100.0;

    let ts = 1_740_268_800u64 + (i * 7) % (86400 * 30);
    let (h, m, s) = ((ts / 3600) % 24, (ts / 60) % 60, ts % 60);

    format!(
        "{ip} - - [{h:02}:{m:02}:{s:02}] \"{method} {path} HTTP/1.1\" {status} {size} {lat_ms:.3}\n"
    )
    .into_bytes()
}

fn generate_payload(target: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(target + 256);
    let mut i = 0u64;
    while out.len() < target {
        out.extend_from_slice(&generate_log_line(i));
        i += 1;
    }
    out.truncate(target);
    out
}

// ── timing ──────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const U: &[&str] = &["B", "KB", "MB", "GB"];
    let mut v = n as f64;
    let mut u = 0;
    while v >= 1024.0 && u < U.len() - 1 { v /= 1024.0; u += 1; }
    if u == 0 { format!("{n} B") } else { format!("{v:.2} {}", U[u]) }
}

fn fmt_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms < 1.0 {
        format!("{:.1} µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{ms:.1} ms")
    } else {
        format!("{:.2} s", d.as_secs_f64())
    }
}

fn throughput(bytes: usize, d: Duration) -> String {
    format!("{}/s", human_bytes((bytes as f64 / d.as_secs_f64().max(1e-9)) as u64))
}

// ── pipeline runs ───────────────────────────────────────────────────────────

struct Run {
    encoded_len: usize,
    encode: Duration,
    decode: Duration,
}

/// Encode and decode `payload`, failing if the round trip is not exact.
fn run_pipeline(payload: &[u8], codec: Arc<dyn Codec>, config: PipelineConfig) -> Result<Run> {
    let pipeline = Pipeline::new(codec, config)?;

    let t0 = Instant::now();
    let encoded = pipeline.encode(payload)?;
    let encode = t0.elapsed();

    let t0 = Instant::now();
    let decoded = pipeline.decode(&encoded)?;
    let decode = t0.elapsed();

    if decoded != payload {
        anyhow::bail!("round trip mismatch with codec {}", pipeline.codec().name());
    }
    Ok(Run { encoded_len: encoded.len(), encode, decode })
}

fn gzip_baseline(payload: &[u8]) -> Result<(usize, Duration)> {
    let t0 = Instant::now();
    let mut enc = GzEncoder::new(Vec::new(), GzCompression::default());
    enc.write_all(payload)?;
    let out = enc.finish()?;
    Ok((out.len(), t0.elapsed()))
}

// ── demo runner ─────────────────────────────────────────────────────────────

fn run() -> Result<()> {
    let cpus = PipelineConfig::default().worker_count;

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║             pcz · chunk-parallel compression demo              ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // ── Phase 0: the worked scenario ──────────────────────────────────────────
    section("0 · SCENARIO  2.5 MB payload, 1 MB chunks, 4 workers");

    let scenario = generate_payload(SCENARIO_BYTES);
    let lens: Vec<usize> = split(&scenario, SCENARIO_CHUNK)?.map(|c| c.bytes.len()).collect();
    println!("  chunks         : {} {:?}", lens.len(), lens);

    let pipeline = Pipeline::new(
        Arc::new(ZlibCodec::default()),
        PipelineConfig::new(SCENARIO_CHUNK, SCENARIO_WORKERS),
    )?;
    let progress = ProgressCounter::new();
    let encoded = pipeline.process(&scenario, pcz_core::Mode::Encode, &progress)?;
    println!("  progress       : {}/{} chunks", progress.done(), progress.total());
    for frame in frames(&encoded) {
        let frame = frame?;
        println!(
            "  frame {:<8} : raw {:>10}  →  compressed {:>10}",
            frame.index,
            human_bytes(frame.header.raw_len as u64),
            human_bytes(frame.header.compressed_len as u64)
        );
    }
    let restored = pipeline.decode(&encoded)?;
    println!(
        "  round trip     : {}",
        if restored == scenario { "✓ identical" } else { "⚠ MISMATCH" }
    );

    // ── Phase 1: data generation ──────────────────────────────────────────────
    section("1 · DATA GENERATION");
    eprint!("  generating {} of synthetic access logs ", human_bytes(TARGET_RAW_BYTES as u64));
    let t0 = Instant::now();
    let payload = generate_payload(TARGET_RAW_BYTES);
    eprintln!("done  ({:.2}s)", t0.elapsed().as_secs_f64());
    let sample = String::from_utf8_lossy(&generate_log_line(42)).trim_end().to_string();
    println!("  sample line    : {sample}");

    // ── Phase 2: codecs at full parallelism ──────────────────────────────────
    section(&format!("2 · CODECS  (chunk=1 MB, workers={cpus})"));
    println!("  {:<16} {:>12}  {:>8}  {:>14}  {:>14}",
             "Codec", "Compressed", "Ratio", "Encode", "Decode");
    println!("  {}", "─".repeat(70));

    let codecs: Vec<Arc<dyn Codec>> = vec![
        Arc::new(ZlibCodec::default()),
        Arc::new(ZstdCodec::default()),
        Arc::new(Lz4Codec),
    ];
    for codec in codecs {
        let name = codec.name();
        let run = run_pipeline(&payload, codec, PipelineConfig::new(1024 * 1024, cpus))?;
        println!("  {:<16} {:>12}  {:>7.2}x  {:>14}  {:>14}",
            name,
            human_bytes(run.encoded_len as u64),
            payload.len() as f64 / run.encoded_len as f64,
            throughput(payload.len(), run.encode),
            throughput(payload.len(), run.decode));
    }

    let (gz_len, gz_dur) = gzip_baseline(&payload)?;
    println!("  {:<16} {:>12}  {:>7.2}x  {:>14}  {:>14}",
        "gzip (1 stream)",
        human_bytes(gz_len as u64),
        payload.len() as f64 / gz_len as f64,
        throughput(payload.len(), gz_dur),
        "-");

    // ── Phase 3: scaling with worker count ────────────────────────────────────
    section("3 · WORKER SCALING  (zlib, chunk=1 MB)");
    println!("  {:>8}  {:>12}  {:>12}  {:>10}", "workers", "encode", "decode", "speedup");
    println!("  {}", "─".repeat(50));

    let mut counts = vec![1, 2, 4, cpus];
    counts.sort_unstable();
    counts.dedup();

    let mut baseline: Option<Duration> = None;
    for workers in counts {
        let run = run_pipeline(
            &payload,
            Arc::new(ZlibCodec::default()),
            PipelineConfig::new(1024 * 1024, workers),
        )?;
        let base = *baseline.get_or_insert(run.encode);
        println!("  {:>8}  {:>12}  {:>12}  {:>9.2}x",
            workers,
            fmt_duration(run.encode),
            fmt_duration(run.decode),
            base.as_secs_f64() / run.encode.as_secs_f64().max(1e-9));
    }

    println!();
    println!("  Output bytes are identical at every worker count; only wall time changes.");
    println!();
    Ok(())
}

// ── small helpers ──────────────────────────────────────────────────────────

fn section(title: &str) {
    println!();
    println!("━━━ {title} {}", "━".repeat(70usize.saturating_sub(title.len() + 5)));
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
