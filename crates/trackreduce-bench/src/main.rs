//! trackreduce-bench: CLI tool for reduction parameter experimentation and diagnostics.
//!
//! Runs the reduction pipeline on a JSON trace file with configurable
//! parameters, printing detailed per-stage diagnostics. Useful for:
//!
//! - Tuning smoothing, filter noise and simplification threshold
//! - Measuring per-stage durations to identify bottlenecks
//! - Seeing how parameter changes affect resampled and kept point counts
//! - Comparing raw and reduced traces visually (`--svg`)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin trackreduce-bench -- [OPTIONS] <TRACE_PATH>
//! ```
//!
//! Set `RUST_LOG=debug` to see per-stage pipeline logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use trackreduce_pipeline::diagnostics::{Clock, ReductionDiagnostics};
use trackreduce_pipeline::{Point, Polyline, ReduceConfig};

/// Reduction parameter experimentation and diagnostics for trackreduce.
///
/// Runs the reduction pipeline on a trace with configurable parameters
/// and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "trackreduce-bench", version)]
struct Cli {
    /// Path to the input trace: a JSON array of `[longitude, latitude]` pairs.
    trace_path: PathBuf,

    /// Moving-average half-window, in resampled points.
    #[arg(long, default_value_t = ReduceConfig::DEFAULT_SMOOTHING)]
    smoothing: u32,

    /// Velocity filter process-noise magnitude.
    #[arg(long, default_value_t = ReduceConfig::DEFAULT_NOISE)]
    noise: f64,

    /// Simplification tolerance in meters.
    #[arg(long, default_value_t = ReduceConfig::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Write the reduced trace as JSON to file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write an SVG overlay of the raw and reduced trace to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full reduction config as a JSON string.
    ///
    /// When provided, all other reduction parameter flags are ignored.
    /// The JSON must be a valid `ReduceConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`ReduceConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<ReduceConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(ReduceConfig {
        smoothing: cli.smoothing,
        noise: cli.noise,
        threshold: cli.threshold,
    })
}

/// Parse a trace from its JSON text.
fn parse_trace(json: &str) -> Result<Polyline, String> {
    let pairs: Vec<[f64; 2]> =
        serde_json::from_str(json).map_err(|e| format!("Error parsing trace: {e}"))?;
    Ok(pairs.into_iter().map(Point::from).collect())
}

/// Serialize a trace back to the `[longitude, latitude]` pair format.
fn trace_to_json(trace: &Polyline) -> Result<String, String> {
    let pairs: Vec<[f64; 2]> = trace.points().iter().map(|p| [p.x, p.y]).collect();
    serde_json::to_string_pretty(&pairs).map_err(|e| format!("Error serializing trace: {e}"))
}

fn load_trace(path: &Path) -> Result<Polyline, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let trace = parse_trace(&text)?;
    log::debug!("loaded {} fixes from {}", trace.len(), path.display());
    Ok(trace)
}

/// Write the raw trace in grey with the reduction on top.
fn write_svg(
    svg_path: &Path,
    cli: &Cli,
    config: &ReduceConfig,
    source: &Polyline,
    reduced: &Polyline,
) {
    let title = cli
        .trace_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bench");
    let desc = format!(
        "{} fixes reduced to {} (smoothing={} noise={} threshold={})",
        source.len(),
        reduced.len(),
        config.smoothing,
        config.noise,
        config.threshold,
    );
    let config_json = serde_json::to_string(config).ok();
    let metadata = trackreduce_export::SvgMetadata {
        title: Some(title),
        description: Some(&desc),
        config_json: config_json.as_deref(),
    };
    let svg = trackreduce_export::to_svg(
        &[
            trackreduce_export::SvgLayer::line(source, "#9e9e9e", 1.0),
            trackreduce_export::SvgLayer::line(reduced, "#d32f2f", 2.0).with_markers(3.0),
        ],
        &metadata,
    );
    match std::fs::write(svg_path, &svg) {
        Ok(()) => {
            eprintln!(
                "SVG written to {} ({} bytes)",
                svg_path.display(),
                svg.len(),
            );
        }
        Err(e) => {
            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
        }
    }
}

fn write_output(output_path: &Path, reduced: &Polyline) -> Result<(), String> {
    let json = trace_to_json(reduced)?;
    std::fs::write(output_path, json)
        .map_err(|e| format!("Error writing {}: {e}", output_path.display()))?;
    eprintln!(
        "Reduced trace written to {} ({} fixes)",
        output_path.display(),
        reduced.len(),
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let trace = match load_trace(&cli.trace_path) {
        Ok(trace) => trace,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Trace: {} ({} fixes)", cli.trace_path.display(), trace.len());
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match trackreduce_pipeline::diagnostics::reduce_with_diagnostics(&trace, &config, &StdClock)
        {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write files on the first run only.
                if run == 0 {
                    if let Some(ref output_path) = cli.output
                        && let Err(msg) = write_output(output_path, &staged.reduced)
                    {
                        eprintln!("{msg}");
                        return ExitCode::FAILURE;
                    }
                    if let Some(ref svg_path) = cli.svg {
                        write_svg(svg_path, &cli, &config, &staged.source, &staged.reduced);
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Reduction error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&ReductionDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[ReductionDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Project", |d| d.project.duration),
        ("Resample", |d| d.resample.duration),
        ("Smooth", |d| d.smooth.duration),
        ("Filter", |d| d.filter.duration),
        ("Visvalingam", |d| d.visvalingam.duration),
        ("Douglas-Peucker", |d| d.douglas_peucker.duration),
        ("Unproject", |d| d.unproject.duration),
    ];

    for (name, extractor) in stage_extractors {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
