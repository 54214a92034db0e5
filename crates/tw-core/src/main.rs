//! Threshold Watch - Adaptive Threshold Engine
//!
//! The CLI entry point for tw-core, handling:
//! - Streaming JSONL metric points and feedback from stdin into the engine
//! - Emitting threshold/anomaly events as JSONL on stdout
//! - Configuration validation
//!
//! Exit codes: 0 clean, 10 configuration error, 20 runtime error.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use tw_common::types::MetricPoint;
use tw_common::StructuredError;
use tw_config::{load_config, resolve_config, EngineConfig};
use tw_core::engine::{AdaptiveEngine, EngineError, EngineOptions};
use tw_core::events::JsonlWriter;
use tw_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat};

const EXIT_CLEAN: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 10;
const EXIT_RUNTIME_ERROR: u8 = 20;

/// Threshold Watch - adaptive thresholds for API metric streams
#[derive(Parser)]
#[command(name = "tw-core")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to engine.json (overrides discovery)
    #[arg(long, global = true, env = "THRESHOLD_WATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log format: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against JSONL records on stdin
    ///
    /// Accepts two record shapes, one per line:
    ///   {"metric":"checkout-latency","value":210.5,"timestamp":"2026-08-06T12:00:00Z"}
    ///   {"metric":"checkout-latency","was_useful":false}
    Run,

    /// Validate the engine configuration and exit
    Check,
}

/// One stdin line: either a raw metric point or alert-outcome feedback.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IngestRecord {
    Feedback { metric: String, was_useful: bool },
    Point(MetricPoint),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env(cli.global.log_format));

    let config = match resolve_and_load(cli.global.config.as_deref()) {
        Ok((config, source)) => {
            info!(source = %source, "engine configuration resolved");
            config
        }
        Err(err) => {
            warn!(%err, "configuration error");
            eprintln!("configuration error: {err}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match cli.command {
        Commands::Check => {
            println!("configuration OK");
            ExitCode::from(EXIT_CLEAN)
        }
        Commands::Run => run_stream(config),
    }
}

fn resolve_and_load(
    explicit: Option<&std::path::Path>,
) -> Result<(EngineConfig, tw_config::ConfigSource), tw_config::ConfigError> {
    let paths = resolve_config(explicit);
    match paths.engine {
        Some(path) => Ok((load_config(&path)?, paths.engine_source)),
        None => Ok((EngineConfig::default(), paths.engine_source)),
    }
}

fn run_stream(config: EngineConfig) -> ExitCode {
    let run_id = generate_run_id();
    info!(run_id = %run_id, "starting threshold engine");

    let options = EngineOptions {
        emitter: Some(Arc::new(JsonlWriter::new(std::io::stdout()))),
        ..EngineOptions::default()
    };
    let engine = AdaptiveEngine::with_options(config, options);

    let stdin = std::io::stdin();
    let mut submitted: u64 = 0;
    let mut dropped: u64 = 0;
    let mut malformed: u64 = 0;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "stdin read failed, shutting down");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<IngestRecord>(&line) {
            Ok(IngestRecord::Point(point)) => match engine.submit(point) {
                Ok(()) => submitted += 1,
                Err(EngineError::Closed) => break,
                Err(err) => {
                    // Backpressure surfaced; this ingress chooses to drop.
                    dropped += 1;
                    let structured = StructuredError::from(&tw_common::Error::from(err));
                    warn!(
                        code = structured.code,
                        recoverable = structured.recoverable,
                        "point dropped: {}",
                        structured.message
                    );
                }
            },
            Ok(IngestRecord::Feedback { metric, was_useful }) => {
                if engine.record_feedback(&metric, was_useful).is_err() {
                    break;
                }
            }
            Err(err) => {
                malformed += 1;
                warn!(%err, "malformed input line skipped");
            }
        }
    }

    engine.shutdown();

    for metric in engine.metrics() {
        if let Some(snapshot) = engine.snapshot(&metric) {
            info!(
                metric = %metric,
                threshold = snapshot.current_threshold,
                points = snapshot.points_seen,
                adjustments = snapshot.adjustment_history.len(),
                "final state"
            );
        }
    }
    info!(run_id = %run_id, submitted, dropped, malformed, "engine stopped");

    if malformed > 0 && submitted == 0 {
        return ExitCode::from(EXIT_RUNTIME_ERROR);
    }
    ExitCode::from(EXIT_CLEAN)
}
