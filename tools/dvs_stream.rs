// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! dvs-stream: run the event streamer against the configured device
//!
//! Usage:
//!   dvs-stream [--config dvs_configuration.toml] [--rate 60] [--duration-secs 10]
//!   dvs-stream --debug-dvs-streamer

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use dvs_stream::config::{
    apply_cli_overrides, apply_environment_overrides, load_config, validate_config, ConfigError,
    DvsConfig,
};
use dvs_stream::observability::{init_logging, parse_debug_flags};
use dvs_stream::setup;
use dvs_stream::streamer::{StreamOptions, StreamReport, StreamRuntime};

/// DVS event streamer - rate-limited event batches with live bias updates
#[derive(Parser, Debug)]
#[command(name = "dvs-stream", version, author, long_about = None)]
struct Args {
    /// Path to the configuration file (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Streaming rate in Hz (overrides the config file)
    #[arg(short, long)]
    rate: Option<f64>,

    /// Simulated event rate in events per second
    #[arg(long)]
    event_rate: Option<f64>,

    /// Stop after this many seconds (runs until Ctrl+C when omitted)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    // --debug-<crate> flags are read by the observability crate, not clap
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));

    let config = load(&args)?;

    let debug_flags = parse_debug_flags();
    let mut logging = setup::logging_options(&config.logging);
    if args.verbose {
        logging.level = "debug".to_string();
    }
    let log_guard = init_logging(&debug_flags, &logging)?;

    print_banner();
    if let Some(dir) = log_guard.log_dir() {
        info!("  Log folder: {}", dir.display());
    }
    info!("  Streaming rate: {} Hz", config.streaming.rate_hz);
    info!("  Device: {} ({} events/s)", config.device.kind, config.device.event_rate_hz);
    info!("  Topic: {}", config.publisher.topic);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Shutdown signal received...");
        r.store(false, Ordering::SeqCst);
    })?;

    let report = run(&config, &running, args.duration_secs.map(Duration::from_secs))?;

    info!(
        "✅ Shutdown complete: {} batches, {} events, {} dropped batches, {} bias updates ({} failed)",
        report.acquisition.flushes,
        report.acquisition.events,
        report.acquisition.dropped_batches,
        report.parameter_sync.applied,
        report.parameter_sync.failed
    );
    Ok(())
}

/// Config file, then environment, then command line
fn load(args: &Args) -> Result<DvsConfig> {
    let mut cli_overrides = HashMap::new();
    if let Some(rate) = args.rate {
        cli_overrides.insert("rate".to_string(), rate.to_string());
    }
    if let Some(event_rate) = args.event_rate {
        cli_overrides.insert("event_rate".to_string(), event_rate.to_string());
    }

    let config = match load_config(args.config.as_deref(), Some(&cli_overrides)) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(searched)) if args.config.is_none() => {
            eprintln!("No configuration file found ({}), using defaults", searched);
            let mut config = DvsConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, &cli_overrides);
            config
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

fn run(config: &DvsConfig, running: &AtomicBool, duration: Option<Duration>) -> Result<StreamReport> {
    let device = Arc::new(setup::build_device(&config.device)?);
    let settings = Arc::new(setup::build_settings(config)?);
    let topic = setup::spawn_topic_publisher(config)?;

    let runtime = StreamRuntime::start(
        device,
        Arc::new(topic.publisher),
        settings,
        StreamOptions::from_config(config),
    )?;

    // Initial configuration goes through the same path as later updates
    runtime
        .handler()
        .submit_config(setup::initial_bias(config), config.streaming.rate_hz)?;

    info!("🔄 Streaming (Press Ctrl+C to stop)...");
    let deadline = duration.map(|d| Instant::now() + d);
    while running.load(Ordering::SeqCst) {
        if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            info!("Run duration reached");
            break;
        }
        if runtime.acquisition_finished() {
            warn!("Acquisition stopped unexpectedly");
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }

    let result = runtime.stop();
    match topic.relay.join() {
        Ok(forwarded) => info!("  Relay forwarded {} batches", forwarded),
        Err(_) => error!("Topic relay thread panicked"),
    }
    Ok(result?)
}

fn print_banner() {
    info!("╔═══════════════════════════════════════╗");
    info!("║            DVS Event Stream           ║");
    info!("╚═══════════════════════════════════════╝");
}
