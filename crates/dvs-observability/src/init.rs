// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output is always installed. With the `file-logging` feature and
//! `LoggingOptions::file_logging` set, a JSON log file is also written into a
//! timestamped run folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── dvs-stream.log
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::LoggingOptions;

/// Keeps background log writers alive; logs are flushed when dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder for this process, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global tracing subscriber
///
/// # Errors
/// Fails if a global subscriber is already installed, or the log folder
/// cannot be created.
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&options.level);

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_filter(EnvFilter::new(&filter))
        .boxed();
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let (file_guards, log_dir) = if options.file_logging {
        let (layer, guard, run_folder) = file_layer(&filter, options)?;
        layers.push(layer);
        (vec![guard], Some(run_folder))
    } else {
        (Vec::new(), None)
    };

    #[cfg(not(feature = "file-logging"))]
    let log_dir = {
        if options.file_logging {
            eprintln!("Warning: file logging requested but the `file-logging` feature is disabled");
        }
        None
    };

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
    })
}

#[cfg(feature = "file-logging")]
fn file_layer(
    filter: &str,
    options: &LoggingOptions,
) -> Result<(BoxedLayer, tracing_appender::non_blocking::WorkerGuard, PathBuf)> {
    use anyhow::Context;
    use chrono::Utc;
    use tracing_appender::rolling;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let run_folder = options.log_dir.join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_logs(&options.log_dir, options.retention_days, options.retention_runs, &run_folder)?;

    let appender = rolling::daily(&run_folder, "dvs-stream.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(EnvFilter::new(filter))
        .boxed();

    Ok((layer, guard, run_folder))
}

/// Remove run folders older than `retention_days`, then trim to the newest
/// `retention_runs`. The current run folder is never removed.
#[cfg(feature = "file-logging")]
fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
    current_run: &Path,
) -> Result<()> {
    use chrono::{DateTime, NaiveDateTime, Utc};

    let cutoff_date = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() || path == current_run {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("run_"))
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y%m%d_%H%M%S").ok());
        if let Some(stamp) = stamp {
            runs.push((path, stamp.and_utc()));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, dt)| *dt);

    // The current run counts towards the retained total
    let keep_previous = retention_runs.saturating_sub(1);
    let excess = runs.len().saturating_sub(keep_previous);

    for (index, (path, dt)) in runs.iter().enumerate() {
        if *dt < cutoff_date || index < excess {
            if let Err(e) = std::fs::remove_dir_all(path) {
                eprintln!("Warning: Failed to remove old log directory {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}
