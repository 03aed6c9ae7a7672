//! Logging configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingOptions {
    /// Base log level (trace, debug, info, warn, error)
    pub level: String,

    /// Also write JSON logs to `log_dir` (requires the `file-logging` feature)
    pub file_logging: bool,

    /// Base directory for per-run log folders
    pub log_dir: PathBuf,

    /// Keep run folders for N days
    pub retention_days: u64,

    /// Keep the N most recent run folders
    pub retention_runs: usize,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        LoggingOptions {
            level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
            retention_days: 30,
            retention_runs: 10,
        }
    }
}
