// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, DvsConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "dvs_configuration.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `DVS_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("DVS_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by DVS_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd;
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet DVS_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<DvsConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: DvsConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `DVS_STREAMING_RATE` -> `streaming.rate_hz`
/// - `DVS_POLL_DIVISOR` -> `streaming.poll_divisor`
/// - `DVS_PARAM_TICK_MS` -> `parameter_sync.tick_ms`
/// - `DVS_EVENT_RATE` -> `device.event_rate_hz`
/// - `DVS_LOG_LEVEL` -> `logging.level`
///
/// Unparseable values are ignored.
pub fn apply_environment_overrides(config: &mut DvsConfig) {
    if let Some(rate) = env::var("DVS_STREAMING_RATE").ok().and_then(|v| v.parse().ok()) {
        config.streaming.rate_hz = rate;
    }
    if let Some(divisor) = env::var("DVS_POLL_DIVISOR").ok().and_then(|v| v.parse().ok()) {
        config.streaming.poll_divisor = divisor;
    }
    if let Some(tick) = env::var("DVS_PARAM_TICK_MS").ok().and_then(|v| v.parse().ok()) {
        config.parameter_sync.tick_ms = tick;
    }
    if let Some(rate) = env::var("DVS_EVENT_RATE").ok().and_then(|v| v.parse().ok()) {
        config.device.event_rate_hz = rate;
    }
    if let Ok(value) = env::var("DVS_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"rate": "60", "log_level": "debug"}`)
pub fn apply_cli_overrides(config: &mut DvsConfig, cli_args: &HashMap<String, String>) {
    if let Some(rate) = cli_args.get("rate").and_then(|v| v.parse().ok()) {
        config.streaming.rate_hz = rate;
    }
    if let Some(divisor) = cli_args.get("poll_divisor").and_then(|v| v.parse().ok()) {
        config.streaming.poll_divisor = divisor;
    }
    if let Some(tick) = cli_args.get("param_tick_ms").and_then(|v| v.parse().ok()) {
        config.parameter_sync.tick_ms = tick;
    }
    if let Some(rate) = cli_args.get("event_rate").and_then(|v| v.parse().ok()) {
        config.device.event_rate_hz = rate;
    }
    if let Some(value) = cli_args.get("skip_empty_batches") {
        config.streaming.skip_empty_batches = value.to_lowercase() == "true" || value == "1";
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
