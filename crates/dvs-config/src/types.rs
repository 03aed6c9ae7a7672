// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `dvs_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DvsConfig {
    pub streaming: StreamingConfig,
    pub parameter_sync: ParameterSyncConfig,
    pub device: DeviceConfig,
    pub publisher: PublisherConfig,
    pub logging: LoggingConfig,
}

/// Acquisition and publish loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Target flushes per second
    pub rate_hz: f64,
    /// Poll sleep is `1 / rate_hz / poll_divisor`
    pub poll_divisor: u32,
    /// Upper bound on a single poll sleep, keeps shutdown responsive at low rates
    pub max_poll_sleep_ms: u64,
    /// Skip the publish call when no events accumulated since the last flush
    pub skip_empty_batches: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            rate_hz: 30.0,
            poll_divisor: 10,
            max_poll_sleep_ms: 50,
            skip_empty_batches: true,
        }
    }
}

/// Parameter sync actor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterSyncConfig {
    pub tick_ms: u64,
}

impl Default for ParameterSyncConfig {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}

/// Device selection and initial bias configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device backend (only "simulated" ships with this workspace)
    pub kind: String,
    /// Mean synthetic event rate for the simulated device (events/s)
    pub event_rate_hz: f64,
    pub width: u16,
    pub height: u16,
    /// Seed for the simulated event stream
    pub seed: u64,
    /// Biases submitted once at startup
    pub bias: BiasSection,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: "simulated".to_string(),
            event_rate_hz: 100_000.0,
            width: 128,
            height: 128,
            seed: 0x5eed,
            bias: BiasSection::default(),
        }
    }
}

/// The twelve DVS128 analog biases, keyed by their device names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BiasSection {
    pub cas: u32,
    #[serde(rename = "injGnd")]
    pub inj_gnd: u32,
    #[serde(rename = "reqPd")]
    pub req_pd: u32,
    #[serde(rename = "puX")]
    pub pu_x: u32,
    #[serde(rename = "diffOff")]
    pub diff_off: u32,
    pub req: u32,
    pub refr: u32,
    #[serde(rename = "puY")]
    pub pu_y: u32,
    #[serde(rename = "diffOn")]
    pub diff_on: u32,
    pub diff: u32,
    pub foll: u32,
    pub pr: u32,
}

impl Default for BiasSection {
    fn default() -> Self {
        Self {
            cas: 1992,
            inj_gnd: 1_108_364,
            req_pd: 16_777_215,
            pu_x: 8_159_221,
            diff_off: 132,
            req: 309_590,
            refr: 969,
            pu_y: 16_777_215,
            diff_on: 209_996,
            diff: 13_125,
            foll: 271,
            pr: 217,
        }
    }
}

/// Publisher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub topic: String,
    /// Bound for channel-backed publishers
    pub channel_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            topic: "dvs_events".to_string(),
            channel_capacity: 1,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("./logs"),
            file_logging: false,
        }
    }
}
