// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # dvs-stream
//!
//! Streams events from a dynamic vision sensor to a downstream consumer at a
//! controlled flush rate, with bias parameters reconfigurable while the
//! stream keeps running.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! dvs-stream = "0.1"
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dvs_stream::prelude::*;
//! use dvs_stream::setup;
//!
//! let config = load_config(None, None)?;
//! let device = Arc::new(setup::build_device(&config.device)?);
//! let settings = Arc::new(setup::build_settings(&config)?);
//! let topic = setup::spawn_topic_publisher(&config)?;
//!
//! let runtime = StreamRuntime::start(
//!     device,
//!     Arc::new(topic.publisher),
//!     settings,
//!     StreamOptions::from_config(&config),
//! )?;
//! runtime
//!     .handler()
//!     .submit_config(setup::initial_bias(&config), config.streaming.rate_hz)?;
//!
//! let report = runtime.stop()?;
//! println!("{} batches", report.acquisition.flushes);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  dvs-config: TOML + env + CLI overrides, validation     │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  dvs-streamer: shared settings, parameter sync,         │
//! │  acquisition & publish loop, runtime lifecycle          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  dvs-observability: tracing subscriber, debug flags     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - **`file-logging`**: JSON log files in per-run folders with retention
//!
//! ## License
//!
//! Apache-2.0

pub use dvs_config as config;
pub use dvs_observability as observability;
pub use dvs_streamer as streamer;

pub mod setup;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, validate_config, DvsConfig};
    pub use crate::observability::{init_logging, CrateDebugFlags, LoggingOptions};
    pub use crate::streamer::{
        BatchPublisher, BiasConfig, BiasField, ConfigUpdateHandler, EventDevice, SharedSettings,
        SimulatedDevice, StreamOptions, StreamReport, StreamRuntime, StreamingRate,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_defaults_agree() {
        let config = DvsConfig::default();
        assert_eq!(config.streaming.rate_hz, StreamingRate::default().hz());
        assert_eq!(BiasConfig::from(&config.device.bias), BiasConfig::default());
        assert_eq!(StreamOptions::from_config(&config), StreamOptions::default());
    }
}
