// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # DVS Streamer
//!
//! Streams events from a dynamic vision sensor to a downstream publisher at a
//! controlled flush rate, while bias parameters can be changed at runtime
//! without interrupting the stream.
//!
//! ## Architecture
//!
//! ```text
//!  submit_config ──► ConfigUpdateHandler ──► SharedSettings ◄── one lock
//!                                              │         │
//!                                  bias (dirty)│         │rate
//!                                              ▼         ▼
//!                         ParameterSyncActor        AcquisitionLoop
//!                                 │                   │       │
//!                          apply_bias            poll_events  publish
//!                                 ▼                   ▼       ▼
//!                               EventDevice ◄─────────┘   BatchPublisher
//! ```
//!
//! - The acquisition loop and the parameter sync actor each run on a dedicated
//!   thread and share one cooperative running flag.
//! - Pending biases are last-write-wins: only the most recent submission
//!   reaches the device.
//! - Flushes follow a fixed schedule that never skips ahead. After a stall the
//!   backlog goes out as one oversized batch, then flushes run back to back
//!   until the schedule catches up.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dvs_streamer::{
//!     BiasConfig, LogPublisher, SharedSettings, SimulatedDevice, StreamOptions, StreamRuntime,
//!     StreamingRate,
//! };
//!
//! let device = Arc::new(SimulatedDevice::dvs128(50_000.0, 7));
//! let publisher = Arc::new(LogPublisher::new("dvs_events"));
//! let settings = Arc::new(SharedSettings::new(StreamingRate::default()));
//!
//! let runtime = StreamRuntime::start(device, publisher, settings, StreamOptions::default())?;
//! runtime.handler().submit_config(BiasConfig::default(), 60.0)?;
//!
//! let report = runtime.stop()?;
//! println!("published {} batches", report.acquisition.flushes);
//! # Ok::<(), dvs_streamer::StreamError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod acquisition;
pub mod device;
pub mod error;
pub mod parameter_sync;
pub mod publisher;
pub mod runtime;
pub mod settings;
pub mod types;

pub use acquisition::{AcquisitionLoop, AcquisitionReport, FlushOutcome, FlushScheduler, StepOutcome};
pub use device::{EventDevice, SimulatedDevice};
pub use error::{DeviceError, PublishError, Result, StreamError};
pub use parameter_sync::{ParameterSyncActor, ParameterSyncReport};
pub use publisher::{BatchPublisher, ChannelPublisher, LogPublisher};
pub use runtime::{StreamOptions, StreamReport, StreamRuntime};
pub use settings::{ConfigUpdateHandler, SharedSettings, SubmitOutcome};
pub use types::{BiasConfig, BiasField, BiasLimits, BiasViolation, Event, EventBatch, StreamingRate};
