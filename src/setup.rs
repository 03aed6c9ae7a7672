// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wiring from [`DvsConfig`] to runtime components

use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use crossbeam::channel::Receiver;
use dvs_config::{DeviceConfig, DvsConfig, LoggingConfig};
use dvs_observability::LoggingOptions;
use dvs_streamer::{
    BatchPublisher, BiasConfig, ChannelPublisher, EventBatch, LogPublisher, SharedSettings,
    SimulatedDevice, StreamingRate,
};
use tracing::{debug, warn};

/// Build the configured event source
///
/// # Errors
/// Only the `simulated` device kind is available in this build.
pub fn build_device(config: &DeviceConfig) -> Result<SimulatedDevice> {
    match config.kind.as_str() {
        "simulated" => Ok(SimulatedDevice::new(
            config.width,
            config.height,
            config.event_rate_hz,
            config.seed,
        )),
        other => bail!("Unsupported device kind '{}' (available: simulated)", other),
    }
}

/// Shared settings seeded with the configured streaming rate
pub fn build_settings(config: &DvsConfig) -> Result<SharedSettings> {
    let rate = StreamingRate::new(config.streaming.rate_hz)
        .context("Invalid [streaming] rate_hz")?;
    Ok(SharedSettings::new(rate))
}

/// Biases from `[device.bias]`
pub fn initial_bias(config: &DvsConfig) -> BiasConfig {
    BiasConfig::from(&config.device.bias)
}

pub fn logging_options(config: &LoggingConfig) -> LoggingOptions {
    LoggingOptions {
        level: config.level.clone(),
        file_logging: config.file_logging,
        log_dir: config.log_dir.clone(),
        ..LoggingOptions::default()
    }
}

/// Topic publisher: a bounded queue drained by a relay thread
///
/// Mirrors a message-bus publisher with a small outgoing queue. When the relay
/// falls behind, the queue fills and new batches are dropped by the
/// acquisition loop.
pub struct TopicPublisher {
    pub publisher: ChannelPublisher,
    pub relay: JoinHandle<u64>,
}

/// Start the relay thread for `[publisher]`
///
/// The relay exits once every sender is dropped, i.e. after the runtime has
/// stopped, and returns the number of batches it forwarded.
pub fn spawn_topic_publisher(config: &DvsConfig) -> Result<TopicPublisher> {
    let (publisher, receiver) = ChannelPublisher::bounded(config.publisher.channel_capacity);
    let sink = LogPublisher::new(config.publisher.topic.clone());

    let relay = thread::Builder::new()
        .name("dvs-topic-relay".to_string())
        .spawn(move || relay_batches(&receiver, &sink))
        .context("Failed to spawn topic relay thread")?;

    Ok(TopicPublisher { publisher, relay })
}

fn relay_batches(receiver: &Receiver<EventBatch>, sink: &LogPublisher) -> u64 {
    let mut forwarded = 0u64;
    for batch in receiver.iter() {
        match sink.publish(batch) {
            Ok(()) => forwarded += 1,
            Err(e) => warn!("[RELAY] Failed to forward batch: {}", e),
        }
    }
    debug!(
        "[RELAY] Channel closed after {} batches on '{}'",
        forwarded,
        sink.topic()
    );
    forwarded
}
