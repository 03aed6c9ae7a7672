// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device collaborator
//!
//! The streamer only needs two operations from a sensor: a non-blocking poll
//! for new events and a bias write. Both may be called concurrently from the
//! acquisition thread and the parameter sync thread, so implementations take
//! `&self` and synchronize internally.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::DeviceError;
use crate::types::{BiasConfig, BiasLimits, Event};

/// Event camera as seen by the streamer
pub trait EventDevice: Send + Sync {
    /// Return the events that arrived since the last poll
    ///
    /// Must not block waiting for data; an empty vector is a valid answer.
    /// An error means the device session is broken.
    fn poll_events(&self) -> Result<Vec<Event>, DeviceError>;

    /// Program all twelve biases
    ///
    /// May block briefly on device I/O. On failure the device is assumed to
    /// keep its previous biases.
    fn apply_bias(&self, bias: &BiasConfig) -> Result<(), DeviceError>;

    /// Valid range for each bias
    fn bias_limits(&self) -> BiasLimits {
        BiasLimits::default()
    }

    /// Human readable device name for logs
    fn name(&self) -> &str {
        "dvs"
    }
}

struct EventGenerator {
    rng: StdRng,
    started: Instant,
    last_poll: Instant,
    /// Fractional events carried over between polls
    carry: f64,
    last_timestamp: i64,
}

/// Synthetic event camera
///
/// Emits uniformly distributed pixel events at a mean `event_rate_hz` with
/// microsecond timestamps relative to creation. The stream is deterministic
/// for a given seed and poll timing.
pub struct SimulatedDevice {
    width: u16,
    height: u16,
    event_rate_hz: f64,
    limits: BiasLimits,
    generator: Mutex<EventGenerator>,
    applied_bias: Mutex<Option<BiasConfig>>,
    connected: AtomicBool,
    bias_writes: AtomicU64,
}

impl SimulatedDevice {
    /// Upper bound on events returned by a single poll
    pub const MAX_EVENTS_PER_POLL: usize = 1_000_000;

    pub fn new(width: u16, height: u16, event_rate_hz: f64, seed: u64) -> Self {
        let now = Instant::now();
        Self {
            width: width.max(1),
            height: height.max(1),
            event_rate_hz: event_rate_hz.max(0.0),
            limits: BiasLimits::dvs128(),
            generator: Mutex::new(EventGenerator {
                rng: StdRng::seed_from_u64(seed),
                started: now,
                last_poll: now,
                carry: 0.0,
                last_timestamp: 0,
            }),
            applied_bias: Mutex::new(None),
            connected: AtomicBool::new(true),
            bias_writes: AtomicU64::new(0),
        }
    }

    /// 128x128 sensor
    pub fn dvs128(event_rate_hz: f64, seed: u64) -> Self {
        Self::new(128, 128, event_rate_hz, seed)
    }

    pub fn with_limits(mut self, limits: BiasLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Simulate unplugging the sensor; later calls fail with `Disconnected`
    pub fn disconnect(&self) {
        info!("[SIM-DVS] Simulated disconnect");
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Last bias programmed into the device
    pub fn applied_bias(&self) -> Option<BiasConfig> {
        *self.applied_bias.lock()
    }

    pub fn bias_write_count(&self) -> u64 {
        self.bias_writes.load(Ordering::Relaxed)
    }

    fn ensure_connected(&self) -> Result<(), DeviceError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DeviceError::Disconnected("simulated device unplugged".to_string()))
        }
    }
}

impl EventDevice for SimulatedDevice {
    fn poll_events(&self) -> Result<Vec<Event>, DeviceError> {
        self.ensure_connected()?;

        let now = Instant::now();
        let mut state = self.generator.lock();

        let elapsed = now.duration_since(state.last_poll);
        let expected = elapsed.as_secs_f64() * self.event_rate_hz + state.carry;
        let count = (expected.floor() as usize).min(Self::MAX_EVENTS_PER_POLL);
        state.carry = expected - expected.floor();

        let window_start = state.last_poll.duration_since(state.started).as_micros() as i64;
        let window_end = now.duration_since(state.started).as_micros() as i64;
        state.last_poll = now;

        let mut events = Vec::with_capacity(count);
        for i in 0..count {
            // Spread evenly across the window, never going backwards
            let offset = (window_end - window_start) * (i as i64 + 1) / count as i64;
            let timestamp = (window_start + offset).max(state.last_timestamp);
            state.last_timestamp = timestamp;

            let x = state.rng.gen_range(0..self.width);
            let y = state.rng.gen_range(0..self.height);
            let polarity = state.rng.gen::<bool>();
            events.push(Event {
                x,
                y,
                timestamp,
                polarity,
            });
        }

        Ok(events)
    }

    fn apply_bias(&self, bias: &BiasConfig) -> Result<(), DeviceError> {
        self.ensure_connected()?;

        if let Err(violations) = self.limits.validate(bias) {
            let first = &violations[0];
            return Err(DeviceError::BiasRejected {
                field: first.field.name().to_string(),
                reason: first.to_string(),
            });
        }

        *self.applied_bias.lock() = Some(*bias);
        self.bias_writes.fetch_add(1, Ordering::Relaxed);
        debug!("[SIM-DVS] Biases programmed: {:?}", bias);
        Ok(())
    }

    fn bias_limits(&self) -> BiasLimits {
        self.limits.clone()
    }

    fn name(&self) -> &str {
        "simulated-dvs128"
    }
}
