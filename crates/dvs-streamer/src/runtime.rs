// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stream runtime
//!
//! Owns the two worker threads and their shared running flag. `stop()` clears
//! the flag and joins both threads before returning, so no device or publisher
//! call happens after it completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dvs_config::DvsConfig;
use tracing::{error, info, warn};

use crate::acquisition::{AcquisitionLoop, AcquisitionReport};
use crate::device::EventDevice;
use crate::error::{Result, StreamError};
use crate::parameter_sync::{ParameterSyncActor, ParameterSyncReport};
use crate::publisher::BatchPublisher;
use crate::settings::{ConfigUpdateHandler, SharedSettings};

const ACQUISITION_THREAD: &str = "dvs-acquisition";
const PARAMETER_SYNC_THREAD: &str = "dvs-parameter-sync";

/// Loop tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Acquisition sleeps `interval / poll_divisor` between polls
    pub poll_divisor: u32,
    /// Upper bound on a single acquisition sleep
    pub max_poll_sleep: Duration,
    /// Parameter sync period
    pub parameter_tick: Duration,
    pub skip_empty_batches: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_divisor: 10,
            max_poll_sleep: Duration::from_millis(50),
            parameter_tick: Duration::from_millis(10),
            skip_empty_batches: true,
        }
    }
}

impl StreamOptions {
    pub fn from_config(config: &DvsConfig) -> Self {
        Self {
            poll_divisor: config.streaming.poll_divisor,
            max_poll_sleep: Duration::from_millis(config.streaming.max_poll_sleep_ms),
            parameter_tick: Duration::from_millis(config.parameter_sync.tick_ms),
            skip_empty_batches: config.streaming.skip_empty_batches,
        }
    }
}

/// Final counters from both loops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub acquisition: AcquisitionReport,
    pub parameter_sync: ParameterSyncReport,
}

pub struct StreamRuntime {
    running: Arc<AtomicBool>,
    settings: Arc<SharedSettings>,
    handler: ConfigUpdateHandler,
    acquisition: Option<JoinHandle<Result<AcquisitionReport>>>,
    parameter_sync: Option<JoinHandle<ParameterSyncReport>>,
}

impl StreamRuntime {
    /// Spawn the acquisition loop and the parameter sync actor
    ///
    /// Bias submissions are validated against `device.bias_limits()`.
    ///
    /// # Errors
    /// `StreamError::ThreadSpawn` if either thread cannot be created. Nothing
    /// is left running in that case.
    pub fn start(
        device: Arc<dyn EventDevice>,
        publisher: Arc<dyn BatchPublisher>,
        settings: Arc<SharedSettings>,
        options: StreamOptions,
    ) -> Result<Self> {
        info!(
            "[RUNTIME] Starting stream from {} at {}",
            device.name(),
            settings.streaming_rate()
        );

        let running = Arc::new(AtomicBool::new(true));
        let handler = ConfigUpdateHandler::new(Arc::clone(&settings), device.bias_limits());

        let actor = ParameterSyncActor::new(
            Arc::clone(&device),
            Arc::clone(&settings),
            options.parameter_tick,
        );
        let sync_running = Arc::clone(&running);
        let parameter_sync = thread::Builder::new()
            .name(PARAMETER_SYNC_THREAD.to_string())
            .spawn(move || actor.run(&sync_running))
            .map_err(|source| StreamError::ThreadSpawn {
                name: PARAMETER_SYNC_THREAD,
                source,
            })?;

        let acquisition = AcquisitionLoop::new(
            device,
            publisher,
            Arc::clone(&settings),
            options.skip_empty_batches,
            Instant::now(),
        );
        let acq_running = Arc::clone(&running);
        let poll_divisor = options.poll_divisor;
        let max_poll_sleep = options.max_poll_sleep;
        let spawned = thread::Builder::new()
            .name(ACQUISITION_THREAD.to_string())
            .spawn(move || acquisition.run(&acq_running, poll_divisor, max_poll_sleep));

        let acquisition = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                running.store(false, Ordering::Release);
                if parameter_sync.join().is_err() {
                    error!("[RUNTIME] Parameter sync thread panicked during aborted start");
                }
                return Err(StreamError::ThreadSpawn {
                    name: ACQUISITION_THREAD,
                    source,
                });
            }
        };

        info!("[RUNTIME] ✅ Stream running");
        Ok(Self {
            running,
            settings,
            handler,
            acquisition: Some(acquisition),
            parameter_sync: Some(parameter_sync),
        })
    }

    /// Handle for configuration delivery; clone freely
    pub fn handler(&self) -> ConfigUpdateHandler {
        self.handler.clone()
    }

    pub fn settings(&self) -> &Arc<SharedSettings> {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// True once the acquisition thread has exited, e.g. after a device failure
    pub fn acquisition_finished(&self) -> bool {
        self.acquisition
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Signal both loops to exit and wait for them
    ///
    /// # Errors
    /// The device error that ended acquisition early, or
    /// `StreamError::ThreadPanicked` if a worker panicked.
    pub fn stop(mut self) -> Result<StreamReport> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<StreamReport> {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("[RUNTIME] Stopping stream...");
        }

        let parameter_sync = match self.parameter_sync.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StreamError::ThreadPanicked(PARAMETER_SYNC_THREAD)),
            None => Ok(ParameterSyncReport::default()),
        };
        let acquisition = match self.acquisition.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StreamError::ThreadPanicked(ACQUISITION_THREAD))
                .and_then(|result| result),
            None => Ok(AcquisitionReport::default()),
        };

        let report = StreamReport {
            acquisition: acquisition?,
            parameter_sync: parameter_sync?,
        };
        info!(
            "[RUNTIME] 🛑 Stream stopped: {} batches, {} events, {} bias updates",
            report.acquisition.flushes, report.acquisition.events, report.parameter_sync.applied
        );
        Ok(report)
    }
}

impl Drop for StreamRuntime {
    fn drop(&mut self) {
        if self.acquisition.is_none() && self.parameter_sync.is_none() {
            return;
        }
        if let Err(e) = self.shutdown() {
            warn!("[RUNTIME] Stream ended with error during drop: {}", e);
        }
    }
}
