// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Parameter sync actor
//!
//! Polls [`SharedSettings`] on a short fixed tick and programs pending biases
//! into the device. A bias change reaches the device at most one tick after
//! it was submitted. Device I/O happens outside the settings lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::device::EventDevice;
use crate::error::DeviceError;
use crate::settings::SharedSettings;
use crate::types::BiasConfig;

/// Counters returned when the actor exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterSyncReport {
    pub applied: u64,
    pub failed: u64,
}

pub struct ParameterSyncActor {
    device: Arc<dyn EventDevice>,
    settings: Arc<SharedSettings>,
    tick: Duration,
    report: ParameterSyncReport,
}

impl ParameterSyncActor {
    pub fn new(device: Arc<dyn EventDevice>, settings: Arc<SharedSettings>, tick: Duration) -> Self {
        Self {
            device,
            settings,
            tick,
            report: ParameterSyncReport::default(),
        }
    }

    pub fn report(&self) -> ParameterSyncReport {
        self.report
    }

    /// One tick: take the pending snapshot, if any, and apply it
    ///
    /// Returns `None` when nothing was pending. Apply failures are logged and
    /// counted; the device is assumed to keep its previous biases.
    pub fn sync_once(&mut self) -> Option<Result<BiasConfig, DeviceError>> {
        let bias = self.settings.take_pending_bias()?;

        debug!("[PARAM-SYNC] Applying biases to {}", self.device.name());
        match self.device.apply_bias(&bias) {
            Ok(()) => {
                self.report.applied += 1;
                info!("[PARAM-SYNC] Biases applied ({} total)", self.report.applied);
                Some(Ok(bias))
            }
            Err(e) => {
                self.report.failed += 1;
                warn!("[PARAM-SYNC] Failed to apply biases: {}", e);
                Some(Err(e))
            }
        }
    }

    /// Tick until `running` is cleared
    ///
    /// The flag is checked before every apply, so no new apply starts after
    /// a stop has been observed. An apply already in flight completes first.
    pub fn run(mut self, running: &AtomicBool) -> ParameterSyncReport {
        info!("[PARAM-SYNC] Started (tick {:?})", self.tick);

        while running.load(Ordering::Acquire) {
            self.sync_once();
            thread::sleep(self.tick);
        }

        info!(
            "[PARAM-SYNC] Stopped after {} applied, {} failed",
            self.report.applied, self.report.failed
        );
        self.report
    }
}
