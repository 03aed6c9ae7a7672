// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Shared settings and the configuration update handler.

`SharedSettings` is the only state shared between the externally driven
configuration updates and the two internal loops:

- Configuration delivery: `ConfigUpdateHandler::submit_config` validates, then
  compares and marks (short critical section)
- Parameter sync thread: `take_pending_bias` test-and-clears the dirty flag
- Acquisition thread: `flush_interval` reads the current rate

Everything sits behind one `parking_lot::Mutex`, so a reader never sees a bias
snapshot assembled from two submissions, and the dirty-flag test-and-clear is
atomic with respect to concurrent submissions. No lock is held across device
I/O.
*/

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, StreamError};
use crate::types::{BiasConfig, BiasLimits, StreamingRate};

struct SettingsState {
    /// Value last written by a submission (not necessarily applied yet)
    last_known: Option<BiasConfig>,
    /// Snapshot waiting for the parameter sync actor
    pending: Option<BiasConfig>,
    dirty: bool,
    rate: StreamingRate,
}

/// What a submission changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub bias_changed: bool,
    pub rate_changed: bool,
}

impl SubmitOutcome {
    pub fn is_noop(&self) -> bool {
        !self.bias_changed && !self.rate_changed
    }
}

/// Synchronized bias snapshot, dirty flag and streaming rate
pub struct SharedSettings {
    state: Mutex<SettingsState>,
}

impl SharedSettings {
    /// Bias starts unknown, so the first submission always becomes pending
    pub fn new(rate: StreamingRate) -> Self {
        Self {
            state: Mutex::new(SettingsState {
                last_known: None,
                pending: None,
                dirty: false,
                rate,
            }),
        }
    }

    pub fn streaming_rate(&self) -> StreamingRate {
        self.state.lock().rate
    }

    /// Current time between flushes
    pub fn flush_interval(&self) -> Duration {
        self.streaming_rate().interval()
    }

    /// True while a submitted bias has not been picked up
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn last_known_bias(&self) -> Option<BiasConfig> {
        self.state.lock().last_known
    }

    /// Atomically test-and-clear the dirty flag
    ///
    /// Returns the pending snapshot if one was waiting. Intermediate
    /// submissions overwritten before this call are never returned.
    pub fn take_pending_bias(&self) -> Option<BiasConfig> {
        let mut state = self.state.lock();
        if !state.dirty {
            return None;
        }
        state.dirty = false;
        state.pending.take()
    }

    /// Compare-and-mark without validation; callers go through
    /// [`ConfigUpdateHandler`].
    pub(crate) fn submit(&self, bias: &BiasConfig, rate: StreamingRate) -> SubmitOutcome {
        let mut outcome = SubmitOutcome::default();
        let mut state = self.state.lock();

        if state.last_known.as_ref() != Some(bias) {
            state.last_known = Some(*bias);
            state.pending = Some(*bias);
            state.dirty = true;
            outcome.bias_changed = true;
        }

        if state.rate != rate {
            state.rate = rate;
            outcome.rate_changed = true;
        }

        outcome
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(StreamingRate::default())
    }
}

/// Entry point for configuration delivery (`submit_config`)
///
/// Validates against the device's bias limits before anything reaches
/// [`SharedSettings`]. Expected to be called from one delivery context at a
/// time; never blocks on the streaming loops beyond the settings lock.
#[derive(Clone)]
pub struct ConfigUpdateHandler {
    settings: Arc<SharedSettings>,
    limits: Arc<BiasLimits>,
}

impl ConfigUpdateHandler {
    pub fn new(settings: Arc<SharedSettings>, limits: BiasLimits) -> Self {
        Self {
            settings,
            limits: Arc::new(limits),
        }
    }

    pub fn limits(&self) -> &BiasLimits {
        &self.limits
    }

    /// Submit a full configuration
    ///
    /// Biases are marked pending only if some field differs from the last
    /// submission; the rate takes effect at the acquisition loop's next
    /// scheduling decision.
    ///
    /// # Errors
    /// `StreamError::InvalidConfig` if the rate is not positive or any bias is
    /// out of range. The whole submission is rejected and the previous
    /// configuration stays in place.
    pub fn submit_config(&self, bias: BiasConfig, rate_hz: f64) -> Result<SubmitOutcome> {
        let rate = StreamingRate::new(rate_hz).map_err(|e| {
            warn!("[SETTINGS] Rejected configuration: {}", e);
            e
        })?;

        if let Err(violations) = self.limits.validate(&bias) {
            let detail = violations
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            warn!("[SETTINGS] Rejected configuration: {}", detail);
            return Err(StreamError::InvalidConfig(detail));
        }

        let previous = self.settings.last_known_bias();
        let outcome = self.settings.submit(&bias, rate);

        if outcome.bias_changed {
            match previous {
                Some(prev) => {
                    let changed: Vec<&str> = prev
                        .differing_fields(&bias)
                        .into_iter()
                        .map(|f| f.name())
                        .collect();
                    info!("[SETTINGS] Bias update pending: {}", changed.join(", "));
                }
                None => info!("[SETTINGS] Initial bias snapshot pending"),
            }
        }
        if outcome.rate_changed {
            info!("[SETTINGS] Streaming rate set to {}", rate);
        }
        if outcome.is_noop() {
            debug!("[SETTINGS] Configuration unchanged");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BiasField;

    fn handler() -> (Arc<SharedSettings>, ConfigUpdateHandler) {
        let settings = Arc::new(SharedSettings::default());
        let handler = ConfigUpdateHandler::new(Arc::clone(&settings), BiasLimits::dvs128());
        (settings, handler)
    }

    #[test]
    fn test_first_submission_is_pending() {
        let (settings, handler) = handler();

        let outcome = handler.submit_config(BiasConfig::default(), 30.0).unwrap();

        assert!(outcome.bias_changed);
        assert!(!outcome.rate_changed);
        assert!(settings.is_dirty());
    }

    #[test]
    fn test_identical_submission_is_noop() {
        let (settings, handler) = handler();
        handler.submit_config(BiasConfig::default(), 30.0).unwrap();
        assert!(settings.take_pending_bias().is_some());

        let outcome = handler.submit_config(BiasConfig::default(), 30.0).unwrap();

        assert!(outcome.is_noop());
        assert!(!settings.is_dirty());
        assert_eq!(settings.take_pending_bias(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let (settings, handler) = handler();
        let first = BiasConfig::default().with(BiasField::DiffOn, 100);
        let second = BiasConfig::default().with(BiasField::DiffOn, 200);

        handler.submit_config(first, 30.0).unwrap();
        handler.submit_config(second, 30.0).unwrap();

        assert_eq!(settings.take_pending_bias(), Some(second));
        assert_eq!(settings.take_pending_bias(), None);
    }

    #[test]
    fn test_compare_against_last_submitted_not_applied() {
        let (settings, handler) = handler();
        let a = BiasConfig::default().with(BiasField::Refr, 10);
        let b = BiasConfig::default().with(BiasField::Refr, 20);

        handler.submit_config(a, 30.0).unwrap();
        handler.submit_config(b, 30.0).unwrap();
        // Back to `a` differs from the last submission (`b`), so it is pending
        let outcome = handler.submit_config(a, 30.0).unwrap();

        assert!(outcome.bias_changed);
        assert_eq!(settings.take_pending_bias(), Some(a));
    }

    #[test]
    fn test_rate_change_without_bias_change() {
        let (settings, handler) = handler();
        handler.submit_config(BiasConfig::default(), 30.0).unwrap();
        settings.take_pending_bias();

        let outcome = handler.submit_config(BiasConfig::default(), 60.0).unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome {
                bias_changed: false,
                rate_changed: true
            }
        );
        assert!(!settings.is_dirty());
        assert_eq!(settings.streaming_rate().hz(), 60.0);
        assert_eq!(settings.flush_interval(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_invalid_rate_rejected_whole() {
        let (settings, handler) = handler();
        let bias = BiasConfig::default().with(BiasField::Cas, 5);

        let result = handler.submit_config(bias, 0.0);

        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
        assert!(!settings.is_dirty());
        assert_eq!(settings.last_known_bias(), None);
        assert_eq!(settings.streaming_rate(), StreamingRate::default());
    }

    #[test]
    fn test_vanishing_rate_rejected_and_settings_kept() {
        let (settings, handler) = handler();
        handler.submit_config(BiasConfig::default(), 60.0).unwrap();
        settings.take_pending_bias();

        let bias = BiasConfig::default().with(BiasField::Pr, 1);
        let result = handler.submit_config(bias, 1e-20);

        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
        assert!(!settings.is_dirty());
        assert_eq!(settings.last_known_bias(), Some(BiasConfig::default()));
        assert_eq!(settings.streaming_rate().hz(), 60.0);
        assert_eq!(settings.flush_interval(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_out_of_range_bias_keeps_previous() {
        let settings = Arc::new(SharedSettings::default());
        let limits = BiasLimits::dvs128().with_range(BiasField::Foll, 0..=1000);
        let handler = ConfigUpdateHandler::new(Arc::clone(&settings), limits);
        let good = BiasConfig::default();
        handler.submit_config(good, 30.0).unwrap();
        settings.take_pending_bias();

        let bad = good.with(BiasField::Foll, 5000);
        let result = handler.submit_config(bad, 90.0);

        match result {
            Err(StreamError::InvalidConfig(msg)) => assert!(msg.contains("foll")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
        assert_eq!(settings.last_known_bias(), Some(good));
        assert!(!settings.is_dirty());
        assert_eq!(settings.streaming_rate().hz(), 30.0);
    }
}
