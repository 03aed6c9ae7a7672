// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use dvs_streamer::{BiasConfig, DeviceError, Event, EventDevice};
use parking_lot::Mutex;

/// Device that emits sequentially stamped events and records every call
///
/// Timestamps start at 0 and increase by one per event, so a consumer can
/// check for loss, duplication and reordering by comparing against
/// `emitted()`.
#[derive(Default)]
pub struct ScriptedDevice {
    per_poll: usize,
    next_timestamp: Mutex<i64>,
    emitted: AtomicU64,
    polls: AtomicU64,
    applied: Mutex<Vec<BiasConfig>>,
    apply_attempts: AtomicU64,
    fail_after_polls: Option<u64>,
    fail_apply: AtomicBool,
    stopped: AtomicBool,
    calls_after_stop: AtomicUsize,
}

impl ScriptedDevice {
    pub fn new(per_poll: usize) -> Self {
        Self {
            per_poll,
            ..Default::default()
        }
    }

    /// Poll number `n + 1` and later fail with `Disconnected`
    pub fn failing_after(per_poll: usize, polls: u64) -> Self {
        Self {
            per_poll,
            fail_after_polls: Some(polls),
            ..Default::default()
        }
    }

    pub fn set_fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }

    /// Everything after this counts as a call after shutdown
    pub fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn calls_after_stop(&self) -> usize {
        self.calls_after_stop.load(Ordering::SeqCst)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<BiasConfig> {
        self.applied.lock().clone()
    }

    pub fn apply_attempts(&self) -> u64 {
        self.apply_attempts.load(Ordering::SeqCst)
    }

    fn note_call(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            self.calls_after_stop.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl EventDevice for ScriptedDevice {
    fn poll_events(&self) -> Result<Vec<Event>, DeviceError> {
        self.note_call();
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.fail_after_polls {
            if poll > limit {
                return Err(DeviceError::Disconnected("scripted unplug".to_string()));
            }
        }

        let mut next = self.next_timestamp.lock();
        let events: Vec<Event> = (0..self.per_poll)
            .map(|_| {
                let timestamp = *next;
                *next += 1;
                Event {
                    x: (timestamp % 128) as u16,
                    y: ((timestamp / 128) % 128) as u16,
                    timestamp,
                    polarity: timestamp % 3 == 0,
                }
            })
            .collect();
        self.emitted.fetch_add(events.len() as u64, Ordering::SeqCst);
        Ok(events)
    }

    fn apply_bias(&self, bias: &BiasConfig) -> Result<(), DeviceError> {
        self.note_call();
        self.apply_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(DeviceError::Io("scripted bias write failure".to_string()));
        }
        self.applied.lock().push(*bias);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Device whose `apply_bias` announces itself and then blocks until released
///
/// Polls return no events.
pub struct GatedDevice {
    entered_tx: Sender<BiasConfig>,
    entered_rx: Receiver<BiasConfig>,
    release_tx: Sender<()>,
    release_rx: Receiver<()>,
    applied: Mutex<Vec<BiasConfig>>,
    apply_attempts: AtomicU64,
}

impl GatedDevice {
    pub fn new() -> Self {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        Self {
            entered_tx,
            entered_rx,
            release_tx,
            release_rx,
            applied: Mutex::new(Vec::new()),
            apply_attempts: AtomicU64::new(0),
        }
    }

    /// Bias of the next apply that starts within `timeout`
    pub fn wait_entered(&self, timeout: Duration) -> Option<BiasConfig> {
        self.entered_rx.recv_timeout(timeout).ok()
    }

    /// Let one blocked apply finish
    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }

    pub fn applied(&self) -> Vec<BiasConfig> {
        self.applied.lock().clone()
    }

    pub fn apply_attempts(&self) -> u64 {
        self.apply_attempts.load(Ordering::SeqCst)
    }
}

impl EventDevice for GatedDevice {
    fn poll_events(&self) -> Result<Vec<Event>, DeviceError> {
        Ok(Vec::new())
    }

    fn apply_bias(&self, bias: &BiasConfig) -> Result<(), DeviceError> {
        self.apply_attempts.fetch_add(1, Ordering::SeqCst);
        let _ = self.entered_tx.send(*bias);
        self.release_rx
            .recv()
            .map_err(|_| DeviceError::Io("gate closed".to_string()))?;
        self.applied.lock().push(*bias);
        Ok(())
    }

    fn name(&self) -> &str {
        "gated"
    }
}
