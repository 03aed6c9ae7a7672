// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Acquisition & Publish Loop
//!
//! Polls the device, accumulates events into the current batch and flushes the
//! batch to the publisher on a fixed schedule derived from the streaming rate.
//!
//! ## Timing
//! - `next_flush` advances by exactly one interval per flush, so the long-run
//!   flush rate does not drift with processing jitter
//! - A stall longer than one interval produces one oversized batch, then
//!   back-to-back flushes until `next_flush` catches up; the schedule is
//!   never skipped ahead
//! - The interval is re-read from [`SharedSettings`] at every flush decision.
//!   A rate change never rebases the already scheduled `next_flush`
//! - Between polls the loop sleeps `interval / poll_divisor`, capped so that
//!   shutdown stays responsive at low rates

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::device::EventDevice;
use crate::error::Result;
use crate::publisher::BatchPublisher;
use crate::settings::SharedSettings;
use crate::types::EventBatch;

/// Fixed-schedule flush timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushScheduler {
    next_flush: Instant,
}

impl FlushScheduler {
    pub fn starting_at(first_flush: Instant) -> Self {
        Self {
            next_flush: first_flush,
        }
    }

    pub fn next_flush(&self) -> Instant {
        self.next_flush
    }

    /// True once `now` reaches or passes the scheduled flush
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_flush
    }

    /// Move the schedule forward by exactly one interval
    pub fn advance(&mut self, interval: Duration) {
        self.next_flush += interval;
    }
}

/// What happened at a flush decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Published { sequence: u64, events: usize },
    /// The publisher failed; the batch is gone
    Dropped { sequence: u64, events: usize },
    /// Nothing accumulated, publish call skipped
    SkippedEmpty,
}

/// Result of one [`AcquisitionLoop::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub polled: usize,
    pub flush: Option<FlushOutcome>,
}

/// Counters returned when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Events received from the device
    pub events: u64,
    /// Batches accepted by the publisher
    pub flushes: u64,
    pub skipped_flushes: u64,
    pub dropped_batches: u64,
    pub dropped_events: u64,
}

pub struct AcquisitionLoop {
    device: Arc<dyn EventDevice>,
    publisher: Arc<dyn BatchPublisher>,
    settings: Arc<SharedSettings>,
    batch: EventBatch,
    scheduler: FlushScheduler,
    skip_empty_batches: bool,
    report: AcquisitionReport,
}

impl AcquisitionLoop {
    /// The first flush is scheduled one interval after `start`
    pub fn new(
        device: Arc<dyn EventDevice>,
        publisher: Arc<dyn BatchPublisher>,
        settings: Arc<SharedSettings>,
        skip_empty_batches: bool,
        start: Instant,
    ) -> Self {
        let scheduler = FlushScheduler::starting_at(start + settings.flush_interval());
        Self {
            device,
            publisher,
            settings,
            batch: EventBatch::new(0),
            scheduler,
            skip_empty_batches,
            report: AcquisitionReport::default(),
        }
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    /// Events accumulated since the last flush
    pub fn pending_events(&self) -> usize {
        self.batch.len()
    }

    pub fn report(&self) -> AcquisitionReport {
        self.report
    }

    /// Poll once, append, and flush if the schedule says so
    ///
    /// # Errors
    /// A device poll failure is returned unchanged; the loop must stop.
    pub fn step(&mut self, now: Instant) -> Result<StepOutcome> {
        let events = self.device.poll_events()?;
        let polled = events.len();
        self.batch.extend(events);
        self.report.events += polled as u64;

        let flush = if self.scheduler.is_due(now) {
            let outcome = self.flush();
            // Interval comes from the rate as of this decision
            self.scheduler.advance(self.settings.flush_interval());
            Some(outcome)
        } else {
            None
        };

        Ok(StepOutcome { polled, flush })
    }

    fn flush(&mut self) -> FlushOutcome {
        if self.batch.is_empty() && self.skip_empty_batches {
            self.report.skipped_flushes += 1;
            return FlushOutcome::SkippedEmpty;
        }

        let next = EventBatch::new(self.batch.sequence() + 1);
        let batch = std::mem::replace(&mut self.batch, next);
        let sequence = batch.sequence();
        let events = batch.len();

        match self.publisher.publish(batch) {
            Ok(()) => {
                self.report.flushes += 1;
                trace!("[ACQUISITION] Flushed batch {} ({} events)", sequence, events);
                FlushOutcome::Published { sequence, events }
            }
            Err(e) => {
                self.report.dropped_batches += 1;
                self.report.dropped_events += events as u64;
                warn!("[ACQUISITION] Publish failed, dropped batch {}: {}", sequence, e);
                FlushOutcome::Dropped { sequence, events }
            }
        }
    }

    /// Run until `running` is cleared or the device fails
    ///
    /// # Errors
    /// Returns the device error that ended the loop.
    pub fn run(
        mut self,
        running: &AtomicBool,
        poll_divisor: u32,
        max_poll_sleep: Duration,
    ) -> Result<AcquisitionReport> {
        let poll_divisor = poll_divisor.max(1);
        info!(
            "[ACQUISITION] Starting on {} at {}",
            self.device.name(),
            self.settings.streaming_rate()
        );

        let mut last_stats_time = Instant::now();
        let mut flushes_at_last_stats = 0u64;
        let mut events_at_last_stats = 0u64;

        while running.load(Ordering::Acquire) {
            if let Err(e) = self.step(Instant::now()) {
                error!("[ACQUISITION] Device poll failed, stopping: {}", e);
                return Err(e);
            }

            // Throughput stats every 5 seconds
            let now = Instant::now();
            let since_stats = now.duration_since(last_stats_time);
            if since_stats >= Duration::from_secs(5) {
                let flushes = self.report.flushes + self.report.dropped_batches;
                let actual_hz = (flushes - flushes_at_last_stats) as f64 / since_stats.as_secs_f64();
                let desired_hz = self.settings.streaming_rate().hz();
                debug!(
                    desired_hz,
                    actual_hz,
                    events = self.report.events - events_at_last_stats,
                    dropped_batches = self.report.dropped_batches,
                    "📊 Acquisition stats"
                );
                last_stats_time = now;
                flushes_at_last_stats = flushes;
                events_at_last_stats = self.report.events;
            }

            if !running.load(Ordering::Relaxed) {
                break;
            }

            let sleep = (self.settings.flush_interval() / poll_divisor).min(max_poll_sleep);
            thread::sleep(sleep);
        }

        if !self.batch.is_empty() {
            debug!(
                "[ACQUISITION] Discarding {} unflushed events at shutdown",
                self.batch.len()
            );
        }
        info!(
            "[ACQUISITION] 🛑 Stopped after {} batches ({} events)",
            self.report.flushes, self.report.events
        );
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeviceError, PublishError};
    use crate::publisher::ChannelPublisher;
    use crate::types::{BiasConfig, Event, StreamingRate};
    use parking_lot::Mutex;

    /// Returns a fixed number of sequentially stamped events per poll
    struct CountingDevice {
        per_poll: usize,
        next: Mutex<i64>,
    }

    impl CountingDevice {
        fn new(per_poll: usize) -> Self {
            Self {
                per_poll,
                next: Mutex::new(0),
            }
        }
    }

    impl EventDevice for CountingDevice {
        fn poll_events(&self) -> std::result::Result<Vec<Event>, DeviceError> {
            let mut next = self.next.lock();
            let events = (0..self.per_poll)
                .map(|_| {
                    let ts = *next;
                    *next += 1;
                    Event {
                        x: (ts % 128) as u16,
                        y: 0,
                        timestamp: ts,
                        polarity: ts % 2 == 0,
                    }
                })
                .collect();
            Ok(events)
        }

        fn apply_bias(&self, _bias: &BiasConfig) -> std::result::Result<(), DeviceError> {
            Ok(())
        }
    }

    struct FailingPublisher;

    impl BatchPublisher for FailingPublisher {
        fn publish(&self, _batch: EventBatch) -> std::result::Result<(), PublishError> {
            Err(PublishError::Other("broker down".to_string()))
        }
    }

    fn settings(hz: f64) -> Arc<SharedSettings> {
        Arc::new(SharedSettings::new(StreamingRate::new(hz).unwrap()))
    }

    #[test]
    fn test_scheduler_due_at_boundary() {
        let start = Instant::now();
        let scheduler = FlushScheduler::starting_at(start + Duration::from_millis(10));
        assert!(!scheduler.is_due(start + Duration::from_millis(9)));
        assert!(scheduler.is_due(start + Duration::from_millis(10)));
        assert!(scheduler.is_due(start + Duration::from_millis(50)));
    }

    #[test]
    fn test_scheduler_advances_from_schedule_not_now() {
        let start = Instant::now();
        let mut scheduler = FlushScheduler::starting_at(start);
        scheduler.advance(Duration::from_millis(10));
        scheduler.advance(Duration::from_millis(10));
        assert_eq!(scheduler.next_flush(), start + Duration::from_millis(20));
    }

    #[test]
    fn test_no_flush_before_first_interval() {
        let start = Instant::now();
        let (publisher, receiver) = ChannelPublisher::unbounded();
        let mut acquisition = AcquisitionLoop::new(
            Arc::new(CountingDevice::new(2)),
            Arc::new(publisher),
            settings(10.0),
            true,
            start,
        );

        let outcome = acquisition.step(start + Duration::from_millis(50)).unwrap();

        assert_eq!(outcome.polled, 2);
        assert_eq!(outcome.flush, None);
        assert_eq!(acquisition.pending_events(), 2);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_flush_hands_off_and_starts_fresh_batch() {
        let start = Instant::now();
        let (publisher, receiver) = ChannelPublisher::unbounded();
        let mut acquisition = AcquisitionLoop::new(
            Arc::new(CountingDevice::new(3)),
            Arc::new(publisher),
            settings(10.0),
            true,
            start,
        );

        acquisition.step(start).unwrap();
        let outcome = acquisition.step(start + Duration::from_millis(100)).unwrap();

        assert_eq!(
            outcome.flush,
            Some(FlushOutcome::Published {
                sequence: 0,
                events: 6
            })
        );
        assert_eq!(acquisition.pending_events(), 0);
        let batch = receiver.try_recv().unwrap();
        let stamps: Vec<i64> = batch.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_stall_yields_single_oversized_batch() {
        let start = Instant::now();
        let (publisher, receiver) = ChannelPublisher::unbounded();
        let mut acquisition = AcquisitionLoop::new(
            Arc::new(CountingDevice::new(1)),
            Arc::new(publisher),
            settings(10.0),
            true,
            start,
        );

        // Three intervals late: one flush, schedule moves one interval only
        let late = start + Duration::from_millis(300);
        acquisition.step(late).unwrap();

        assert_eq!(receiver.len(), 1);
        assert_eq!(
            acquisition.scheduler().next_flush(),
            start + Duration::from_millis(200)
        );
    }

    #[test]
    fn test_empty_batch_is_skipped() {
        let start = Instant::now();
        let (publisher, receiver) = ChannelPublisher::unbounded();
        let mut acquisition = AcquisitionLoop::new(
            Arc::new(CountingDevice::new(0)),
            Arc::new(publisher),
            settings(10.0),
            true,
            start,
        );

        let outcome = acquisition.step(start + Duration::from_millis(100)).unwrap();

        assert_eq!(outcome.flush, Some(FlushOutcome::SkippedEmpty));
        assert!(receiver.try_recv().is_err());
        assert_eq!(acquisition.report().skipped_flushes, 1);
    }

    #[test]
    fn test_empty_batch_published_when_configured() {
        let start = Instant::now();
        let (publisher, receiver) = ChannelPublisher::unbounded();
        let mut acquisition = AcquisitionLoop::new(
            Arc::new(CountingDevice::new(0)),
            Arc::new(publisher),
            settings(10.0),
            false,
            start,
        );

        acquisition.step(start + Duration::from_millis(100)).unwrap();

        assert!(receiver.try_recv().unwrap().is_empty());
    }

    #[test]
    fn test_publish_failure_drops_batch_and_continues() {
        let start = Instant::now();
        let mut acquisition = AcquisitionLoop::new(
            Arc::new(CountingDevice::new(4)),
            Arc::new(FailingPublisher),
            settings(10.0),
            true,
            start,
        );

        let outcome = acquisition.step(start + Duration::from_millis(100)).unwrap();
        assert_eq!(
            outcome.flush,
            Some(FlushOutcome::Dropped {
                sequence: 0,
                events: 4
            })
        );

        // Acquisition keeps going with a fresh batch
        let outcome = acquisition.step(start + Duration::from_millis(150)).unwrap();
        assert_eq!(outcome.polled, 4);
        assert_eq!(acquisition.pending_events(), 4);
        assert_eq!(acquisition.report().dropped_events, 4);
    }

    #[test]
    fn test_sequence_increments_per_published_batch() {
        let start = Instant::now();
        let (publisher, receiver) = ChannelPublisher::unbounded();
        let mut acquisition = AcquisitionLoop::new(
            Arc::new(CountingDevice::new(1)),
            Arc::new(publisher),
            settings(10.0),
            true,
            start,
        );

        for i in 1..=3 {
            acquisition.step(start + Duration::from_millis(100 * i)).unwrap();
        }

        let sequences: Vec<u64> = receiver.try_iter().map(|b| b.sequence()).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }
}
