// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Publish collaborator
//!
//! Publishers receive ownership of each flushed batch. A failed publish is
//! never retried; the acquisition loop logs it and drops the batch.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::error::PublishError;
use crate::types::EventBatch;

/// Downstream consumer of event batches
pub trait BatchPublisher: Send + Sync {
    /// Hand a batch downstream (bounded latency, fire-and-forget)
    fn publish(&self, batch: EventBatch) -> Result<(), PublishError>;
}

/// Publishes into a bounded channel
///
/// Never blocks: a full channel rejects the batch with
/// [`PublishError::QueueFull`].
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: Sender<EventBatch>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel
    pub fn bounded(capacity: usize) -> (Self, Receiver<EventBatch>) {
        let (sender, receiver) = channel::bounded(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Unbounded variant, mostly useful for capturing every batch in tests
    pub fn unbounded() -> (Self, Receiver<EventBatch>) {
        let (sender, receiver) = channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl BatchPublisher for ChannelPublisher {
    fn publish(&self, batch: EventBatch) -> Result<(), PublishError> {
        self.sender.try_send(batch).map_err(|e| match e {
            TrySendError::Full(batch) => PublishError::QueueFull(batch.len()),
            TrySendError::Disconnected(_) => PublishError::Disconnected,
        })
    }
}

/// Logs a one-line summary per batch under a topic name
pub struct LogPublisher {
    topic: String,
    published: AtomicU64,
    events: AtomicU64,
}

impl LogPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            published: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn published_batches(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn published_events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

impl BatchPublisher for LogPublisher {
    fn publish(&self, batch: EventBatch) -> Result<(), PublishError> {
        let events = batch.events();
        let span_us = match (events.first(), events.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0,
        };
        debug!(
            topic = %self.topic,
            sequence = batch.sequence(),
            events = events.len(),
            span_us,
            "Published event batch"
        );
        self.published.fetch_add(1, Ordering::Relaxed);
        self.events.fetch_add(events.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    fn batch(sequence: u64, n: usize) -> EventBatch {
        let mut batch = EventBatch::new(sequence);
        for i in 0..n {
            batch.push(Event {
                x: i as u16,
                y: 0,
                timestamp: i as i64,
                polarity: true,
            });
        }
        batch
    }

    #[test]
    fn test_channel_publisher_delivers_batch() {
        let (publisher, receiver) = ChannelPublisher::bounded(2);
        publisher.publish(batch(0, 3)).unwrap();

        let received = receiver.try_recv().unwrap();
        assert_eq!(received.sequence(), 0);
        assert_eq!(received.len(), 3);
    }

    #[test]
    fn test_channel_publisher_full_drops_batch() {
        let (publisher, _receiver) = ChannelPublisher::bounded(1);
        publisher.publish(batch(0, 1)).unwrap();

        assert_eq!(publisher.publish(batch(1, 4)), Err(PublishError::QueueFull(4)));
    }

    #[test]
    fn test_channel_publisher_disconnected() {
        let (publisher, receiver) = ChannelPublisher::bounded(1);
        drop(receiver);

        assert_eq!(publisher.publish(batch(0, 1)), Err(PublishError::Disconnected));
    }

    #[test]
    fn test_log_publisher_counts() {
        let publisher = LogPublisher::new("dvs_events");
        publisher.publish(batch(0, 5)).unwrap();
        publisher.publish(batch(1, 0)).unwrap();

        assert_eq!(publisher.topic(), "dvs_events");
        assert_eq!(publisher.published_batches(), 2);
        assert_eq!(publisher.published_events(), 5);
    }
}
