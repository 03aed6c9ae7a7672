// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the streamer and its collaborators

use thiserror::Error;

/// Failure reported by an [`EventDevice`](crate::EventDevice)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device session is gone; polling cannot continue
    #[error("device disconnected: {0}")]
    Disconnected(String),

    #[error("device I/O failed: {0}")]
    Io(String),

    /// The device refused a bias write
    #[error("device rejected bias {field}: {reason}")]
    BiasRejected { field: String, reason: String },
}

/// Failure reported by a [`BatchPublisher`](crate::BatchPublisher)
///
/// Never fatal to the acquisition loop; the batch is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("publisher queue full, dropped batch of {0} events")]
    QueueFull(usize),

    #[error("publisher disconnected")]
    Disconnected,

    #[error("publish failed: {0}")]
    Other(String),
}

/// Streamer error
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("device failure: {0}")]
    Device(#[from] DeviceError),

    /// A submitted configuration was rejected; shared settings are unchanged
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Result type for streamer operations
pub type Result<T> = std::result::Result<T, StreamError>;
