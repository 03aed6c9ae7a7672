// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # dvs-observability
//!
//! Logging setup shared by the DVS streamer binaries, with per-crate debug
//! flag support.
//!
//! ## Features
//! - `file-logging`: JSON log files with daily rotation in a per-run folder

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Workspace crates that accept `--debug-<name>` flags
pub const KNOWN_CRATES: &[&str] = &[
    "dvs-stream",
    "dvs-streamer",
    "dvs-config",
    "dvs-observability",
];
