// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core data model: events, batches, biases and the streaming rate

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use dvs_config::BiasSection;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// One timestamped sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub x: u16,
    pub y: u16,
    /// Device time (microseconds for DVS128)
    pub timestamp: i64,
    pub polarity: bool,
}

/// Ordered group of events pending publication
///
/// Append-only while owned by the acquisition loop. Insertion order is the
/// arrival order from the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventBatch {
    /// Flush sequence number, monotonic per acquisition loop
    sequence: u64,
    events: Vec<Event>,
}

impl EventBatch {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            events: Vec::new(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl Extend<Event> for EventBatch {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

/// The twelve analog biases of a DVS128
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiasField {
    Cas,
    InjGnd,
    ReqPd,
    PuX,
    DiffOff,
    Req,
    Refr,
    PuY,
    DiffOn,
    Diff,
    Foll,
    Pr,
}

impl BiasField {
    /// Device programming order
    pub const ALL: [BiasField; 12] = [
        BiasField::Cas,
        BiasField::InjGnd,
        BiasField::ReqPd,
        BiasField::PuX,
        BiasField::DiffOff,
        BiasField::Req,
        BiasField::Refr,
        BiasField::PuY,
        BiasField::DiffOn,
        BiasField::Diff,
        BiasField::Foll,
        BiasField::Pr,
    ];

    /// Device name of the bias
    pub fn name(self) -> &'static str {
        match self {
            BiasField::Cas => "cas",
            BiasField::InjGnd => "injGnd",
            BiasField::ReqPd => "reqPd",
            BiasField::PuX => "puX",
            BiasField::DiffOff => "diffOff",
            BiasField::Req => "req",
            BiasField::Refr => "refr",
            BiasField::PuY => "puY",
            BiasField::DiffOn => "diffOn",
            BiasField::Diff => "diff",
            BiasField::Foll => "foll",
            BiasField::Pr => "pr",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BiasField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complete bias snapshot
///
/// Defaults are the DVS128 factory biases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BiasConfig {
    pub cas: u32,
    #[serde(rename = "injGnd")]
    pub inj_gnd: u32,
    #[serde(rename = "reqPd")]
    pub req_pd: u32,
    #[serde(rename = "puX")]
    pub pu_x: u32,
    #[serde(rename = "diffOff")]
    pub diff_off: u32,
    pub req: u32,
    pub refr: u32,
    #[serde(rename = "puY")]
    pub pu_y: u32,
    #[serde(rename = "diffOn")]
    pub diff_on: u32,
    pub diff: u32,
    pub foll: u32,
    pub pr: u32,
}

impl BiasConfig {
    pub fn get(&self, field: BiasField) -> u32 {
        match field {
            BiasField::Cas => self.cas,
            BiasField::InjGnd => self.inj_gnd,
            BiasField::ReqPd => self.req_pd,
            BiasField::PuX => self.pu_x,
            BiasField::DiffOff => self.diff_off,
            BiasField::Req => self.req,
            BiasField::Refr => self.refr,
            BiasField::PuY => self.pu_y,
            BiasField::DiffOn => self.diff_on,
            BiasField::Diff => self.diff,
            BiasField::Foll => self.foll,
            BiasField::Pr => self.pr,
        }
    }

    pub fn set(&mut self, field: BiasField, value: u32) {
        let slot = match field {
            BiasField::Cas => &mut self.cas,
            BiasField::InjGnd => &mut self.inj_gnd,
            BiasField::ReqPd => &mut self.req_pd,
            BiasField::PuX => &mut self.pu_x,
            BiasField::DiffOff => &mut self.diff_off,
            BiasField::Req => &mut self.req,
            BiasField::Refr => &mut self.refr,
            BiasField::PuY => &mut self.pu_y,
            BiasField::DiffOn => &mut self.diff_on,
            BiasField::Diff => &mut self.diff,
            BiasField::Foll => &mut self.foll,
            BiasField::Pr => &mut self.pr,
        };
        *slot = value;
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, field: BiasField, value: u32) -> Self {
        self.set(field, value);
        self
    }

    /// All twelve `(field, value)` pairs in device programming order
    pub fn fields(&self) -> impl Iterator<Item = (BiasField, u32)> + '_ {
        BiasField::ALL
            .into_iter()
            .map(move |field| (field, self.get(field)))
    }

    /// Fields whose value differs from `other`
    pub fn differing_fields(&self, other: &BiasConfig) -> Vec<BiasField> {
        BiasField::ALL
            .iter()
            .copied()
            .filter(|&field| self.get(field) != other.get(field))
            .collect()
    }
}

impl Default for BiasConfig {
    fn default() -> Self {
        BiasConfig::from(&BiasSection::default())
    }
}

impl From<&BiasSection> for BiasConfig {
    fn from(section: &BiasSection) -> Self {
        Self {
            cas: section.cas,
            inj_gnd: section.inj_gnd,
            req_pd: section.req_pd,
            pu_x: section.pu_x,
            diff_off: section.diff_off,
            req: section.req,
            refr: section.refr,
            pu_y: section.pu_y,
            diff_on: section.diff_on,
            diff: section.diff,
            foll: section.foll,
            pr: section.pr,
        }
    }
}

/// A bias value outside the device's accepted range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiasViolation {
    pub field: BiasField,
    pub value: u32,
    pub min: u32,
    pub max: u32,
}

impl fmt::Display for BiasViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} is outside valid range ({}-{})",
            self.field, self.value, self.min, self.max
        )
    }
}

/// Per-field valid bias ranges, owned by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiasLimits {
    ranges: [RangeInclusive<u32>; 12],
}

impl BiasLimits {
    /// Largest value a 24-bit DVS128 bias register holds
    pub const DVS128_MAX: u32 = (1 << 24) - 1;

    /// Same range for every field
    pub fn uniform(min: u32, max: u32) -> Self {
        Self {
            ranges: std::array::from_fn(|_| min..=max),
        }
    }

    pub fn dvs128() -> Self {
        Self::uniform(0, Self::DVS128_MAX)
    }

    pub fn with_range(mut self, field: BiasField, range: RangeInclusive<u32>) -> Self {
        self.ranges[field.index()] = range;
        self
    }

    pub fn range(&self, field: BiasField) -> &RangeInclusive<u32> {
        &self.ranges[field.index()]
    }

    /// Check every field, collecting all violations
    pub fn validate(&self, bias: &BiasConfig) -> std::result::Result<(), Vec<BiasViolation>> {
        let violations: Vec<BiasViolation> = bias
            .fields()
            .filter_map(|(field, value)| {
                let range = self.range(field);
                (!range.contains(&value)).then(|| BiasViolation {
                    field,
                    value,
                    min: *range.start(),
                    max: *range.end(),
                })
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl Default for BiasLimits {
    fn default() -> Self {
        Self::dvs128()
    }
}

/// Target flushes per second
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct StreamingRate(f64);

impl StreamingRate {
    pub const DEFAULT_HZ: f64 = 30.0;

    /// Longest time between flushes (the slowest accepted rate is 1/3600 Hz)
    pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

    /// # Errors
    /// Rejects zero, negative and non-finite rates, and rates whose interval
    /// exceeds [`Self::MAX_INTERVAL`].
    pub fn new(hz: f64) -> Result<Self> {
        if !(hz.is_finite() && hz > 0.0) {
            return Err(StreamError::InvalidConfig(format!(
                "streaming rate must be a positive number, got {}",
                hz
            )));
        }
        match Duration::try_from_secs_f64(1.0 / hz) {
            Ok(interval) if interval <= Self::MAX_INTERVAL => Ok(Self(hz)),
            _ => Err(StreamError::InvalidConfig(format!(
                "streaming rate {} Hz is too slow, the interval must not exceed {} s",
                hz,
                Self::MAX_INTERVAL.as_secs()
            ))),
        }
    }

    pub fn hz(self) -> f64 {
        self.0
    }

    /// Time between flushes, never longer than [`Self::MAX_INTERVAL`]
    pub fn interval(self) -> Duration {
        Duration::from_secs_f64(1.0 / self.0)
    }
}

impl Default for StreamingRate {
    fn default() -> Self {
        Self(Self::DEFAULT_HZ)
    }
}

impl fmt::Display for StreamingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} Hz", self.0)
    }
}
