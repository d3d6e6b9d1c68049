// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Steering intervention detection.
//!
//! Two torque channels (driver-applied and motor-commanded) are each passed
//! through a [`MovingAverageFilter`]; the absolute difference of the filtered
//! values drives a two-state hysteresis comparator. Entering `Intervening`
//! additionally requires the debounce window since the previous entry to
//! have elapsed. Leaving it only requires the diff to fall under the low
//! threshold.
//!
//! Gating on engagement and stability is the caller's job, see
//! [`crate::segment`].

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::{MonoTime, NANOS_PER_SEC};
use crate::filter::MovingAverageFilter;

/// Thresholds and timing for the intervention comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionConfig {
    /// Idle -> Intervening when the filtered diff exceeds this.
    pub high_threshold: f64,
    /// Intervening -> Idle when the filtered diff drops below this.
    pub low_threshold: f64,
    /// Minimum time between two Intervening entries (ns).
    pub debounce_ns: u64,
    /// Moving-average window for each torque channel.
    pub filter_window: usize,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            high_threshold: 1.5,
            low_threshold: 0.3,
            debounce_ns: 10 * NANOS_PER_SEC,
            filter_window: 10,
        }
    }
}

impl InterventionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = self.high_threshold.is_finite() && self.low_threshold.is_finite();
        if !finite || self.high_threshold <= self.low_threshold {
            return Err(ConfigError::InvalidThresholds {
                high: self.high_threshold,
                low: self.low_threshold,
            });
        }
        if self.filter_window == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "intervention.filter_window".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Comparator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterventionState {
    #[default]
    Idle,
    Intervening,
}

/// A comparator state change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterventionEdge {
    Started { diff: f64 },
    Resolved { diff: f64 },
}

/// Segment-scoped steering intervention detector.
#[derive(Debug, Clone)]
pub struct InterventionDetector {
    config: InterventionConfig,
    driver_torque: MovingAverageFilter,
    motor_torque: MovingAverageFilter,
    state: InterventionState,
    last_entry_ns: Option<MonoTime>,
    started: u32,
}

impl InterventionDetector {
    pub fn new(config: InterventionConfig) -> Self {
        let window = config.filter_window;
        Self {
            config,
            driver_torque: MovingAverageFilter::new(window),
            motor_torque: MovingAverageFilter::new(window),
            state: InterventionState::Idle,
            last_entry_ns: None,
            started: 0,
        }
    }

    /// Feed a driver torque sample.
    pub fn update_driver_torque(&mut self, value: f64) -> f64 {
        self.driver_torque.update(value)
    }

    /// Feed a motor torque sample.
    pub fn update_motor_torque(&mut self, value: f64) -> f64 {
        self.motor_torque.update(value)
    }

    /// `|driver - motor|` over the filtered channels, once both have data.
    pub fn filtered_diff(&self) -> Option<f64> {
        match (self.driver_torque.value(), self.motor_torque.value()) {
            (Some(driver), Some(motor)) => Some((driver - motor).abs()),
            _ => None,
        }
    }

    /// Run the comparator on one diff sample.
    pub fn evaluate(&mut self, now: MonoTime, diff: f64) -> Option<InterventionEdge> {
        match self.state {
            InterventionState::Idle => {
                if diff > self.config.high_threshold && self.debounce_elapsed(now) {
                    self.state = InterventionState::Intervening;
                    self.last_entry_ns = Some(now);
                    self.started += 1;
                    return Some(InterventionEdge::Started { diff });
                }
                None
            }
            InterventionState::Intervening => {
                if diff < self.config.low_threshold {
                    self.state = InterventionState::Idle;
                    return Some(InterventionEdge::Resolved { diff });
                }
                None
            }
        }
    }

    fn debounce_elapsed(&self, now: MonoTime) -> bool {
        match self.last_entry_ns {
            Some(last) => now.saturating_sub(last) > self.config.debounce_ns,
            None => true,
        }
    }

    pub fn state(&self) -> InterventionState {
        self.state
    }

    /// Entries into `Intervening` seen by this detector.
    pub fn started_count(&self) -> u32 {
        self.started
    }
}

/// One steering intervention, as reported to a [`DebugSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub drive_id: String,
    pub segment: String,
    /// Seconds since the segment's first controls sample.
    pub offset_seconds: f64,
    pub note: String,
}

impl InterventionRecord {
    pub fn new(drive_id: &str, segment: &str, offset_seconds: f64, diff: f64) -> Self {
        Self {
            drive_id: drive_id.to_string(),
            segment: segment.to_string(),
            offset_seconds,
            note: format!("Steering intervention detected (diff: {:.3})", diff),
        }
    }
}

/// Receiver for intervention debug records. Fire-and-forget.
pub trait DebugSink {
    fn record(&mut self, record: InterventionRecord);
}

impl DebugSink for Vec<InterventionRecord> {
    fn record(&mut self, record: InterventionRecord) {
        self.push(record);
    }
}
