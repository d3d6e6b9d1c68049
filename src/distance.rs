// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Odometer integration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Odometer plausibility settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometerConfig {
    /// Deltas at or above this (km) are treated as glitches or rollover.
    pub max_delta_km: f64,
}

impl Default for OdometerConfig {
    fn default() -> Self {
        Self { max_delta_km: 1.0 }
    }
}

impl OdometerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_delta_km.is_finite() && self.max_delta_km > 0.0) {
            return Err(ConfigError::InvalidSetting {
                field: "odometer.max_delta_km".to_string(),
                reason: format!("must be positive, got {}", self.max_delta_km),
            });
        }
        Ok(())
    }
}

/// Outcome of one odometer sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OdometerReading {
    /// First reading of the drive.
    First { km: f64 },
    /// Plausible forward step.
    Accepted { delta_km: f64 },
    /// Dropped: zero, backwards or too large.
    Rejected { delta_km: f64 },
}

/// Drive-scoped odometer chain.
#[derive(Debug, Clone)]
pub struct DistanceTracker {
    max_delta_km: f64,
    odo_start: Option<f64>,
    odo_end: Option<f64>,
    last_odometer: Option<f64>,
    engaged_distance_km: f64,
    accepted: u32,
    rejected: u32,
}

impl DistanceTracker {
    pub fn new(config: &OdometerConfig) -> Self {
        Self {
            max_delta_km: config.max_delta_km,
            odo_start: None,
            odo_end: None,
            last_odometer: None,
            engaged_distance_km: 0.0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Feed one odometer reading (km). `engaged` is the automation state at
    /// the time of the reading.
    pub fn observe(&mut self, km: f64, engaged: bool) -> OdometerReading {
        let Some(last) = self.last_odometer else {
            self.odo_start = Some(km);
            self.odo_end = Some(km);
            self.last_odometer = Some(km);
            return OdometerReading::First { km };
        };

        let delta_km = km - last;
        if delta_km > 0.0 && delta_km < self.max_delta_km {
            if engaged {
                self.engaged_distance_km += delta_km;
            }
            self.last_odometer = Some(km);
            self.odo_end = Some(km);
            self.accepted += 1;
            OdometerReading::Accepted { delta_km }
        } else {
            self.rejected += 1;
            OdometerReading::Rejected { delta_km }
        }
    }

    pub fn odo_start(&self) -> Option<f64> {
        self.odo_start
    }

    pub fn odo_end(&self) -> Option<f64> {
        self.odo_end
    }

    pub fn last_odometer(&self) -> Option<f64> {
        self.last_odometer
    }

    /// `odo_end - odo_start`, when any reading was seen.
    pub fn odo_distance_km(&self) -> Option<f64> {
        match (self.odo_start, self.odo_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn engaged_distance_km(&self) -> f64 {
        self.engaged_distance_km
    }

    pub fn has_readings(&self) -> bool {
        self.odo_start.is_some()
    }

    pub fn accepted_count(&self) -> u32 {
        self.accepted
    }

    pub fn rejected_count(&self) -> u32 {
        self.rejected
    }
}
