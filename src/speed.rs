// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Speed regime stratification.
//!
//! Both trackers here integrate on the trailing edge: the interval between
//! two CarState samples is attributed to the speed of the earlier sample,
//! and distance for it is `v_prev * dt`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::{MonoTime, NANOS_PER_SEC};

/// A half-open speed range `[min, max)` in m/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedBucket {
    pub key: String,
    pub label: String,
    pub min_speed_mps: f64,
    /// `None` for the open-ended top bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed_mps: Option<f64>,
}

impl SpeedBucket {
    pub fn new(key: &str, label: &str, min_speed_mps: f64, max_speed_mps: Option<f64>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            min_speed_mps,
            max_speed_mps,
        }
    }

    pub fn contains(&self, speed_mps: f64) -> bool {
        speed_mps >= self.min_speed_mps && self.max_speed_mps.map_or(true, |max| speed_mps < max)
    }
}

/// City / road / highway split at 55 and 90 km/h.
pub fn default_buckets() -> Vec<SpeedBucket> {
    vec![
        SpeedBucket::new("city", "City (≤55 km/h)", 0.0, Some(15.3)),
        SpeedBucket::new("road", "Road (55-90 km/h)", 15.3, Some(25.0)),
        SpeedBucket::new("highway", "Highway (≥90 km/h)", 25.0, None),
    ]
}

/// Check buckets are non-empty, contiguous, non-overlapping and that only
/// the last one is open-ended.
pub fn validate_buckets(buckets: &[SpeedBucket]) -> Result<(), ConfigError> {
    let invalid = |reason: String| Err(ConfigError::InvalidSpeedBuckets(reason));

    if buckets.is_empty() {
        return invalid("at least one bucket is required".to_string());
    }

    for (i, bucket) in buckets.iter().enumerate() {
        if bucket.key.trim().is_empty() {
            return invalid(format!("bucket {} has an empty key", i));
        }
        if buckets[..i].iter().any(|b| b.key == bucket.key) {
            return invalid(format!("duplicate bucket key '{}'", bucket.key));
        }
        if !bucket.min_speed_mps.is_finite() {
            return invalid(format!("bucket '{}' has a non-finite lower bound", bucket.key));
        }

        let is_last = i + 1 == buckets.len();
        match (bucket.max_speed_mps, is_last) {
            (None, false) => {
                return invalid(format!(
                    "only the last bucket may be open-ended, '{}' is not last",
                    bucket.key
                ))
            }
            (Some(max), _) if !(max > bucket.min_speed_mps) => {
                return invalid(format!(
                    "bucket '{}' upper bound {} is not above lower bound {}",
                    bucket.key, max, bucket.min_speed_mps
                ))
            }
            _ => {}
        }

        if let Some(next) = buckets.get(i + 1) {
            if bucket.max_speed_mps != Some(next.min_speed_mps) {
                return invalid(format!(
                    "buckets '{}' and '{}' are not contiguous",
                    bucket.key, next.key
                ));
            }
        }
    }
    Ok(())
}

/// Per-bucket counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketTotals {
    pub time_ns: u64,
    pub engaged_time_ns: u64,
    pub distance_km: f64,
    pub engaged_distance_km: f64,
}

impl BucketTotals {
    pub fn add(&mut self, other: &BucketTotals) {
        self.time_ns += other.time_ns;
        self.engaged_time_ns += other.engaged_time_ns;
        self.distance_km += other.distance_km;
        self.engaged_distance_km += other.engaged_distance_km;
    }
}

fn interval_km(speed_mps: f64, dt_ns: u64) -> f64 {
    speed_mps * (dt_ns as f64 / NANOS_PER_SEC as f64) / 1000.0
}

/// Segment-scoped speed bucket integration.
#[derive(Debug, Clone)]
pub struct SpeedBucketAggregator {
    buckets: Vec<SpeedBucket>,
    totals: Vec<BucketTotals>,
    previous: Option<(MonoTime, f64)>,
    first_ns: Option<MonoTime>,
    last_ns: Option<MonoTime>,
}

impl SpeedBucketAggregator {
    pub fn new(buckets: &[SpeedBucket]) -> Self {
        Self {
            buckets: buckets.to_vec(),
            totals: vec![BucketTotals::default(); buckets.len()],
            previous: None,
            first_ns: None,
            last_ns: None,
        }
    }

    /// Index of the bucket for a speed. Speeds below the first bucket fall
    /// into it; speeds past a closed top bucket fall into the last one.
    pub fn classify(&self, speed_mps: f64) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        if let Some(i) = self.buckets.iter().position(|b| b.contains(speed_mps)) {
            return Some(i);
        }
        if speed_mps < self.buckets[0].min_speed_mps {
            Some(0)
        } else {
            Some(self.buckets.len() - 1)
        }
    }

    /// Feed one CarState sample.
    pub fn observe(&mut self, now: MonoTime, speed_mps: f64, engaged: bool) {
        self.first_ns.get_or_insert(now);
        self.last_ns = Some(now);

        if let Some((prev_t, prev_speed)) = self.previous {
            if now > prev_t {
                let dt = now - prev_t;
                if let Some(idx) = self.classify(prev_speed) {
                    let km = interval_km(prev_speed, dt);
                    let totals = &mut self.totals[idx];
                    totals.time_ns += dt;
                    totals.distance_km += km;
                    if engaged {
                        totals.engaged_time_ns += dt;
                        totals.engaged_distance_km += km;
                    }
                }
            }
        }
        self.previous = Some((now, speed_mps));
    }

    /// Span from the first to the last CarState sample.
    pub fn observed_span_ns(&self) -> u64 {
        match (self.first_ns, self.last_ns) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => 0,
        }
    }

    pub fn buckets(&self) -> &[SpeedBucket] {
        &self.buckets
    }

    /// Totals in bucket order.
    pub fn totals(&self) -> &[BucketTotals] {
        &self.totals
    }
}

/// Moving-time settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveTimeConfig {
    /// The vehicle counts as moving strictly above this speed (m/s).
    pub moving_threshold_mps: f64,
}

impl Default for DriveTimeConfig {
    fn default() -> Self {
        Self {
            moving_threshold_mps: 1.0,
        }
    }
}

/// Segment-scoped moving-time integration.
#[derive(Debug, Clone)]
pub struct DriveTimeTracker {
    threshold_mps: f64,
    previous: Option<(MonoTime, bool)>,
    drive_ns: u64,
    drive_active_ns: u64,
}

impl DriveTimeTracker {
    pub fn new(config: &DriveTimeConfig) -> Self {
        Self {
            threshold_mps: config.moving_threshold_mps,
            previous: None,
            drive_ns: 0,
            drive_active_ns: 0,
        }
    }

    pub fn observe(&mut self, now: MonoTime, speed_mps: f64, engaged: bool) {
        if let Some((prev_t, prev_moving)) = self.previous {
            if prev_moving && now > prev_t {
                let dt = now - prev_t;
                self.drive_ns += dt;
                if engaged {
                    self.drive_active_ns += dt;
                }
            }
        }
        self.previous = Some((now, speed_mps > self.threshold_mps));
    }

    pub fn drive_ns(&self) -> u64 {
        self.drive_ns
    }

    pub fn drive_active_ns(&self) -> u64 {
        self.drive_active_ns
    }
}
