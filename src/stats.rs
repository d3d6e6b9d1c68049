// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! DriveStatistics - per-drive output and cross-drive summary.

use serde::{Deserialize, Serialize};

use crate::drive::{Drive, DriveMetadata, SegmentRef};
use crate::error::SegmentReadError;
use crate::event::NANOS_PER_SEC;
use crate::segment::{DriveState, SegmentSummary};
use crate::speed::{BucketTotals, SpeedBucket};

const SECS_PER_HOUR: f64 = 3600.0;

fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_SEC as f64
}

/// `part / whole * 100`, 0 when `whole` is 0.
fn pct_or_zero(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// `count / km * 100`, only for a positive distance.
fn per_100km(count: f64, km: Option<f64>) -> Option<f64> {
    km.filter(|d| *d > 0.0).map(|d| count / d * 100.0)
}

/// A segment left out of the statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSegment {
    pub segment: String,
    pub reason: String,
}

/// Speed bucket line of the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    /// Bucket key (`city`, `road`, ...).
    pub key: String,
    /// Human readable label.
    pub label: String,
    pub time_ns: u64,
    pub engaged_time_ns: u64,
    pub distance_km: f64,
    pub engaged_distance_km: f64,
    /// Engaged share of bucket time, `None` when no time was spent here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_pct: Option<f64>,
    /// Engaged share of bucket distance, `None` when no distance was covered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_engagement_pct: Option<f64>,
}

impl BucketSummary {
    fn from_totals(bucket: &SpeedBucket, totals: &BucketTotals) -> Self {
        let mut summary = Self {
            key: bucket.key.clone(),
            label: bucket.label.clone(),
            time_ns: 0,
            engaged_time_ns: 0,
            distance_km: 0.0,
            engaged_distance_km: 0.0,
            engagement_pct: None,
            distance_engagement_pct: None,
        };
        summary.add_totals(totals);
        summary
    }

    fn add_totals(&mut self, totals: &BucketTotals) {
        self.time_ns += totals.time_ns;
        self.engaged_time_ns += totals.engaged_time_ns;
        self.distance_km += totals.distance_km;
        self.engaged_distance_km += totals.engaged_distance_km;
        self.engagement_pct =
            (self.time_ns > 0).then(|| pct_or_zero(self.engaged_time_ns, self.time_ns));
        self.distance_engagement_pct = (self.distance_km > 0.0)
            .then(|| self.engaged_distance_km / self.distance_km * 100.0);
    }

    fn totals(&self) -> BucketTotals {
        BucketTotals {
            time_ns: self.time_ns,
            engaged_time_ns: self.engaged_time_ns,
            distance_km: self.distance_km,
            engaged_distance_km: self.engaged_distance_km,
        }
    }

    pub fn time_seconds(&self) -> f64 {
        ns_to_secs(self.time_ns)
    }
}

/// Final statistics of one drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveStatistics {
    /// Drive identifier.
    pub drive_id: String,
    /// Segments in the drive.
    pub segment_count: usize,
    /// Segments that contributed.
    pub processed_segments: usize,
    /// Segments skipped, with the reason.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped_segments: Vec<SkippedSegment>,

    /// Summed first-to-last controls span per segment.
    pub total_time_ns: u64,
    pub active_time_ns: u64,
    /// Time above the moving threshold.
    pub drive_time_ns: u64,
    pub drive_time_active_ns: u64,
    pub cruise_press_ns: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub odo_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odo_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odo_distance: Option<f64>,
    /// `None` when no odometer reading was decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engaged_distance: Option<f64>,

    pub engagement_pct: f64,
    pub drive_time_engagement_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_pct_odo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interventions_per_100km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steer_interventions_per_100km: Option<f64>,

    pub cruise_press_seconds: f64,
    pub cruise_press_seconds_per_hour: f64,

    pub total_state_changes: u32,
    /// Completed disengage/re-engage cycles.
    pub intervention_count: u32,
    pub steer_intervention_count: u32,
    pub steer_check_enabled: bool,

    /// Per speed bucket, in configured order.
    pub speed_buckets: Vec<BucketSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitudinal_control: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub car_fingerprint: Option<String>,

    #[serde(default)]
    pub metadata: DriveMetadata,
}

impl DriveStatistics {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn total_time_seconds(&self) -> f64 {
        ns_to_secs(self.total_time_ns)
    }

    pub fn active_time_seconds(&self) -> f64 {
        ns_to_secs(self.active_time_ns)
    }

    pub fn drive_time_seconds(&self) -> f64 {
        ns_to_secs(self.drive_time_ns)
    }

    /// Whether any segment contributed.
    pub fn has_data(&self) -> bool {
        self.processed_segments > 0
    }

    pub fn bucket(&self, key: &str) -> Option<&BucketSummary> {
        self.speed_buckets.iter().find(|b| b.key == key)
    }
}

/// Folds segment summaries of one drive into [`DriveStatistics`].
#[derive(Debug, Clone)]
pub struct DriveStatsAggregator {
    drive_id: String,
    segment_count: usize,
    steer_check_enabled: bool,
    metadata: DriveMetadata,
    buckets: Vec<SpeedBucket>,
    bucket_totals: Vec<BucketTotals>,
    processed: usize,
    skipped: Vec<SkippedSegment>,
    total_ns: u64,
    active_ns: u64,
    drive_ns: u64,
    drive_active_ns: u64,
    cruise_press_ns: u64,
}

impl DriveStatsAggregator {
    pub fn new(drive: &Drive, buckets: &[SpeedBucket]) -> Self {
        Self {
            drive_id: drive.id.to_string(),
            segment_count: drive.segment_count(),
            steer_check_enabled: drive.capabilities.steer_intervention_check,
            metadata: drive.metadata.clone(),
            buckets: buckets.to_vec(),
            bucket_totals: vec![BucketTotals::default(); buckets.len()],
            processed: 0,
            skipped: Vec::new(),
            total_ns: 0,
            active_ns: 0,
            drive_ns: 0,
            drive_active_ns: 0,
            cruise_press_ns: 0,
        }
    }

    /// Add a completed segment.
    pub fn fold(&mut self, summary: &SegmentSummary) {
        self.processed += 1;
        self.total_ns += summary.total_ns;
        self.active_ns += summary.active_ns;
        self.drive_ns += summary.drive_ns;
        self.drive_active_ns += summary.drive_active_ns;
        self.cruise_press_ns += summary.cruise_press_ns;
        for (acc, totals) in self.bucket_totals.iter_mut().zip(&summary.buckets) {
            acc.add(totals);
        }
    }

    /// Record a segment that contributed nothing.
    pub fn skip(&mut self, segment: &SegmentRef, error: &SegmentReadError) {
        self.skipped.push(SkippedSegment {
            segment: segment.to_string(),
            reason: error.to_string(),
        });
    }

    pub fn processed_count(&self) -> usize {
        self.processed
    }

    /// Derive the final statistics, reading drive-scoped counters from
    /// `state`.
    pub fn finalize(self, state: &DriveState) -> DriveStatistics {
        let distance = &state.distance;
        let odo_distance = distance.odo_distance_km();
        let engaged_distance = distance
            .has_readings()
            .then(|| distance.engaged_distance_km());

        let engagement_pct_odo = match (engaged_distance, odo_distance) {
            (Some(engaged), Some(total)) if total > 0.0 => Some(engaged / total * 100.0),
            _ => None,
        };

        let intervention_count = state.engagement.intervention_count();
        let steer_intervention_count = state.steer_interventions;

        let cruise_press_seconds_per_hour = if self.drive_ns > 0 {
            self.cruise_press_ns as f64 / self.drive_ns as f64 * SECS_PER_HOUR
        } else {
            0.0
        };

        let speed_buckets = self
            .buckets
            .iter()
            .zip(&self.bucket_totals)
            .map(|(bucket, totals)| BucketSummary::from_totals(bucket, totals))
            .collect();

        DriveStatistics {
            drive_id: self.drive_id,
            segment_count: self.segment_count,
            processed_segments: self.processed,
            skipped_segments: self.skipped,
            total_time_ns: self.total_ns,
            active_time_ns: self.active_ns,
            drive_time_ns: self.drive_ns,
            drive_time_active_ns: self.drive_active_ns,
            cruise_press_ns: self.cruise_press_ns,
            odo_start: distance.odo_start(),
            odo_end: distance.odo_end(),
            odo_distance,
            engaged_distance,
            engagement_pct: pct_or_zero(self.active_ns, self.total_ns),
            drive_time_engagement_pct: pct_or_zero(self.drive_active_ns, self.drive_ns),
            engagement_pct_odo,
            interventions_per_100km: per_100km(intervention_count as f64, odo_distance),
            steer_interventions_per_100km: per_100km(steer_intervention_count as f64, odo_distance),
            cruise_press_seconds: ns_to_secs(self.cruise_press_ns),
            cruise_press_seconds_per_hour,
            total_state_changes: state.engagement.state_changes(),
            intervention_count,
            steer_intervention_count,
            steer_check_enabled: self.steer_check_enabled,
            speed_buckets,
            longitudinal_control: state.longitudinal_control,
            car_fingerprint: state.car_fingerprint.clone(),
            metadata: self.metadata,
        }
    }
}

/// Totals across many drives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub drive_count: usize,
    pub total_time_ns: u64,
    pub active_time_ns: u64,
    pub drive_time_ns: u64,
    pub drive_time_active_ns: u64,
    pub cruise_press_ns: u64,
    /// Odometer distance over drives with a positive odometer distance.
    pub distance_km: f64,
    /// Engaged distance over the same drives.
    pub engaged_distance_km: f64,
    pub total_state_changes: u64,
    pub intervention_count: u64,
    pub steer_intervention_count: u64,
    /// Distance of drives that had steering checks enabled.
    pub steer_checked_distance_km: f64,

    pub engagement_pct: f64,
    pub drive_time_engagement_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_pct_odo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interventions_per_100km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steer_interventions_per_100km: Option<f64>,
    pub cruise_press_seconds_per_hour: f64,

    /// Bucket totals matched by key, in first-seen order.
    pub speed_buckets: Vec<BucketSummary>,
}

impl FleetSummary {
    /// Fold per-drive statistics.
    pub fn from_drives(drives: &[DriveStatistics]) -> Self {
        let mut summary = Self {
            drive_count: drives.len(),
            ..Self::default()
        };

        // per-100km rates only count drives whose odometer moved
        let mut counted_interventions: u64 = 0;
        let mut counted_steer: u64 = 0;

        for drive in drives {
            summary.total_time_ns += drive.total_time_ns;
            summary.active_time_ns += drive.active_time_ns;
            summary.drive_time_ns += drive.drive_time_ns;
            summary.drive_time_active_ns += drive.drive_time_active_ns;
            summary.cruise_press_ns += drive.cruise_press_ns;
            summary.total_state_changes += u64::from(drive.total_state_changes);
            summary.intervention_count += u64::from(drive.intervention_count);
            summary.steer_intervention_count += u64::from(drive.steer_intervention_count);

            if let Some(km) = drive.odo_distance.filter(|d| *d > 0.0) {
                summary.distance_km += km;
                summary.engaged_distance_km += drive.engaged_distance.unwrap_or(0.0);
                counted_interventions += u64::from(drive.intervention_count);
                if drive.steer_check_enabled {
                    summary.steer_checked_distance_km += km;
                    counted_steer += u64::from(drive.steer_intervention_count);
                }
            }

            for bucket in &drive.speed_buckets {
                match summary.speed_buckets.iter_mut().find(|b| b.key == bucket.key) {
                    Some(acc) => acc.add_totals(&bucket.totals()),
                    None => summary.speed_buckets.push(bucket.clone()),
                }
            }
        }

        let distance = Some(summary.distance_km);
        summary.engagement_pct = pct_or_zero(summary.active_time_ns, summary.total_time_ns);
        summary.drive_time_engagement_pct =
            pct_or_zero(summary.drive_time_active_ns, summary.drive_time_ns);
        summary.engagement_pct_odo = (summary.distance_km > 0.0)
            .then(|| summary.engaged_distance_km / summary.distance_km * 100.0);
        summary.interventions_per_100km = per_100km(counted_interventions as f64, distance);
        summary.steer_interventions_per_100km =
            per_100km(counted_steer as f64, Some(summary.steer_checked_distance_km));
        summary.cruise_press_seconds_per_hour = if summary.drive_time_ns > 0 {
            summary.cruise_press_ns as f64 / summary.drive_time_ns as f64 * SECS_PER_HOUR
        } else {
            0.0
        };
        summary
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
