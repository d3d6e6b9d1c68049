// Gauge Testdata - Drive scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Drive scenario definitions.
//!
//! A scenario describes a drive in drive-relative seconds: how fast the car
//! goes, when the automation is engaged, when the driver overrides the
//! steering and which segments end up unreadable.

use chrono::NaiveDateTime;
use engagement_gauge::drive::DRIVE_TIME_FORMAT;
use serde::{Deserialize, Serialize};

/// Vehicle speed over the drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeedProfile {
    /// Fixed speed.
    Constant { mps: f64 },
    /// Linear change from `from_mps` to `to_mps` over the drive.
    Ramp { from_mps: f64, to_mps: f64 },
    /// Triangle wave between `min_mps` and `max_mps`.
    Cycle {
        min_mps: f64,
        max_mps: f64,
        period_s: f64,
    },
}

impl SpeedProfile {
    /// Speed at `t` seconds into a drive lasting `duration_s`.
    pub fn speed_at(&self, t: f64, duration_s: f64) -> f64 {
        match self {
            Self::Constant { mps } => *mps,
            Self::Ramp { from_mps, to_mps } => {
                let frac = if duration_s > 0.0 {
                    (t / duration_s).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                from_mps + (to_mps - from_mps) * frac
            }
            Self::Cycle {
                min_mps,
                max_mps,
                period_s,
            } => {
                if *period_s <= 0.0 {
                    return *min_mps;
                }
                let phase = (t % period_s) / period_s;
                let tri = if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 };
                min_mps + (max_mps - min_mps) * tri
            }
        }
    }
}

/// Half-open interval `[start_s, end_s)` of engaged driving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementWindow {
    pub start_s: f64,
    pub end_s: f64,
}

impl EngagementWindow {
    pub fn new(start_s: f64, end_s: f64) -> Self {
        Self { start_s, end_s }
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_s && t < self.end_s
    }
}

/// Complete drive description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveScenario {
    /// Drive start, formatted as a drive id.
    pub drive_start: String,
    /// Number of segments.
    pub segments: u32,
    /// Segment length in seconds.
    pub segment_duration_s: f64,
    /// Samples per second for every signal.
    pub sample_rate_hz: f64,
    pub speed: SpeedProfile,
    /// Standard deviation of speed noise (m/s).
    pub speed_noise_std: f64,
    pub engagement_windows: Vec<EngagementWindow>,
    /// Start times of steering overrides (drive-relative seconds).
    pub steering_overrides: Vec<f64>,
    /// Override length in seconds.
    pub override_duration_s: f64,
    /// Driver torque during an override (Nm).
    pub override_torque: f64,
    /// Cruise SET hold at each engagement start (seconds).
    pub cruise_press_s: f64,
    pub odometer_start_km: f64,
    /// Segment indices whose recordings cannot be read.
    #[serde(default)]
    pub unreadable_segments: Vec<u32>,
    pub car_fingerprint: String,
    pub longitudinal_control: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for DriveScenario {
    fn default() -> Self {
        Self {
            drive_start: "2025-03-14--08-30-00".to_string(),
            segments: 3,
            segment_duration_s: 60.0,
            sample_rate_hz: 10.0,
            speed: SpeedProfile::Constant { mps: 20.0 },
            speed_noise_std: 0.0,
            engagement_windows: Vec::new(),
            steering_overrides: Vec::new(),
            override_duration_s: 2.0,
            override_torque: 3.0,
            cruise_press_s: 0.5,
            odometer_start_km: 12_345.0,
            unreadable_segments: Vec::new(),
            car_fingerprint: "HYUNDAI_IONIQ_5".to_string(),
            longitudinal_control: true,
            seed: None,
        }
    }
}

impl DriveScenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drive start time.
    pub fn starting_at(mut self, start: NaiveDateTime) -> Self {
        self.drive_start = start.format(DRIVE_TIME_FORMAT).to_string();
        self
    }

    pub fn with_segments(mut self, segments: u32, duration_s: f64) -> Self {
        self.segments = segments;
        self.segment_duration_s = duration_s;
        self
    }

    pub fn with_sample_rate(mut self, hz: f64) -> Self {
        self.sample_rate_hz = hz;
        self
    }

    pub fn with_speed(mut self, speed: SpeedProfile) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_speed_noise(mut self, std: f64) -> Self {
        self.speed_noise_std = std;
        self
    }

    pub fn engaged_between(mut self, start_s: f64, end_s: f64) -> Self {
        self.engagement_windows.push(EngagementWindow::new(start_s, end_s));
        self
    }

    pub fn with_override_at(mut self, t: f64) -> Self {
        self.steering_overrides.push(t);
        self
    }

    pub fn with_odometer_start(mut self, km: f64) -> Self {
        self.odometer_start_km = km;
        self
    }

    pub fn with_unreadable_segment(mut self, index: u32) -> Self {
        self.unreadable_segments.push(index);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Total drive length in seconds.
    pub fn duration_s(&self) -> f64 {
        self.segments as f64 * self.segment_duration_s
    }

    /// Samples per segment.
    pub fn samples_per_segment(&self) -> usize {
        (self.segment_duration_s * self.sample_rate_hz).round() as usize
    }

    pub fn is_engaged_at(&self, t: f64) -> bool {
        self.engagement_windows.iter().any(|w| w.contains(t))
    }

    pub fn is_readable(&self, index: u32) -> bool {
        !self.unreadable_segments.contains(&index)
    }

    /// Stop-and-go commute: mostly engaged, two disengagements, one
    /// steering override.
    pub fn commute() -> Self {
        Self::new()
            .with_segments(4, 60.0)
            .with_speed(SpeedProfile::Cycle {
                min_mps: 3.0,
                max_mps: 18.0,
                period_s: 50.0,
            })
            .engaged_between(5.0, 70.0)
            .engaged_between(80.0, 150.0)
            .engaged_between(165.0, 240.0)
            .with_override_at(100.0)
            .with_seed(42)
    }

    /// Steady highway run with a single long engagement.
    pub fn highway() -> Self {
        Self::new()
            .with_segments(5, 60.0)
            .with_speed(SpeedProfile::Ramp {
                from_mps: 22.0,
                to_mps: 33.0,
            })
            .with_speed_noise(0.3)
            .engaged_between(10.0, 290.0)
            .with_override_at(130.0)
            .with_override_at(200.0)
            .with_seed(7)
    }
}
