// Gauge Testdata - Telemetry generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Synthetic segmented telemetry.
//!
//! Every sample period produces one controls state, one car state and three
//! CAN frames (odometer, steering torques, cruise buttons), all encoded
//! through [`reference_profile`]. Alongside the events the generator derives
//! the counters an analysis of the drive must report.

use crate::scenario::DriveScenario;
use engagement_gauge::event::NANOS_PER_SEC;
use engagement_gauge::profile::{
    CRUISE_STATE, ODOMETER, STEERING_DRIVER_TORQUE, STEERING_MOTOR_TORQUE,
};
use engagement_gauge::{
    Drive, DriveId, DriveMetadata, Event, MemorySource, MessageDef, MonoTime, SegmentRef,
    SignalDef, SignalDescriptor, VehicleProfile,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Steering torques message.
pub const STEERING_ADDR: u32 = 0x251;
/// Cumulative odometer message.
pub const ODOMETER_ADDR: u32 = 0x3A0;
/// Cruise buttons message.
pub const CRUISE_BUTTONS_ADDR: u32 = 0x4F1;

/// Monotonic clock value at the first sample of segment 0.
pub const BOOT_OFFSET_NS: MonoTime = 5 * NANOS_PER_SEC;

/// File name of each segment's event log.
pub const SEGMENT_FILE: &str = "events.jsonl";

const TORQUE_NOISE_STD: f64 = 0.05;
const ODOMETER_FACTOR: f64 = 0.001;
const MAX_ODOMETER_DELTA_KM: f64 = 1.0;

// Margins used when deciding which overrides must be reported.
const STABLE_MARGIN_S: f64 = 4.0;
const RESOLVE_MARGIN_S: f64 = 1.5;
const DEBOUNCE_MARGIN_S: f64 = 12.0;

fn driver_torque_signal() -> SignalDef {
    SignalDef::new("CR_Mdps_StrColTq", 0, 16).signed().scaled(0.01, 0.0)
}

fn motor_torque_signal() -> SignalDef {
    SignalDef::new("CR_Mdps_OutTq", 16, 16).signed().scaled(0.01, 0.0)
}

fn odometer_signal() -> SignalDef {
    SignalDef::new("CF_Clu_Odometer", 7, 32)
        .big_endian()
        .scaled(ODOMETER_FACTOR, 0.0)
}

fn button_signal(name: &str, bit: u16) -> SignalDef {
    SignalDef::new(name, bit, 1)
}

/// Profile matching the frames produced by [`generate_drive`].
pub fn reference_profile() -> VehicleProfile {
    VehicleProfile::new("synthetic", "synthetic_generic.dbc")
        .with_message(
            MessageDef::new("MDPS12", STEERING_ADDR, 8)
                .with_signal(driver_torque_signal())
                .with_signal(motor_torque_signal()),
        )
        .with_message(MessageDef::new("CLU15", ODOMETER_ADDR, 4).with_signal(odometer_signal()))
        .with_message(
            MessageDef::new("CLU11", CRUISE_BUTTONS_ADDR, 4)
                .with_signal(button_signal("RES_ACCEL", 0))
                .with_signal(button_signal("SET_DECEL", 1))
                .with_signal(button_signal("CANCEL", 2))
                .with_signal(button_signal("MAIN", 3)),
        )
        .bind(
            STEERING_DRIVER_TORQUE,
            SignalDescriptor::new("MDPS12", "CR_Mdps_StrColTq").on_bus(0),
        )
        .bind(
            STEERING_MOTOR_TORQUE,
            SignalDescriptor::new("MDPS12", "CR_Mdps_OutTq").on_bus(0),
        )
        .bind(ODOMETER, SignalDescriptor::new("CLU15", "CF_Clu_Odometer"))
        .bind_many(
            CRUISE_STATE,
            vec![
                SignalDescriptor::new("CLU11", "RES_ACCEL"),
                SignalDescriptor::new("CLU11", "SET_DECEL"),
                SignalDescriptor::new("CLU11", "CANCEL"),
            ],
        )
}

/// Counters an analysis of the generated drive must reproduce.
///
/// Only readable segments contribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedCounters {
    pub processed_segments: usize,
    pub skipped_segments: usize,
    pub total_time_ns: u64,
    pub active_time_ns: u64,
    pub state_changes: u32,
    pub disengagement_cycles: u32,
    /// Overrides placed so that the detector must report them.
    pub steer_interventions: u32,
    pub cruise_press_ns: u64,
    pub odometer_start_km: Option<f64>,
    pub odometer_end_km: Option<f64>,
    /// Speed integral over readable segments.
    pub driven_km: f64,
}

impl ExpectedCounters {
    pub fn odometer_distance_km(&self) -> Option<f64> {
        match (self.odometer_start_km, self.odometer_end_km) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// A generated drive, ready for analysis.
#[derive(Debug, Clone)]
pub struct GeneratedDrive {
    pub scenario: DriveScenario,
    pub drive: Drive,
    pub profile: VehicleProfile,
    pub source: MemorySource,
    pub expected: ExpectedCounters,
}

impl GeneratedDrive {
    pub fn events(&self, segment: &SegmentRef) -> Option<&[Event]> {
        self.source.events(segment)
    }
}

/// Reference of segment `index` of a drive.
pub fn segment_ref(drive_id: &str, index: u32) -> SegmentRef {
    SegmentRef::new(format!("{}--{}/{}", drive_id, index, SEGMENT_FILE))
}

/// Replays the acceptance rules of the analysis over the sampled data.
#[derive(Debug, Default)]
struct Expectation {
    counters: ExpectedCounters,
    engaged: Option<bool>,
    pending_reengagement: bool,
    odo_last: Option<f64>,
}

impl Expectation {
    fn controls(&mut self, engaged: bool) {
        let Some(previous) = self.engaged.replace(engaged) else {
            return;
        };
        if previous == engaged {
            return;
        }
        self.counters.state_changes += 1;
        if !engaged {
            self.pending_reengagement = true;
        } else if self.pending_reengagement {
            self.pending_reengagement = false;
            self.counters.disengagement_cycles += 1;
        }
    }

    fn odometer(&mut self, km: f64) {
        match self.odo_last {
            None => {
                self.counters.odometer_start_km = Some(km);
                self.counters.odometer_end_km = Some(km);
                self.odo_last = Some(km);
            }
            Some(last) => {
                let delta = km - last;
                if delta > 0.0 && delta < MAX_ODOMETER_DELTA_KM {
                    self.counters.odometer_end_km = Some(km);
                    self.odo_last = Some(km);
                }
            }
        }
    }
}

fn noise(std: f64) -> Option<Normal<f64>> {
    if std > 0.0 {
        Normal::new(0.0, std).ok()
    } else {
        None
    }
}

fn cruise_pressed(scenario: &DriveScenario, t: f64) -> bool {
    scenario
        .engagement_windows
        .iter()
        .any(|w| t >= w.start_s && t < w.start_s + scenario.cruise_press_s)
}

fn overriding(scenario: &DriveScenario, t: f64) -> bool {
    scenario
        .steering_overrides
        .iter()
        .any(|&start| t >= start && t < start + scenario.override_duration_s)
}

fn engaged_throughout(scenario: &DriveScenario, from: f64, to: f64) -> bool {
    let step = 1.0 / scenario.sample_rate_hz;
    let mut t = from;
    while t <= to {
        if !scenario.is_engaged_at(t) {
            return false;
        }
        t += step;
    }
    scenario.is_engaged_at(to)
}

/// Overrides the detector is guaranteed to report.
fn reportable_overrides(scenario: &DriveScenario) -> u32 {
    let mut starts = scenario.steering_overrides.clone();
    starts.sort_by(|a, b| a.total_cmp(b));

    let mut counted = 0;
    let mut last: Option<(u32, f64)> = None;
    for start in starts {
        let index = (start / scenario.segment_duration_s).floor() as u32;
        if index >= scenario.segments || !scenario.is_readable(index) {
            continue;
        }
        let segment_start = index as f64 * scenario.segment_duration_s;
        let segment_end = segment_start + scenario.segment_duration_s;
        let end = start + scenario.override_duration_s + RESOLVE_MARGIN_S;
        if start - segment_start < STABLE_MARGIN_S || end >= segment_end {
            continue;
        }
        if !engaged_throughout(scenario, start - STABLE_MARGIN_S, end) {
            continue;
        }
        if let Some((seg, t)) = last {
            if seg == index && start - t < DEBOUNCE_MARGIN_S {
                continue;
            }
        }
        counted += 1;
        last = Some((index, start));
    }
    counted
}

/// Generate a drive from a scenario.
pub fn generate_drive(scenario: &DriveScenario) -> GeneratedDrive {
    let mut rng = match scenario.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let speed_noise = noise(scenario.speed_noise_std);
    let torque_noise = noise(TORQUE_NOISE_STD);

    let driver_sig = driver_torque_signal();
    let motor_sig = motor_torque_signal();
    let odo_sig = odometer_signal();
    let set_sig = button_signal("SET_DECEL", 1);
    let main_sig = button_signal("MAIN", 3);

    let rate = scenario.sample_rate_hz.max(f64::MIN_POSITIVE);
    let dt_ns = (NANOS_PER_SEC as f64 / rate).round() as u64;
    let dt_s = dt_ns as f64 / NANOS_PER_SEC as f64;
    let per_segment = scenario.samples_per_segment();
    let segment_ns = (scenario.segment_duration_s * NANOS_PER_SEC as f64).round() as u64;
    let duration_s = scenario.duration_s();

    let mut source = MemorySource::new();
    let mut refs = Vec::with_capacity(scenario.segments as usize);
    let mut expectation = Expectation::default();
    let mut odometer_km = scenario.odometer_start_km;

    for index in 0..scenario.segments {
        let segment = segment_ref(&scenario.drive_start, index);
        let readable = scenario.is_readable(index);
        let mut events = Vec::with_capacity(per_segment * 5 + 1);
        let mut prev_pressed: Option<bool> = None;
        let mut prev_active = false;

        for i in 0..per_segment {
            let now = BOOT_OFFSET_NS + index as u64 * segment_ns + i as u64 * dt_ns;
            let t = index as f64 * scenario.segment_duration_s + i as f64 * dt_s;
            let engaged = scenario.is_engaged_at(t);

            let mut speed = scenario.speed.speed_at(t, duration_s);
            if let Some(dist) = &speed_noise {
                speed += dist.sample(&mut rng);
            }
            let speed = speed.max(0.0);
            if i > 0 {
                odometer_km += speed * dt_s / 1000.0;
            }
            let raw_odo = (odometer_km / ODOMETER_FACTOR).round();

            let mut driver = if overriding(scenario, t) {
                scenario.override_torque
            } else {
                0.0
            };
            let mut motor = 0.0;
            if let Some(dist) = &torque_noise {
                driver += dist.sample(&mut rng);
                motor += dist.sample(&mut rng);
            }
            let pressed = cruise_pressed(scenario, t);

            if i == 0 {
                events.push(Event::car_params(
                    now,
                    scenario.longitudinal_control,
                    &scenario.car_fingerprint,
                ));
            }
            events.push(Event::controls_state(now, engaged));
            events.push(Event::car_state(now, speed));

            let mut odo_payload = [0u8; 4];
            odo_sig.pack(&mut odo_payload, raw_odo * ODOMETER_FACTOR);
            events.push(Event::can(now, 0, ODOMETER_ADDR, &odo_payload));

            let mut steer_payload = [0u8; 8];
            driver_sig.pack(&mut steer_payload, driver);
            motor_sig.pack(&mut steer_payload, motor);
            events.push(Event::can(now, 0, STEERING_ADDR, &steer_payload));

            let mut buttons = [0u8; 4];
            main_sig.pack(&mut buttons, 1.0);
            if pressed {
                set_sig.pack(&mut buttons, 1.0);
            }
            events.push(Event::can(now, 0, CRUISE_BUTTONS_ADDR, &buttons));

            if readable {
                let counters = &mut expectation.counters;
                if i > 0 {
                    counters.total_time_ns += dt_ns;
                    counters.driven_km += speed * dt_s / 1000.0;
                    if prev_active && engaged {
                        counters.active_time_ns += dt_ns;
                    }
                }
                if prev_pressed == Some(true) {
                    counters.cruise_press_ns += dt_ns;
                }
                expectation.controls(engaged);
                expectation.odometer(raw_odo * ODOMETER_FACTOR);
            }
            prev_active = engaged;
            prev_pressed = Some(pressed);
        }

        source.insert(segment.clone(), events);
        if readable {
            expectation.counters.processed_segments += 1;
        } else {
            source.mark_unreadable(segment.clone());
            expectation.counters.skipped_segments += 1;
        }
        refs.push(segment);
    }

    let mut expected = expectation.counters;
    expected.steer_interventions = reportable_overrides(scenario);

    let drive = Drive::new(DriveId::new(scenario.drive_start.clone()), refs).with_metadata(
        DriveMetadata {
            device_type: Some("synthetic".to_string()),
            ..DriveMetadata::default()
        },
    );

    GeneratedDrive {
        scenario: scenario.clone(),
        drive,
        profile: reference_profile(),
        source,
        expected,
    }
}
