// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-segment event processing.
//!
//! State is split by lifetime. [`DriveState`] (engagement, odometer chain,
//! intervention totals, car params) is created once per drive and carried
//! from segment to segment. [`SegmentState`] (active-time clock, torque
//! filters and comparator, cruise and speed integration) starts fresh for
//! every segment, since segments do not share continuous history.
//!
//! A segment is processed against a copy of the drive state which replaces
//! the original only once the whole stream has been consumed. A stream that
//! fails half way therefore leaves no trace, and its debug records are
//! discarded with it.

use log::{debug, trace};

use crate::config::GaugeConfig;
use crate::cruise::CruiseHoldTracker;
use crate::decoder::{FrameDecode, SignalDecoder};
use crate::distance::{DistanceTracker, OdometerReading};
use crate::drive::{Drive, SegmentRef};
use crate::engagement::{ActiveTimeClock, EngagementStateMachine, Transition};
use crate::error::SegmentReadError;
use crate::event::{CanFrame, Event, EventKind, MonoTime, NANOS_PER_SEC};
use crate::intervention::{DebugSink, InterventionDetector, InterventionEdge, InterventionRecord};
use crate::profile::{CRUISE_STATE, ODOMETER, STEERING_DRIVER_TORQUE, STEERING_MOTOR_TORQUE};
use crate::source::EventStream;
use crate::speed::{BucketTotals, DriveTimeTracker, SpeedBucketAggregator};

/// State carried across the segments of one drive.
#[derive(Debug, Clone)]
pub struct DriveState {
    pub engagement: EngagementStateMachine,
    pub distance: DistanceTracker,
    /// Steering interventions detected so far.
    pub steer_interventions: u32,
    /// First-seen longitudinal control flag.
    pub longitudinal_control: Option<bool>,
    /// First-seen non-empty vehicle fingerprint.
    pub car_fingerprint: Option<String>,
}

impl DriveState {
    pub fn new(config: &GaugeConfig) -> Self {
        Self {
            engagement: EngagementStateMachine::new(config.engagement.stability_buffer_ns),
            distance: DistanceTracker::new(&config.odometer),
            steer_interventions: 0,
            longitudinal_control: None,
            car_fingerprint: None,
        }
    }

    fn observe_car_params(&mut self, longitudinal_control: bool, fingerprint: &str) {
        if self.longitudinal_control.is_none() {
            self.longitudinal_control = Some(longitudinal_control);
        }
        if self.car_fingerprint.is_none() && !fingerprint.is_empty() {
            self.car_fingerprint = Some(fingerprint.to_string());
        }
    }
}

/// Trackers that live for a single segment.
#[derive(Debug, Clone)]
pub struct SegmentState {
    first_event_ns: Option<MonoTime>,
    clock: ActiveTimeClock,
    intervention: InterventionDetector,
    cruise: CruiseHoldTracker,
    speed: SpeedBucketAggregator,
    drive_time: DriveTimeTracker,
    events: u64,
    steer_interventions: u32,
}

impl SegmentState {
    pub fn new(config: &GaugeConfig) -> Self {
        Self {
            first_event_ns: None,
            clock: ActiveTimeClock::new(),
            intervention: InterventionDetector::new(config.intervention.clone()),
            cruise: CruiseHoldTracker::new(),
            speed: SpeedBucketAggregator::new(&config.speed_buckets),
            drive_time: DriveTimeTracker::new(&config.drive_time),
            events: 0,
            steer_interventions: 0,
        }
    }

    /// Seconds since the segment's first controls sample, or its first
    /// event before any controls sample arrived.
    fn offset_seconds(&self, now: MonoTime) -> f64 {
        let start = self
            .clock
            .start_ns()
            .or(self.first_event_ns)
            .unwrap_or(now);
        now.saturating_sub(start) as f64 / NANOS_PER_SEC as f64
    }

    fn into_summary(self, segment: &SegmentRef) -> SegmentSummary {
        SegmentSummary {
            segment: segment.clone(),
            event_count: self.events,
            total_ns: self.clock.total_ns(),
            active_ns: self.clock.active_ns(),
            drive_ns: self.drive_time.drive_ns(),
            drive_active_ns: self.drive_time.drive_active_ns(),
            cruise_press_ns: self.cruise.press_ns(),
            car_state_span_ns: self.speed.observed_span_ns(),
            buckets: self.speed.totals().to_vec(),
            steer_interventions: self.steer_interventions,
        }
    }
}

/// Additive output of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: SegmentRef,
    pub event_count: u64,
    /// First to last controls sample.
    pub total_ns: u64,
    pub active_ns: u64,
    pub drive_ns: u64,
    pub drive_active_ns: u64,
    pub cruise_press_ns: u64,
    /// First to last CarState sample.
    pub car_state_span_ns: u64,
    /// Speed bucket totals, in configured bucket order.
    pub buckets: Vec<BucketTotals>,
    pub steer_interventions: u32,
}

/// Runs one segment's events through the trackers.
pub struct SegmentProcessor<'a> {
    config: &'a GaugeConfig,
    decoder: &'a SignalDecoder,
}

impl<'a> SegmentProcessor<'a> {
    pub fn new(config: &'a GaugeConfig, decoder: &'a SignalDecoder) -> Self {
        Self { config, decoder }
    }

    /// Consume a segment's stream.
    ///
    /// On success `drive_state` is advanced and buffered debug records are
    /// flushed to `sink`. On a stream error neither happens.
    pub fn process(
        &self,
        drive: &Drive,
        segment: &SegmentRef,
        drive_state: &mut DriveState,
        events: EventStream<'_>,
        sink: Option<&mut dyn DebugSink>,
    ) -> Result<SegmentSummary, SegmentReadError> {
        let mut working = drive_state.clone();
        working.engagement.begin_segment();

        let mut run = SegmentRun {
            drive,
            segment,
            decoder: self.decoder,
            state: &mut working,
            segment_state: SegmentState::new(self.config),
            records: Vec::new(),
        };

        for event in events {
            run.handle(&event?);
        }

        let SegmentRun {
            segment_state,
            records,
            ..
        } = run;

        *drive_state = working;
        if let Some(sink) = sink {
            for record in records {
                sink.record(record);
            }
        }
        Ok(segment_state.into_summary(segment))
    }
}

/// Borrowed context for one pass over a segment.
struct SegmentRun<'r> {
    drive: &'r Drive,
    segment: &'r SegmentRef,
    decoder: &'r SignalDecoder,
    state: &'r mut DriveState,
    segment_state: SegmentState,
    records: Vec<InterventionRecord>,
}

impl SegmentRun<'_> {
    fn handle(&mut self, event: &Event) {
        let now = event.mono_time_ns;
        self.segment_state.first_event_ns.get_or_insert(now);
        self.segment_state.events += 1;

        match &event.kind {
            EventKind::ControlsState { active } => self.on_controls(now, *active),
            EventKind::CarState { speed_mps } => {
                let engaged = self.state.engagement.is_engaged();
                self.segment_state.speed.observe(now, *speed_mps, engaged);
                self.segment_state.drive_time.observe(now, *speed_mps, engaged);
            }
            EventKind::CarParams {
                longitudinal_control,
                fingerprint,
            } => self.state.observe_car_params(*longitudinal_control, fingerprint),
            EventKind::CanFrame(frame) => self.on_can(now, frame),
        }
    }

    fn on_controls(&mut self, now: MonoTime, active: bool) {
        let transition = self.state.engagement.observe(now, active);
        if transition.is_change() {
            debug!(
                "[{} {}] engagement {:?} at {:.2}s (changes={}, cycles={})",
                self.drive.id,
                self.segment,
                transition,
                self.segment_state.offset_seconds(now),
                self.state.engagement.state_changes(),
                self.state.engagement.intervention_count()
            );
        }
        if transition == Transition::Baseline {
            debug!("[{} {}] engagement baseline active={}", self.drive.id, self.segment, active);
        }
        self.segment_state.clock.observe(now, active);
    }

    fn on_can(&mut self, now: MonoTime, frame: &CanFrame) {
        let decoded = match self.decoder.decode_frame(frame.bus, frame.address, &frame.payload) {
            FrameDecode::Decoded(decoded) if !decoded.is_empty() => decoded,
            FrameDecode::Undersized { expected, actual } => {
                trace!(
                    "[{} {}] undersized payload for 0x{:X} on bus {}: {} < {} bytes",
                    self.drive.id,
                    self.segment,
                    frame.address,
                    frame.bus,
                    actual,
                    expected
                );
                return;
            }
            _ => return,
        };
        let engaged = self.state.engagement.is_engaged();

        if let Some(km) = decoded.scalar(ODOMETER) {
            if let OdometerReading::Rejected { delta_km } = self.state.distance.observe(km, engaged)
            {
                trace!(
                    "[{} {}] rejected odometer delta {:.4} km at {:.3} km",
                    self.drive.id,
                    self.segment,
                    delta_km,
                    km
                );
            }
        }

        if let Some(mask) = decoded.mask(CRUISE_STATE) {
            self.segment_state.cruise.observe(now, mask);
        }

        if !self.drive.capabilities.steer_intervention_check {
            return;
        }

        let detector = &mut self.segment_state.intervention;
        let mut updated = false;
        if let Some(torque) = decoded.scalar(STEERING_DRIVER_TORQUE) {
            detector.update_driver_torque(torque);
            updated = true;
        }
        if let Some(torque) = decoded.scalar(STEERING_MOTOR_TORQUE) {
            detector.update_motor_torque(torque);
            updated = true;
        }
        if !updated || !engaged || !self.state.engagement.is_stable(now) {
            return;
        }
        let Some(diff) = detector.filtered_diff() else {
            return;
        };

        match detector.evaluate(now, diff) {
            Some(InterventionEdge::Started { diff }) => {
                self.state.steer_interventions += 1;
                self.segment_state.steer_interventions += 1;
                let offset = self.segment_state.offset_seconds(now);
                debug!(
                    "[{} {}] steering intervention at {:.2}s (diff: {:.3})",
                    self.drive.id, self.segment, offset, diff
                );
                self.records.push(InterventionRecord::new(
                    self.drive.id.as_str(),
                    self.segment.as_str(),
                    offset,
                    diff,
                ));
            }
            Some(InterventionEdge::Resolved { diff }) => {
                debug!(
                    "[{} {}] steering intervention resolved (diff: {:.3})",
                    self.drive.id, self.segment, diff
                );
            }
            None => {}
        }
    }
}
