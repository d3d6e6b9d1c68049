// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Decoded telemetry events.
//!
//! An event source yields one of these per call, already decoded from the
//! recording container. Timestamps are monotonic nanoseconds, ordered within
//! a segment but not continuous across segment boundaries.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Monotonic timestamp in nanoseconds.
pub type MonoTime = u64;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Maximum classic CAN payload length.
pub const MAX_CAN_PAYLOAD: usize = 8;

/// A timestamped telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic log time (ns).
    pub mono_time_ns: MonoTime,
    /// Event payload.
    pub kind: EventKind,
}

/// Event payload kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Automation controller state.
    ControlsState { active: bool },
    /// Vehicle state (ego speed).
    CarState { speed_mps: f64 },
    /// Static vehicle parameters announced by the controller.
    CarParams {
        longitudinal_control: bool,
        fingerprint: String,
    },
    /// Raw bus frame, decoded through the vehicle profile.
    CanFrame(CanFrame),
}

/// A single raw bus frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    /// Bus (source) number.
    pub bus: u8,
    /// Arbitration id.
    pub address: u32,
    /// Payload, at most [`MAX_CAN_PAYLOAD`] bytes.
    #[serde(deserialize_with = "bounded_payload")]
    pub payload: Vec<u8>,
}

fn bounded_payload<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let payload = Vec::<u8>::deserialize(deserializer)?;
    if payload.len() > MAX_CAN_PAYLOAD {
        return Err(D::Error::invalid_length(
            payload.len(),
            &"a payload of at most 8 bytes",
        ));
    }
    Ok(payload)
}

impl CanFrame {
    /// Create a frame, truncating the payload to eight bytes.
    pub fn new(bus: u8, address: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_CAN_PAYLOAD);
        Self {
            bus,
            address,
            payload: payload[..len].to_vec(),
        }
    }
}

impl Event {
    /// Create an event.
    pub fn new(mono_time_ns: MonoTime, kind: EventKind) -> Self {
        Self { mono_time_ns, kind }
    }

    /// Controls state sample.
    pub fn controls_state(mono_time_ns: MonoTime, active: bool) -> Self {
        Self::new(mono_time_ns, EventKind::ControlsState { active })
    }

    /// Car state sample.
    pub fn car_state(mono_time_ns: MonoTime, speed_mps: f64) -> Self {
        Self::new(mono_time_ns, EventKind::CarState { speed_mps })
    }

    /// Car params announcement.
    pub fn car_params(mono_time_ns: MonoTime, longitudinal_control: bool, fingerprint: &str) -> Self {
        Self::new(
            mono_time_ns,
            EventKind::CarParams {
                longitudinal_control,
                fingerprint: fingerprint.to_string(),
            },
        )
    }

    /// Bus frame.
    pub fn can(mono_time_ns: MonoTime, bus: u8, address: u32, payload: &[u8]) -> Self {
        Self::new(
            mono_time_ns,
            EventKind::CanFrame(CanFrame::new(bus, address, payload)),
        )
    }

    /// Short name of the payload kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::ControlsState { .. } => "controls_state",
            EventKind::CarState { .. } => "car_state",
            EventKind::CarParams { .. } => "car_params",
            EventKind::CanFrame(_) => "can",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_payload_truncated() {
        let frame = CanFrame::new(0, 0x4F1, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(frame.payload.len(), MAX_CAN_PAYLOAD);
        assert_eq!(frame.payload[7], 8);
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::controls_state(42, true);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"controls_state\""));
        assert!(json.contains("\"mono_time_ns\":42"));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_can_event_json() {
        let json = r#"{"mono_time_ns":7,"kind":{"type":"can_frame","bus":1,"address":1265,"payload":[0,1,2,3]}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        match event.kind {
            EventKind::CanFrame(frame) => {
                assert_eq!(frame.bus, 1);
                assert_eq!(frame.address, 1265);
                assert_eq!(frame.payload, vec![0, 1, 2, 3]);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_oversized_can_payload_rejected() {
        let json = r#"{"mono_time_ns":7,"kind":{"type":"can_frame","bus":0,"address":1265,"payload":[0,1,2,3,4,5,6,7,8]}}"#;
        let err = serde_json::from_str::<Event>(json).unwrap_err();
        assert!(err.to_string().contains("at most 8 bytes"));
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(Event::car_state(0, 1.0).kind_name(), "car_state");
        assert_eq!(Event::car_params(0, true, "KIA_EV6").kind_name(), "car_params");
    }
}
