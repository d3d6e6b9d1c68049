// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Vehicle profiles.
//!
//! A profile binds the semantic signal keys the analytics need
//! (odometer, cruise buttons, steering torques) to a vehicle's native
//! message schema. The schema is referenced by name (typically the DBC file
//! it was authored from) and carried inline as a message catalogue:
//!
//! ```json
//! {
//!   "schema": "hyundai_kia_generic.dbc",
//!   "messages": [
//!     { "name": "CLU11", "address": 1265, "length": 4,
//!       "signals": [ { "name": "CF_Clu_CruiseSwState", "start_bit": 0, "bit_length": 3 } ] }
//!   ],
//!   "signals": {
//!     "cruise_state": { "message": "CLU11", "signal": "CF_Clu_CruiseSwState", "bus": 0 }
//!   }
//! }
//! ```
//!
//! Bit layouts follow DBC conventions: for little endian (Intel) signals
//! `start_bit` is the least significant bit; for big endian (Motorola)
//! signals it is the most significant bit in sawtooth numbering.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic key of the cumulative odometer (km).
pub const ODOMETER: &str = "odometer";
/// Semantic key of the cruise-control button state.
pub const CRUISE_STATE: &str = "cruise_state";
/// Semantic key of the driver-applied steering torque.
pub const STEERING_DRIVER_TORQUE: &str = "steering_driver_torque";
/// Semantic key of the steering motor (commanded) torque.
pub const STEERING_MOTOR_TORQUE: &str = "steering_motor_torque";

/// Per-vehicle signal mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    /// Profile name (filled from the catalog key when loaded from one).
    #[serde(default)]
    pub name: String,
    /// Schema reference, e.g. the DBC file name.
    #[serde(default, alias = "dbc_file")]
    pub schema: Option<String>,
    /// Message catalogue of the schema.
    #[serde(default)]
    pub messages: Vec<MessageDef>,
    /// Semantic key to one or more descriptors.
    #[serde(default)]
    pub signals: BTreeMap<String, SignalBinding>,
}

/// One descriptor, or an ordered list of them combined at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalBinding {
    Many(Vec<SignalDescriptor>),
    One(SignalDescriptor),
}

impl SignalBinding {
    /// Descriptors in binding order.
    pub fn descriptors(&self) -> &[SignalDescriptor] {
        match self {
            Self::One(descriptor) => std::slice::from_ref(descriptor),
            Self::Many(list) => list,
        }
    }
}

/// Where a semantic value lives in the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    /// Message name.
    #[serde(default)]
    pub message: String,
    /// Signal name within the message.
    #[serde(default)]
    pub signal: String,
    /// Restrict to frames from this bus; any bus when absent.
    #[serde(default, alias = "source")]
    pub bus: Option<u8>,
    /// Linear transform applied after schema scaling.
    #[serde(default)]
    pub transform: Transform,
}

impl SignalDescriptor {
    /// Descriptor without bus filter or transform.
    pub fn new(message: &str, signal: &str) -> Self {
        Self {
            message: message.to_string(),
            signal: signal.to_string(),
            bus: None,
            transform: Transform::default(),
        }
    }

    /// Restrict to a bus.
    pub fn on_bus(mut self, bus: u8) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Apply a transform.
    pub fn with_transform(mut self, scale: f64, offset: f64) -> Self {
        self.transform = Transform { scale, offset };
        self
    }
}

/// `value * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default = "default_factor")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

impl Transform {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

fn default_factor() -> f64 {
    1.0
}

/// A message in the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDef {
    /// Message name.
    pub name: String,
    /// Arbitration id.
    pub address: u32,
    /// Expected payload length in bytes.
    pub length: usize,
    /// Signals carried by the message.
    #[serde(default)]
    pub signals: Vec<SignalDef>,
}

impl MessageDef {
    pub fn new(name: &str, address: u32, length: usize) -> Self {
        Self {
            name: name.to_string(),
            address,
            length,
            signals: Vec::new(),
        }
    }

    /// Add a signal.
    pub fn with_signal(mut self, signal: SignalDef) -> Self {
        self.signals.push(signal);
        self
    }

    /// Find a signal by name.
    pub fn signal(&self, name: &str) -> Option<&SignalDef> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// Bit order of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Intel.
    #[default]
    LittleEndian,
    /// Motorola.
    BigEndian,
}

/// A signal's bit layout and schema scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDef {
    pub name: String,
    pub start_bit: u16,
    pub bit_length: u8,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub signed: bool,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

impl SignalDef {
    /// Unsigned little endian signal with unit scaling.
    pub fn new(name: &str, start_bit: u16, bit_length: u8) -> Self {
        Self {
            name: name.to_string(),
            start_bit,
            bit_length,
            byte_order: ByteOrder::LittleEndian,
            signed: false,
            factor: 1.0,
            offset: 0.0,
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.byte_order = ByteOrder::BigEndian;
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn scaled(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    /// Payload bit positions, least significant bit first.
    fn has_valid_width(&self) -> bool {
        (1..=64).contains(&self.bit_length)
    }

    fn bit_positions(&self) -> Vec<usize> {
        let len = self.bit_length as usize;
        let start = self.start_bit as usize;
        match self.byte_order {
            ByteOrder::LittleEndian => (start..start + len).collect(),
            ByteOrder::BigEndian => {
                let mut positions = Vec::with_capacity(len);
                let mut pos = start;
                for i in 0..len {
                    positions.push(pos);
                    if i + 1 == len {
                        break;
                    }
                    pos = if pos % 8 == 0 { pos + 15 } else { pos - 1 };
                }
                positions.reverse();
                positions
            }
        }
    }

    /// Check that the layout fits a message of `length` bytes.
    pub fn validate(&self, message: &str, length: usize) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSignalLayout {
            message: message.to_string(),
            signal: self.name.clone(),
            reason,
        };

        if !self.has_valid_width() {
            return Err(invalid(format!(
                "bit length {} outside 1..=64",
                self.bit_length
            )));
        }
        let limit = length * 8;
        if let Some(&pos) = self.bit_positions().iter().find(|&&p| p >= limit) {
            return Err(invalid(format!(
                "bit {} beyond {}-byte message",
                pos, length
            )));
        }
        Ok(())
    }

    /// Extract the physical value (`raw * factor + offset`).
    ///
    /// Returns `None` when the payload is too short for the layout or the
    /// bit length is outside `1..=64`.
    pub fn extract(&self, payload: &[u8]) -> Option<f64> {
        if !self.has_valid_width() {
            return None;
        }
        let mut raw: u64 = 0;
        for (i, pos) in self.bit_positions().into_iter().enumerate() {
            let byte = *payload.get(pos / 8)?;
            let bit = (byte >> (pos % 8)) & 1;
            raw |= (bit as u64) << i;
        }

        let len = self.bit_length as u32;
        let value = if self.signed {
            if len == 64 {
                raw as i64 as f64
            } else if raw & (1u64 << (len - 1)) != 0 {
                (raw as i64 - (1i64 << len)) as f64
            } else {
                raw as f64
            }
        } else {
            raw as f64
        };

        Some(value * self.factor + self.offset)
    }

    /// Write a physical value into the payload (inverse of [`extract`]).
    ///
    /// Bits beyond the payload are ignored, as is a bit length outside
    /// `1..=64`.
    ///
    /// [`extract`]: SignalDef::extract
    pub fn pack(&self, payload: &mut [u8], physical: f64) {
        if !self.has_valid_width() {
            return;
        }
        let raw = ((physical - self.offset) / self.factor).round() as i64 as u64;
        for (i, pos) in self.bit_positions().into_iter().enumerate() {
            if let Some(byte) = payload.get_mut(pos / 8) {
                let mask = 1u8 << (pos % 8);
                if (raw >> i) & 1 == 1 {
                    *byte |= mask;
                } else {
                    *byte &= !mask;
                }
            }
        }
    }
}

impl VehicleProfile {
    /// Empty profile with a schema reference.
    pub fn new(name: &str, schema: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: Some(schema.to_string()),
            messages: Vec::new(),
            signals: BTreeMap::new(),
        }
    }

    /// Add a message to the catalogue.
    pub fn with_message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }

    /// Bind a key to a single descriptor.
    pub fn bind(mut self, key: &str, descriptor: SignalDescriptor) -> Self {
        self.signals
            .insert(key.to_string(), SignalBinding::One(descriptor));
        self
    }

    /// Bind a key to an ordered list of descriptors.
    pub fn bind_many(mut self, key: &str, descriptors: Vec<SignalDescriptor>) -> Self {
        self.signals
            .insert(key.to_string(), SignalBinding::Many(descriptors));
        self
    }

    /// Find a message by name.
    pub fn message(&self, name: &str) -> Option<&MessageDef> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Parse a profile from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Named profiles with an optional default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileCatalog {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, VehicleProfile>,
}

impl ProfileCatalog {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Look up `name`, or the default profile when no name is given.
    pub fn resolve(&self, name: Option<&str>) -> Result<VehicleProfile, ConfigError> {
        let key = match name.or(self.default_profile.as_deref()) {
            Some(key) => key,
            None => return Err(ConfigError::UnknownProfile("<no default>".to_string())),
        };

        let mut profile = self
            .profiles
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(key.to_string()))?;
        if profile.name.is_empty() {
            profile.name = key.to_string();
        }
        Ok(profile)
    }

    /// Profile names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_extract() {
        let signal = SignalDef::new("speed", 4, 12).scaled(0.5, 0.0);
        // raw 0x123 at bit 4: byte0 = 0x30, byte1 = 0x12
        let payload = [0x30, 0x12];
        let value = signal.extract(&payload).unwrap();
        assert!((value - 0x123 as f64 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_big_endian_extract() {
        // Motorola 16-bit signal, MSB at bit 7 of byte 0
        let signal = SignalDef::new("torque", 7, 16).big_endian();
        let payload = [0x01, 0x02];
        assert_eq!(signal.extract(&payload), Some(258.0));
    }

    #[test]
    fn test_signed_extract() {
        let signal = SignalDef::new("torque", 0, 11).signed().scaled(0.01, 0.0);
        let mut payload = [0u8; 2];
        signal.pack(&mut payload, -2.5);
        let value = signal.extract(&payload).unwrap();
        assert!((value + 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_pack_big_endian_offset() {
        let signal = SignalDef::new("odo", 23, 24).big_endian().scaled(0.1, 0.0);
        let mut payload = [0u8; 5];
        signal.pack(&mut payload, 12345.6);
        let value = signal.extract(&payload).unwrap();
        assert!((value - 12345.6).abs() < 1e-6);
    }

    #[test]
    fn test_extract_short_payload() {
        let signal = SignalDef::new("odo", 8, 24);
        assert_eq!(signal.extract(&[0, 1]), None);
    }

    #[test]
    fn test_out_of_range_width_is_inert() {
        assert_eq!(SignalDef::new("x", 0, 0).signed().extract(&[0xFF]), None);
        assert_eq!(SignalDef::new("x", 0, 70).extract(&[0xFF; 9]), None);

        let mut payload = [0xAAu8; 9];
        SignalDef::new("x", 0, 70).pack(&mut payload, 1.0);
        SignalDef::new("x", 0, 0).pack(&mut payload, 1.0);
        assert_eq!(payload, [0xAA; 9]);
    }

    #[test]
    fn test_layout_validation() {
        assert!(SignalDef::new("ok", 0, 16).validate("M", 2).is_ok());
        assert!(SignalDef::new("wide", 0, 17).validate("M", 2).is_err());
        assert!(SignalDef::new("zero", 0, 0).validate("M", 8).is_err());
        assert!(SignalDef::new("be", 7, 16).big_endian().validate("M", 2).is_ok());
        assert!(SignalDef::new("be", 7, 17).big_endian().validate("M", 2).is_err());
    }

    #[test]
    fn test_profile_json_single_and_list() {
        let json = r#"{
            "dbc_file": "hyundai_kia_generic.dbc",
            "messages": [
                {"name": "CLU11", "address": 1265, "length": 4,
                 "signals": [{"name": "CF_Clu_CruiseSwState", "start_bit": 0, "bit_length": 3}]}
            ],
            "signals": {
                "odometer": {"message": "CLU11", "signal": "CF_Clu_CruiseSwState", "source": 0,
                             "transform": {"scale": 0.1}},
                "cruise_state": [
                    {"message": "CLU11", "signal": "CF_Clu_CruiseSwState"},
                    {"message": "CLU11", "signal": "CF_Clu_CruiseSwState"}
                ]
            }
        }"#;
        let profile = VehicleProfile::from_json(json).unwrap();
        assert_eq!(profile.schema.as_deref(), Some("hyundai_kia_generic.dbc"));

        let odo = profile.signals[ODOMETER].descriptors();
        assert_eq!(odo.len(), 1);
        assert_eq!(odo[0].bus, Some(0));
        assert!((odo[0].transform.scale - 0.1).abs() < 1e-12);
        assert_eq!(odo[0].transform.offset, 0.0);

        assert_eq!(profile.signals[CRUISE_STATE].descriptors().len(), 2);
    }

    #[test]
    fn test_catalog_resolve() {
        let mut catalog = ProfileCatalog::default();
        catalog
            .profiles
            .insert("ev6".to_string(), VehicleProfile::new("", "kia_ev6.dbc"));
        catalog.default_profile = Some("ev6".to_string());

        let profile = catalog.resolve(None).unwrap();
        assert_eq!(profile.name, "ev6");
        assert!(matches!(
            catalog.resolve(Some("ioniq")),
            Err(ConfigError::UnknownProfile(_))
        ));
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["ev6"]);
    }
}
