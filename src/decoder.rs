// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Signal decoding
//!
//! Maps a bus frame's `(bus, address)` identity and payload to named,
//! scaled physical values through a [`VehicleProfile`]. Decoding is a pure
//! function of the profile and the frame.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::error::ConfigError;
use crate::profile::{SignalDef, Transform, VehicleProfile};

/// One decoded semantic value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Key bound to a single descriptor.
    Scalar(f64),
    /// Key bound to several descriptors, in binding order; `None` where the
    /// frame did not carry that descriptor's signal.
    Multi(Vec<Option<f64>>),
}

/// Decoded values of one frame, keyed by semantic name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSignals {
    values: BTreeMap<String, DecodedValue>,
}

impl DecodedSignals {
    /// No values.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &str) -> Option<&DecodedValue> {
        self.values.get(key)
    }

    /// Value of a single-descriptor key.
    pub fn scalar(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            DecodedValue::Scalar(v) => Some(*v),
            DecodedValue::Multi(_) => None,
        }
    }

    /// Value of a key as an integer bitmask, see [`combine_mask`].
    pub fn mask(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(combine_mask)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DecodedValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Combine a decoded value into a bitmask.
///
/// A list sets bit `i` iff element `i` is present and non-zero; an
/// all-absent list yields `None`. A scalar is truncated to an integer.
pub fn combine_mask(value: &DecodedValue) -> Option<i64> {
    match value {
        DecodedValue::Scalar(v) => Some(v.trunc() as i64),
        DecodedValue::Multi(slots) => {
            let mut mask = 0i64;
            let mut any_seen = false;
            for (idx, slot) in slots.iter().enumerate() {
                let Some(v) = slot else { continue };
                any_seen = true;
                if *v != 0.0 && idx < 63 {
                    mask |= 1 << idx;
                }
            }
            any_seen.then_some(mask)
        }
    }
}

/// Result of looking a frame up in the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameDecode {
    /// No binding for this bus and address.
    Unbound,
    /// Known message, but the payload is shorter than its declared length.
    Undersized { expected: usize, actual: usize },
    Decoded(DecodedSignals),
}

impl FrameDecode {
    /// Decoded values, empty for anything but [`FrameDecode::Decoded`].
    pub fn into_signals(self) -> DecodedSignals {
        match self {
            FrameDecode::Decoded(signals) => signals,
            _ => DecodedSignals::empty(),
        }
    }
}

/// A descriptor resolved against the schema.
#[derive(Debug, Clone)]
struct Binding {
    key: String,
    signal: SignalDef,
    transform: Transform,
    /// Position within the key's descriptor list.
    slot: usize,
    /// Length of the key's descriptor list.
    slots: usize,
}

/// Bindings of one message, keyed by `(bus filter, address)`.
#[derive(Debug, Clone)]
struct AddressEntry {
    message_length: usize,
    bindings: Vec<Binding>,
}

/// Profile-driven frame decoder.
#[derive(Debug, Clone, Default)]
pub struct SignalDecoder {
    profile_name: Option<String>,
    by_address: HashMap<(Option<u8>, u32), AddressEntry>,
}

impl SignalDecoder {
    /// Decoder that never yields values.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Resolve every descriptor of `profile` against its schema.
    pub fn configure(profile: &VehicleProfile) -> Result<Self, ConfigError> {
        let schema = match profile.schema.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => {
                return Err(ConfigError::MissingSchema {
                    profile: profile.name.clone(),
                })
            }
        };

        if profile.signals.is_empty() {
            return Err(ConfigError::NoSignals {
                profile: profile.name.clone(),
            });
        }

        let mut by_address: HashMap<(Option<u8>, u32), AddressEntry> = HashMap::new();

        for (key, binding) in &profile.signals {
            let descriptors = binding.descriptors();
            let slots = descriptors.len();

            for (slot, descriptor) in descriptors.iter().enumerate() {
                if descriptor.message.is_empty() || descriptor.signal.is_empty() {
                    return Err(ConfigError::IncompleteDescriptor { key: key.clone() });
                }

                let message = profile.message(&descriptor.message).ok_or_else(|| {
                    ConfigError::UnknownMessage {
                        message: descriptor.message.clone(),
                        schema: schema.to_string(),
                    }
                })?;
                let signal = message.signal(&descriptor.signal).ok_or_else(|| {
                    ConfigError::UnknownSignal {
                        message: message.name.clone(),
                        signal: descriptor.signal.clone(),
                    }
                })?;
                signal.validate(&message.name, message.length)?;

                let entry = by_address
                    .entry((descriptor.bus, message.address))
                    .or_insert_with(|| AddressEntry {
                        message_length: message.length,
                        bindings: Vec::new(),
                    });
                entry.bindings.push(Binding {
                    key: key.clone(),
                    signal: signal.clone(),
                    transform: descriptor.transform,
                    slot,
                    slots,
                });
            }
        }

        Ok(Self {
            profile_name: Some(profile.name.clone()),
            by_address,
        })
    }

    /// Configure from an optional profile, falling back to a disabled
    /// decoder when there is none or it is unusable.
    pub fn configure_or_disabled(profile: Option<&VehicleProfile>) -> Self {
        let Some(profile) = profile else {
            warn!("No vehicle profile; CAN signals will not be decoded");
            return Self::disabled();
        };
        match Self::configure(profile) {
            Ok(decoder) => decoder,
            Err(e) => {
                warn!(
                    "Vehicle profile '{}' unusable, CAN signals will not be decoded: {}",
                    profile.name,
                    e
                );
                Self::disabled()
            }
        }
    }

    /// Whether any binding is configured.
    pub fn is_enabled(&self) -> bool {
        !self.by_address.is_empty()
    }

    /// Name of the configured profile.
    pub fn profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref()
    }

    /// Decode one frame.
    ///
    /// Bus-specific bindings win over bus-agnostic ones for the same
    /// address. Unknown addresses and payloads shorter than the message
    /// yield an empty result.
    pub fn decode(&self, bus: u8, address: u32, payload: &[u8]) -> DecodedSignals {
        self.decode_frame(bus, address, payload).into_signals()
    }

    /// Decode one frame, telling unbound addresses apart from short payloads.
    pub fn decode_frame(&self, bus: u8, address: u32, payload: &[u8]) -> FrameDecode {
        let entry = match self
            .by_address
            .get(&(Some(bus), address))
            .or_else(|| self.by_address.get(&(None, address)))
        {
            Some(entry) => entry,
            None => return FrameDecode::Unbound,
        };

        if payload.len() < entry.message_length {
            return FrameDecode::Undersized {
                expected: entry.message_length,
                actual: payload.len(),
            };
        }

        let mut values: BTreeMap<String, DecodedValue> = BTreeMap::new();
        for binding in &entry.bindings {
            let Some(raw) = binding.signal.extract(payload) else {
                continue;
            };
            let value = binding.transform.apply(raw);

            if binding.slots > 1 {
                let slot = values
                    .entry(binding.key.clone())
                    .or_insert_with(|| DecodedValue::Multi(vec![None; binding.slots]));
                if let DecodedValue::Multi(list) = slot {
                    list[binding.slot] = Some(value);
                }
            } else {
                values.insert(binding.key.clone(), DecodedValue::Scalar(value));
            }
        }

        FrameDecode::Decoded(DecodedSignals { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{
        MessageDef, SignalDescriptor, CRUISE_STATE, ODOMETER, STEERING_DRIVER_TORQUE,
    };

    fn test_profile() -> VehicleProfile {
        VehicleProfile::new("test", "test.dbc")
            .with_message(
                MessageDef::new("ODO", 0x100, 4)
                    .with_signal(SignalDef::new("Odometer", 0, 24).scaled(0.1, 0.0)),
            )
            .with_message(
                MessageDef::new("BUTTONS", 0x200, 2)
                    .with_signal(SignalDef::new("Resume", 0, 1))
                    .with_signal(SignalDef::new("Set", 1, 1))
                    .with_signal(SignalDef::new("Cancel", 2, 1)),
            )
            .with_message(
                MessageDef::new("MDPS", 0x300, 8)
                    .with_signal(SignalDef::new("DriverTorque", 0, 12).signed().scaled(0.01, 0.0)),
            )
            .bind(ODOMETER, SignalDescriptor::new("ODO", "Odometer"))
            .bind_many(
                CRUISE_STATE,
                vec![
                    SignalDescriptor::new("BUTTONS", "Resume"),
                    SignalDescriptor::new("BUTTONS", "Set"),
                    SignalDescriptor::new("BUTTONS", "Cancel"),
                ],
            )
            .bind(
                STEERING_DRIVER_TORQUE,
                SignalDescriptor::new("MDPS", "DriverTorque")
                    .on_bus(0)
                    .with_transform(2.0, 0.0),
            )
    }

    #[test]
    fn test_configure_requires_schema() {
        let mut profile = test_profile();
        profile.schema = None;
        assert!(matches!(
            SignalDecoder::configure(&profile),
            Err(ConfigError::MissingSchema { .. })
        ));
    }

    #[test]
    fn test_configure_requires_signals() {
        let mut profile = test_profile();
        profile.signals.clear();
        assert!(matches!(
            SignalDecoder::configure(&profile),
            Err(ConfigError::NoSignals { .. })
        ));
    }

    #[test]
    fn test_configure_unknown_message() {
        let profile = test_profile().bind("extra", SignalDescriptor::new("NOPE", "X"));
        assert!(matches!(
            SignalDecoder::configure(&profile),
            Err(ConfigError::UnknownMessage { .. })
        ));
    }

    #[test]
    fn test_configure_unknown_signal() {
        let profile = test_profile().bind("extra", SignalDescriptor::new("ODO", "Trip"));
        assert!(matches!(
            SignalDecoder::configure(&profile),
            Err(ConfigError::UnknownSignal { .. })
        ));
    }

    #[test]
    fn test_configure_or_disabled_falls_back() {
        let mut profile = test_profile();
        profile.schema = Some("  ".to_string());
        let decoder = SignalDecoder::configure_or_disabled(Some(&profile));
        assert!(!decoder.is_enabled());
        assert!(decoder.decode(0, 0x100, &[1, 0, 0, 0]).is_empty());
    }

    #[test]
    fn test_decode_scalar() {
        let decoder = SignalDecoder::configure(&test_profile()).unwrap();
        // 1_000_005 * 0.1 = 100000.5 km
        let raw: u32 = 1_000_005;
        let bytes = raw.to_le_bytes();
        let signals = decoder.decode(3, 0x100, &bytes);
        let odo = signals.scalar(ODOMETER).unwrap();
        assert!((odo - 100_000.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_bus_filter() {
        let decoder = SignalDecoder::configure(&test_profile()).unwrap();
        let mut payload = [0u8; 8];
        SignalDef::new("DriverTorque", 0, 12)
            .signed()
            .scaled(0.01, 0.0)
            .pack(&mut payload, -1.25);

        let on_bus = decoder.decode(0, 0x300, &payload);
        let torque = on_bus.scalar(STEERING_DRIVER_TORQUE).unwrap();
        assert!((torque + 2.5).abs() < 1e-9);

        // Bound to bus 0 only
        assert!(decoder.decode(1, 0x300, &payload).is_empty());
    }

    #[test]
    fn test_decode_undersized_payload() {
        let decoder = SignalDecoder::configure(&test_profile()).unwrap();
        assert!(decoder.decode(0, 0x100, &[1, 2]).is_empty());
        assert!(decoder.decode(0, 0x999, &[0; 8]).is_empty());

        assert_eq!(
            decoder.decode_frame(0, 0x100, &[1, 2]),
            FrameDecode::Undersized {
                expected: 4,
                actual: 2
            }
        );
        assert_eq!(decoder.decode_frame(0, 0x999, &[0; 8]), FrameDecode::Unbound);
        assert!(matches!(
            decoder.decode_frame(0, 0x100, &[1, 0, 0, 0]),
            FrameDecode::Decoded(_)
        ));
    }

    #[test]
    fn test_decode_multi_mask() {
        let decoder = SignalDecoder::configure(&test_profile()).unwrap();
        let signals = decoder.decode(0, 0x200, &[0b0000_0101, 0]);
        match signals.get(CRUISE_STATE) {
            Some(DecodedValue::Multi(list)) => {
                assert_eq!(list, &vec![Some(1.0), Some(0.0), Some(1.0)]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(signals.mask(CRUISE_STATE), Some(0b101));

        let idle = decoder.decode(0, 0x200, &[0, 0]);
        assert_eq!(idle.mask(CRUISE_STATE), Some(0));
    }

    #[test]
    fn test_combine_mask_absent_and_scalar() {
        assert_eq!(combine_mask(&DecodedValue::Multi(vec![None, None])), None);
        assert_eq!(
            combine_mask(&DecodedValue::Multi(vec![None, Some(2.0)])),
            Some(0b10)
        );
        assert_eq!(combine_mask(&DecodedValue::Scalar(3.7)), Some(3));
        assert_eq!(combine_mask(&DecodedValue::Scalar(0.4)), Some(0));
    }

    #[test]
    fn test_multi_key_across_messages() {
        let profile = VehicleProfile::new("split", "split.dbc")
            .with_message(MessageDef::new("A", 0x10, 1).with_signal(SignalDef::new("Main", 0, 1)))
            .with_message(MessageDef::new("B", 0x20, 1).with_signal(SignalDef::new("Gap", 0, 1)))
            .bind_many(
                CRUISE_STATE,
                vec![
                    SignalDescriptor::new("A", "Main"),
                    SignalDescriptor::new("B", "Gap"),
                ],
            );
        let decoder = SignalDecoder::configure(&profile).unwrap();

        let signals = decoder.decode(0, 0x20, &[1]);
        assert_eq!(
            signals.get(CRUISE_STATE),
            Some(&DecodedValue::Multi(vec![None, Some(1.0)]))
        );
        assert_eq!(signals.mask(CRUISE_STATE), Some(0b10));
    }
}
