// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Engagement Gauge
//!
//! Only two kinds of failure ever leave the core: a vehicle profile or
//! configuration that cannot be used, and a segment whose event stream
//! cannot be read. Implausible samples (odometer glitches, short CAN
//! payloads) are not errors; they are dropped where they are observed.

use thiserror::Error;

/// Result type alias for Engagement Gauge operations
pub type Result<T> = std::result::Result<T, GaugeError>;

/// Main error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GaugeError {
    /// Configuration or vehicle profile error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Segment could not be read
    #[error("Segment read error: {0}")]
    SegmentRead(#[from] SegmentReadError),
}

/// Errors in a vehicle profile or analytics configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Profile does not reference a message schema
    #[error("Vehicle profile '{profile}' has no schema reference")]
    MissingSchema { profile: String },

    /// Profile defines no signal bindings
    #[error("Vehicle profile '{profile}' contains no signal definitions")]
    NoSignals { profile: String },

    /// A descriptor lacks its message or signal name
    #[error("Signal '{key}' entry is missing a message or signal name")]
    IncompleteDescriptor { key: String },

    /// Descriptor names a message the schema does not define
    #[error("Message '{message}' not found in schema {schema}")]
    UnknownMessage { message: String, schema: String },

    /// Descriptor names a signal its message does not carry
    #[error("Signal '{signal}' not found in message '{message}'")]
    UnknownSignal { message: String, signal: String },

    /// Signal bit layout does not fit its message
    #[error("Signal '{signal}' in message '{message}' has an invalid layout: {reason}")]
    InvalidSignalLayout {
        message: String,
        signal: String,
        reason: String,
    },

    /// Hysteresis thresholds would oscillate
    #[error("Intervention high threshold {high} must exceed low threshold {low}")]
    InvalidThresholds { high: f64, low: f64 },

    /// Speed buckets are not contiguous ranges
    #[error("Invalid speed buckets: {0}")]
    InvalidSpeedBuckets(String),

    /// Any other out-of-range setting
    #[error("Invalid setting '{field}': {reason}")]
    InvalidSetting { field: String, reason: String },

    /// Requested profile is not in the catalog
    #[error("Unknown vehicle profile: {0}")]
    UnknownProfile(String),

    /// Document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors while obtaining a segment's event stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentReadError {
    /// Segment reference does not resolve to anything
    #[error("Segment not found: {segment}")]
    NotFound { segment: String },

    /// I/O failure while reading
    #[error("Could not read {segment}: {reason}")]
    Io { segment: String, reason: String },

    /// Stream is corrupt at the given record
    #[error("Corrupt segment {segment} at record {line}: {reason}")]
    Corrupt {
        segment: String,
        line: usize,
        reason: String,
    },

    /// Stream is too small to hold any events
    #[error("Segment {segment} too small: {size} bytes")]
    TooSmall { segment: String, size: u64 },
}

impl SegmentReadError {
    /// Reference of the segment that failed
    pub fn segment(&self) -> &str {
        match self {
            Self::NotFound { segment }
            | Self::Io { segment, .. }
            | Self::Corrupt { segment, .. }
            | Self::TooSmall { segment, .. } => segment,
        }
    }
}
