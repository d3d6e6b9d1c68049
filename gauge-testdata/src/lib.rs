// Gauge Testdata - Synthetic drive generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Gauge Testdata
//!
//! Synthetic segmented drives for exercising the engagement gauge.
//!
//! A [`DriveScenario`] describes speed, engagement windows, steering
//! overrides and unreadable segments in drive-relative seconds.
//! [`generate_drive`] turns it into decodable telemetry together with the
//! counters an analysis must report.
//!
//! ## Quick Start
//!
//! ```rust
//! use engagement_gauge::{DriveAnalyzer, GaugeConfig, SignalDecoder};
//! use gauge_testdata::{generate_drive, DriveScenario};
//!
//! let generated = generate_drive(&DriveScenario::commute());
//! let decoder = SignalDecoder::configure(&generated.profile).unwrap();
//! let analyzer = DriveAnalyzer::new(GaugeConfig::default(), decoder).unwrap();
//!
//! let stats = analyzer.analyze(&generated.drive, &generated.source, None);
//! assert_eq!(stats.total_state_changes, generated.expected.state_changes);
//! ```
//!
//! ## On disk
//!
//! [`write_json_lines`] lays segments out as `<drive>--<n>/events.jsonl`,
//! the layout `JsonLinesSource` discovers.

pub mod generator;
pub mod scenario;
pub mod writer;

// Re-exports for convenience
pub use generator::{
    generate_drive, reference_profile, segment_ref, ExpectedCounters, GeneratedDrive,
};
pub use scenario::{DriveScenario, EngagementWindow, SpeedProfile};
pub use writer::{write_json_lines, write_manifest, DriveManifest, WriteError};
