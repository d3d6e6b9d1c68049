// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Engagement Gauge - Drive engagement analytics
//!
//! Computes engagement and safety statistics from segmented vehicle
//! telemetry: how much of a drive the automated driving system was active,
//! how often it was disengaged and re-engaged, how often the driver
//! overrode its steering, how far it drove, and how time and distance split
//! across speed regimes.
//!
//! ## Key Features
//!
//! - **Profile-driven decoding**: CAN frames are decoded through a
//!   per-vehicle signal profile (DBC-style bit layouts, scale and offset)
//! - **Hysteresis and debounce**: steering overrides are detected on
//!   filtered torque divergence, gated by engagement stability
//! - **Robust to bad segments**: unreadable or truncated segments are
//!   skipped without leaving partial state behind
//! - **Deterministic**: all timing comes from event timestamps
//!
//! ## Quick Start
//!
//! ```rust
//! use engagement_gauge::{
//!     Drive, DriveAnalyzer, DriveId, Event, MemorySource, SegmentRef, SignalDecoder,
//! };
//!
//! let segment = SegmentRef::new("2025-03-14--08-30-00--0/rlog");
//! let drive = Drive::new(DriveId::new("2025-03-14--08-30-00"), vec![segment.clone()]);
//!
//! let source = MemorySource::new().with_segment(
//!     segment,
//!     vec![
//!         Event::controls_state(0, true),
//!         Event::controls_state(1_000_000_000, true),
//!         Event::controls_state(2_000_000_000, false),
//!     ],
//! );
//!
//! let analyzer = DriveAnalyzer::with_decoder(SignalDecoder::disabled());
//! let stats = analyzer.analyze(&drive, &source, None);
//!
//! assert_eq!(stats.total_state_changes, 1);
//! assert!((stats.engagement_pct - 50.0).abs() < 1e-9);
//! ```
//!
//! ## Modules
//!
//! - [`event`]: Decoded telemetry events
//! - [`profile`]: Vehicle profiles and message schemas
//! - [`decoder`]: Profile-driven CAN signal decoding
//! - [`engagement`], [`intervention`], [`distance`], [`cruise`], [`speed`]:
//!   Trackers
//! - [`segment`]: Per-segment processing and drive-scoped state
//! - [`stats`]: Drive statistics and fleet summary
//! - [`engine`]: Drive analyzer

// Modules
pub mod config;
pub mod cruise;
pub mod decoder;
pub mod distance;
pub mod drive;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod event;
pub mod filter;
pub mod intervention;
pub mod profile;
pub mod segment;
pub mod source;
pub mod speed;
pub mod stats;

// Re-exports for convenient access
pub use config::{EngagementConfig, GaugeConfig};
pub use cruise::CruiseHoldTracker;
pub use decoder::{combine_mask, DecodedSignals, DecodedValue, FrameDecode, SignalDecoder};
pub use distance::{DistanceTracker, OdometerConfig, OdometerReading};
pub use drive::{
    group_into_drives, segment_index_of, Capabilities, Drive, DriveId, DriveMetadata, SegmentRef,
};
pub use engagement::{ActiveTimeClock, EngagementState, EngagementStateMachine, Transition};
pub use engine::DriveAnalyzer;
pub use error::{ConfigError, GaugeError, Result, SegmentReadError};
pub use event::{CanFrame, Event, EventKind, MonoTime, NANOS_PER_SEC};
pub use filter::MovingAverageFilter;
pub use intervention::{
    DebugSink, InterventionConfig, InterventionDetector, InterventionEdge, InterventionRecord,
    InterventionState,
};
pub use profile::{
    ByteOrder, MessageDef, ProfileCatalog, SignalBinding, SignalDef, SignalDescriptor, Transform,
    VehicleProfile,
};
pub use segment::{DriveState, SegmentProcessor, SegmentState, SegmentSummary};
pub use source::{EventSource, EventStream, JsonLinesSource, MemorySource};
pub use speed::{
    default_buckets, BucketTotals, DriveTimeConfig, DriveTimeTracker, SpeedBucket,
    SpeedBucketAggregator,
};
pub use stats::{BucketSummary, DriveStatistics, DriveStatsAggregator, FleetSummary, SkippedSegment};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
