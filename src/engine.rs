// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! DriveAnalyzer - runs a drive's segments through the trackers.

use log::{info, warn};

use crate::config::GaugeConfig;
use crate::decoder::SignalDecoder;
use crate::drive::Drive;
use crate::error::Result;
use crate::intervention::DebugSink;
use crate::segment::{DriveState, SegmentProcessor};
use crate::source::EventSource;
use crate::stats::{DriveStatistics, DriveStatsAggregator};

/// Main analyzer: one validated configuration, one decoder.
///
/// Holds no per-drive state, so one analyzer can serve any number of
/// drives, sequentially or from several threads.
#[derive(Debug, Clone)]
pub struct DriveAnalyzer {
    config: GaugeConfig,
    decoder: SignalDecoder,
}

impl DriveAnalyzer {
    /// Create an analyzer. Fails if the configuration does not validate.
    pub fn new(config: GaugeConfig, decoder: SignalDecoder) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, decoder })
    }

    /// Analyzer with default configuration.
    pub fn with_decoder(decoder: SignalDecoder) -> Self {
        Self {
            config: GaugeConfig::default(),
            decoder,
        }
    }

    pub fn config(&self) -> &GaugeConfig {
        &self.config
    }

    pub fn decoder(&self) -> &SignalDecoder {
        &self.decoder
    }

    /// Analyze one drive.
    ///
    /// Segments are read in ascending index order. Unreadable segments are
    /// logged and skipped. A drive without segments yields empty statistics.
    pub fn analyze(
        &self,
        drive: &Drive,
        source: &dyn EventSource,
        mut sink: Option<&mut dyn DebugSink>,
    ) -> DriveStatistics {
        let processor = SegmentProcessor::new(&self.config, &self.decoder);
        let mut state = DriveState::new(&self.config);
        let mut aggregator = DriveStatsAggregator::new(drive, &self.config.speed_buckets);

        for segment in drive.segments() {
            let result = source.open(segment).and_then(|events| {
                let sink = sink.as_mut().map(|s| &mut **s as &mut dyn DebugSink);
                processor.process(drive, segment, &mut state, events, sink)
            });
            match result {
                Ok(summary) => aggregator.fold(&summary),
                Err(e) => {
                    warn!("[{}] skipping segment {}: {}", drive.id, segment, e);
                    aggregator.skip(segment, &e);
                }
            }
        }

        let stats = aggregator.finalize(&state);
        info!(
            "[{}] {}/{} segments, engagement {:.1}%, {} disengagements, {} steering interventions",
            stats.drive_id,
            stats.processed_segments,
            stats.segment_count,
            stats.engagement_pct,
            stats.intervention_count,
            stats.steer_intervention_count
        );
        stats
    }

    /// Analyze several drives independently.
    pub fn analyze_all(&self, drives: &[Drive], source: &dyn EventSource) -> Vec<DriveStatistics> {
        drives
            .iter()
            .map(|drive| self.analyze(drive, source, None))
            .collect()
    }
}
