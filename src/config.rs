// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Analytics configuration.

use serde::{Deserialize, Serialize};

use crate::distance::OdometerConfig;
use crate::error::ConfigError;
use crate::event::NANOS_PER_SEC;
use crate::intervention::InterventionConfig;
use crate::speed::{default_buckets, validate_buckets, DriveTimeConfig, SpeedBucket};

/// Master configuration for drive analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    /// Engagement state machine settings.
    pub engagement: EngagementConfig,

    /// Steering intervention comparator.
    pub intervention: InterventionConfig,

    /// Odometer plausibility.
    pub odometer: OdometerConfig,

    /// Moving-time threshold.
    pub drive_time: DriveTimeConfig,

    /// Speed regimes, ascending and contiguous.
    pub speed_buckets: Vec<SpeedBucket>,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            engagement: EngagementConfig::default(),
            intervention: InterventionConfig::default(),
            odometer: OdometerConfig::default(),
            drive_time: DriveTimeConfig::default(),
            speed_buckets: default_buckets(),
        }
    }
}

/// Engagement state machine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Window after a transition during which intervention checks are
    /// suppressed (ns).
    pub stability_buffer_ns: u64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            stability_buffer_ns: 3 * NANOS_PER_SEC,
        }
    }
}

impl GaugeConfig {
    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.intervention.validate()?;
        self.odometer.validate()?;

        let threshold = self.drive_time.moving_threshold_mps;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidSetting {
                field: "drive_time.moving_threshold_mps".to_string(),
                reason: format!("must be a non-negative speed, got {}", threshold),
            });
        }

        validate_buckets(&self.speed_buckets)
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GaugeConfig::default();
        assert_eq!(config.engagement.stability_buffer_ns, 3_000_000_000);
        assert_eq!(config.intervention.high_threshold, 1.5);
        assert_eq!(config.intervention.low_threshold, 0.3);
        assert_eq!(config.intervention.debounce_ns, 10_000_000_000);
        assert_eq!(config.intervention.filter_window, 10);
        assert_eq!(config.odometer.max_delta_km, 1.0);
        assert_eq!(config.drive_time.moving_threshold_mps, 1.0);
        assert_eq!(config.speed_buckets.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = GaugeConfig::from_json(r#"{"intervention": {"high_threshold": 2.0}}"#).unwrap();
        assert_eq!(config.intervention.high_threshold, 2.0);
        assert_eq!(config.intervention.low_threshold, 0.3);
        assert_eq!(config.speed_buckets, default_buckets());
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = GaugeConfig::from_json(r#"{"intervention": {"high_threshold": 0.1}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThresholds { .. }));

        let err = GaugeConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_json_roundtrip_preserves_buckets() {
        let config = GaugeConfig::default();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"highway\""));
        assert_eq!(GaugeConfig::from_json(&json).unwrap(), config);
    }
}
