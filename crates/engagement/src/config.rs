//! Validated engagement scoring configuration.

use crm_core::config::EngagementSettings;
use crm_core::{InteractionType, ValidationError};
use serde::Serialize;
use std::collections::HashMap;

/// Decay and weighting parameters for the scorer.
///
/// Can only be obtained through [`EngagementConfig::new`], [`EngagementConfig::from_settings`]
/// or `Default`, so every instance the scorer sees is valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementConfig {
    weights: [f64; InteractionType::COUNT],
    half_life_days: f64,
    lookback_days: Option<u32>,
    velocity_window_days: u32,
    trend_tolerance: f64,
}

impl EngagementConfig {
    /// Types missing from `weights` score zero.
    pub fn new(
        weights: &HashMap<InteractionType, f64>,
        half_life_days: f64,
        lookback_days: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let mut table = [0.0; InteractionType::COUNT];
        for (interaction_type, &value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidWeight {
                    interaction_type: interaction_type.to_string(),
                    value,
                });
            }
            table[interaction_type.ordinal()] = value;
        }

        if !half_life_days.is_finite() || half_life_days <= 0.0 {
            return Err(ValidationError::InvalidHalfLife(half_life_days));
        }
        if lookback_days == Some(0) {
            return Err(ValidationError::InvalidLookback);
        }

        Ok(Self {
            weights: table,
            half_life_days,
            lookback_days,
            velocity_window_days: DEFAULT_VELOCITY_WINDOW_DAYS,
            trend_tolerance: DEFAULT_TREND_TOLERANCE,
        })
    }

    pub fn from_settings(settings: &EngagementSettings) -> Result<Self, ValidationError> {
        Self::new(
            &settings.weights,
            settings.half_life_days,
            settings.lookback_days,
        )?
        .with_velocity_window(settings.velocity_window_days)?
        .with_trend_tolerance(settings.trend_tolerance)
    }

    /// Window used for velocity when no lookback is set.
    pub fn with_velocity_window(mut self, days: u32) -> Result<Self, ValidationError> {
        if days == 0 {
            return Err(ValidationError::InvalidVelocityWindow);
        }
        self.velocity_window_days = days;
        Ok(self)
    }

    pub fn with_trend_tolerance(mut self, tolerance: f64) -> Result<Self, ValidationError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ValidationError::InvalidTrendTolerance(tolerance));
        }
        self.trend_tolerance = tolerance;
        Ok(self)
    }

    pub fn weight(&self, interaction_type: InteractionType) -> f64 {
        self.weights[interaction_type.ordinal()]
    }

    pub fn half_life_days(&self) -> f64 {
        self.half_life_days
    }

    pub fn lookback_days(&self) -> Option<u32> {
        self.lookback_days
    }

    /// Length of the window split into three periods for velocity.
    pub fn velocity_window_days(&self) -> u32 {
        self.lookback_days.unwrap_or(self.velocity_window_days)
    }

    pub fn trend_tolerance(&self) -> f64 {
        self.trend_tolerance
    }
}

const DEFAULT_HALF_LIFE_DAYS: f64 = 30.0;
const DEFAULT_VELOCITY_WINDOW_DAYS: u32 = 45;
const DEFAULT_TREND_TOLERANCE: f64 = 10.0;

impl Default for EngagementConfig {
    fn default() -> Self {
        let mut weights = [0.0; InteractionType::COUNT];
        for t in InteractionType::ALL {
            weights[t.ordinal()] = t.default_weight();
        }
        Self {
            weights,
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
            lookback_days: None,
            velocity_window_days: DEFAULT_VELOCITY_WINDOW_DAYS,
            trend_tolerance: DEFAULT_TREND_TOLERANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(InteractionType, f64)]) -> HashMap<InteractionType, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_rejects_bad_weights() {
        for bad in [f64::NAN, -1.0, f64::INFINITY] {
            let err = EngagementConfig::new(&weights(&[(InteractionType::Call, bad)]), 15.0, None)
                .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidWeight { .. }));
        }
    }

    #[test]
    fn test_rejects_non_positive_half_life() {
        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                EngagementConfig::new(&HashMap::new(), bad, None),
                Err(ValidationError::InvalidHalfLife(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_windows() {
        assert_eq!(
            EngagementConfig::new(&HashMap::new(), 10.0, Some(0)),
            Err(ValidationError::InvalidLookback)
        );
        assert_eq!(
            EngagementConfig::default().with_velocity_window(0),
            Err(ValidationError::InvalidVelocityWindow)
        );
        assert!(EngagementConfig::default().with_trend_tolerance(-1.0).is_err());
    }

    #[test]
    fn test_missing_weight_is_zero() {
        let config =
            EngagementConfig::new(&weights(&[(InteractionType::EmailOpen, 3.0)]), 15.0, None)
                .unwrap();
        assert_eq!(config.weight(InteractionType::EmailOpen), 3.0);
        assert_eq!(config.weight(InteractionType::Call), 0.0);
    }

    #[test]
    fn test_velocity_window_prefers_lookback() {
        let config = EngagementConfig::new(&HashMap::new(), 10.0, Some(90)).unwrap();
        assert_eq!(config.velocity_window_days(), 90);
        assert_eq!(EngagementConfig::default().velocity_window_days(), 45);
    }

    #[test]
    fn test_from_default_settings_matches_default() {
        let config = EngagementConfig::from_settings(&EngagementSettings::default()).unwrap();
        assert_eq!(config, EngagementConfig::default());
    }
}
