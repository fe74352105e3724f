use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{CrmError, CrmResult};
use crate::types::InteractionType;

/// Root engine configuration. Loaded from an optional TOML file, then
/// environment variables with the prefix `CRM_ENGINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engagement: EngagementSettings,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Raw engagement scoring settings. Validated into an engagement config by
/// the scorer crate before use.
#[derive(Debug, Clone, Deserialize)]
pub struct EngagementSettings {
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    #[serde(default)]
    pub lookback_days: Option<u32>,
    #[serde(default = "default_velocity_window_days")]
    pub velocity_window_days: u32,
    #[serde(default = "default_trend_tolerance")]
    pub trend_tolerance: f64,
    #[serde(default = "default_top_types")]
    pub top_types: usize,
    #[serde(default = "default_weights")]
    pub weights: HashMap<InteractionType, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default functions
fn default_half_life_days() -> f64 {
    30.0
}
fn default_velocity_window_days() -> u32 {
    45
}
fn default_trend_tolerance() -> f64 {
    10.0
}
fn default_top_types() -> usize {
    3
}
fn default_weights() -> HashMap<InteractionType, f64> {
    InteractionType::ALL
        .into_iter()
        .map(|t| (t, t.default_weight()))
        .collect()
}
fn default_max_depth() -> usize {
    32
}
fn default_max_conflict_retries() -> u32 {
    3
}
fn default_log_format() -> LogFormat {
    LogFormat::Json
}
fn default_log_filter() -> String {
    "crm_engine=info".to_string()
}

impl Default for EngagementSettings {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            lookback_days: None,
            velocity_window_days: default_velocity_window_days(),
            trend_tolerance: default_trend_tolerance(),
            top_types: default_top_types(),
            weights: default_weights(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            filter: default_log_filter(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engagement: EngagementSettings::default(),
            segmentation: SegmentationConfig::default(),
            lifecycle: LifecycleConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file overlaid with environment variables.
    pub fn load(path: Option<&Path>) -> CrmResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("CRM_ENGINE")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| CrmError::Config(e.to_string()))
    }
}
