//! Typed engine configuration with builtin defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validate::{validate, ValidationError};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid JSON in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("semantic validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Window durations for the dual-window statistical model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsConfig {
    /// Short (recent-behavior) window span in seconds.
    pub short_secs: u64,
    /// Long (historical-baseline) window span in seconds.
    pub long_secs: u64,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            short_secs: 30 * 60,
            long_secs: 24 * 60 * 60,
        }
    }
}

/// Hysteresis gate and volatility-regime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum relative change before a recomputed threshold is committed.
    pub min_relative_change: f64,
    /// Recent volatility must exceed historical volatility by this factor
    /// to select the conservative (p99) branch.
    pub volatility_multiplier: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_relative_change: 0.10,
            volatility_multiplier: 1.5,
        }
    }
}

/// Alert-outcome feedback loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Number of unconsumed feedback entries that triggers an adjustment.
    pub batch_size: usize,
    /// Threshold multiplier when the false-positive rate is too high.
    pub desensitize_factor: f64,
    /// Threshold multiplier when the false-positive rate is very low.
    pub sensitize_factor: f64,
    /// False-positive rate above which the engine desensitizes.
    pub high_false_positive_rate: f64,
    /// False-positive rate below which the engine sensitizes.
    pub low_false_positive_rate: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            desensitize_factor: 1.1,
            sensitize_factor: 0.9,
            high_false_positive_rate: 0.20,
            low_false_positive_rate: 0.05,
        }
    }
}

/// Per-metric ingestion queue and batch assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Bounded queue capacity per metric; `submit` fails with backpressure
    /// at capacity.
    pub queue_capacity: usize,
    /// Maximum points per assembled batch.
    pub batch_size: usize,
    /// Maximum time to hold a partial batch, measured from its first point.
    pub batch_timeout_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            batch_size: 32,
            batch_timeout_ms: 250,
        }
    }
}

/// When the worker should check for a threshold update.
///
/// The check fires after a batch once either bound is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePolicyConfig {
    /// Check after at least this many points since the last check.
    pub check_every_points: u64,
    /// Check after at least this many seconds since the last check.
    pub check_every_secs: u64,
}

impl Default for UpdatePolicyConfig {
    fn default() -> Self {
        Self {
            check_every_points: 10,
            check_every_secs: 30,
        }
    }
}

/// Complete engine configuration. Every section has builtin defaults, so a
/// partial config file overrides only what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub windows: WindowsConfig,
    pub gate: GateConfig,
    pub feedback: FeedbackConfig,
    pub ingest: IngestConfig,
    pub update_policy: UpdatePolicyConfig,
}

/// Load and validate a config file from an explicit path.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    validate(&config)?;
    Ok(config)
}
