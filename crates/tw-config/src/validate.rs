//! Semantic validation for engine configuration.
//!
//! Shape and type checking happens in serde; this module checks the
//! relationships serde cannot express: window ordering, rate ordering,
//! factor direction.

use thiserror::Error;

use crate::engine::EngineConfig;

/// A semantic configuration error.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("short window ({short_secs}s) must be shorter than long window ({long_secs}s)")]
    WindowOrder { short_secs: u64, long_secs: u64 },

    #[error("gate.min_relative_change must be in (0, 1) (got {value})")]
    GateRange { value: f64 },

    #[error(
        "feedback.low_false_positive_rate ({low}) must be below high_false_positive_rate ({high})"
    )]
    RateOrder { low: f64, high: f64 },

    #[error("feedback.desensitize_factor must be > 1.0 (got {value})")]
    DesensitizeDirection { value: f64 },

    #[error("feedback.sensitize_factor must be in (0, 1) (got {value})")]
    SensitizeDirection { value: f64 },
}

/// Validate an engine configuration, returning the first violation found.
pub fn validate(config: &EngineConfig) -> Result<(), ValidationError> {
    let w = &config.windows;
    if w.short_secs == 0 {
        return Err(ValidationError::NonPositive {
            field: "windows.short_secs",
            value: 0.0,
        });
    }
    if w.short_secs >= w.long_secs {
        return Err(ValidationError::WindowOrder {
            short_secs: w.short_secs,
            long_secs: w.long_secs,
        });
    }

    let g = &config.gate;
    if !(g.min_relative_change > 0.0 && g.min_relative_change < 1.0) {
        return Err(ValidationError::GateRange {
            value: g.min_relative_change,
        });
    }
    if g.volatility_multiplier <= 0.0 {
        return Err(ValidationError::NonPositive {
            field: "gate.volatility_multiplier",
            value: g.volatility_multiplier,
        });
    }

    let f = &config.feedback;
    if f.batch_size == 0 {
        return Err(ValidationError::NonPositive {
            field: "feedback.batch_size",
            value: 0.0,
        });
    }
    if f.desensitize_factor <= 1.0 {
        return Err(ValidationError::DesensitizeDirection {
            value: f.desensitize_factor,
        });
    }
    if !(f.sensitize_factor > 0.0 && f.sensitize_factor < 1.0) {
        return Err(ValidationError::SensitizeDirection {
            value: f.sensitize_factor,
        });
    }
    if f.low_false_positive_rate >= f.high_false_positive_rate {
        return Err(ValidationError::RateOrder {
            low: f.low_false_positive_rate,
            high: f.high_false_positive_rate,
        });
    }

    let i = &config.ingest;
    if i.queue_capacity == 0 {
        return Err(ValidationError::NonPositive {
            field: "ingest.queue_capacity",
            value: 0.0,
        });
    }
    if i.batch_size == 0 {
        return Err(ValidationError::NonPositive {
            field: "ingest.batch_size",
            value: 0.0,
        });
    }

    if config.update_policy.check_every_points == 0 {
        return Err(ValidationError::NonPositive {
            field: "update_policy.check_every_points",
            value: 0.0,
        });
    }

    Ok(())
}
