//! Core data types shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single raw metric reading as submitted by ingress collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Metric name, e.g. `"checkout-latency"`.
    pub metric: String,
    /// Observed value (latency in ms, error rate, request count, ...).
    pub value: f64,
    /// When the reading was taken (producer clock).
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    pub fn new(metric: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            value,
            timestamp,
        }
    }
}

/// What caused a threshold adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Periodic recomputation from window statistics.
    Recompute,
    /// Correction driven by alert-outcome feedback.
    Feedback,
}

/// One entry in a metric's append-only adjustment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEvent {
    /// When the adjustment was committed.
    pub at: DateTime<Utc>,
    /// The threshold value after the adjustment.
    pub threshold: f64,
    /// What caused the adjustment.
    pub kind: AdjustmentKind,
    /// Human-readable audit text, e.g. `"updated from 120.00 to 250.00"`.
    pub reason: String,
}

/// Read-only view of a metric's threshold state, republished by the owning
/// worker after each processed batch. This is the cross-metric read path:
/// status endpoints and alerting layers read snapshots and never touch the
/// worker-owned state directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub metric: String,
    /// Last committed threshold; `0.0` means no threshold yet.
    pub current_threshold: f64,
    /// Feedback-driven scaling applied to future candidates.
    pub sensitivity_multiplier: f64,
    /// Total points folded into the windows so far.
    pub points_seen: u64,
    /// Timestamp of the most recent point folded, if any.
    pub last_point_at: Option<DateTime<Utc>>,
    /// Append-only adjustment audit trail.
    pub adjustment_history: Vec<AdjustmentEvent>,
}

impl MetricSnapshot {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            current_threshold: 0.0,
            sensitivity_multiplier: 1.0,
            points_seen: 0,
            last_point_at: None,
            adjustment_history: Vec::new(),
        }
    }

    /// Whether a threshold has been committed yet for this metric.
    pub fn has_threshold(&self) -> bool {
        self.current_threshold > 0.0
    }
}
