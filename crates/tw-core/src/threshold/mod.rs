//! Adaptive threshold state and update rules.
//!
//! Each metric owns one [`ThresholdState`]: a short (recent-behavior) and a
//! long (historical-baseline) window, the last committed threshold, an
//! append-only adjustment history, and the feedback loop state. Candidate
//! thresholds are chosen by comparing recent to historical volatility
//! (coefficient of variation): turbulent recent behavior selects the wide
//! `long.p99` ceiling, calm behavior selects `long.p95` plus a margin
//! proportional to the current short-term spread. A 10% relative-change
//! hysteresis gate prevents threshold flapping on every recompute cycle.
//!
//! Alert-outcome feedback corrects the committed value directly, bypassing
//! the gate: it is ground truth about a specific recent decision, not a
//! noisy statistical estimate.

pub mod policy;

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

use tw_common::types::{AdjustmentEvent, AdjustmentKind};
use tw_config::{EngineConfig, FeedbackConfig, GateConfig};
use tw_math::coefficient_of_variation;

use crate::window::MetricWindow;

/// Errors raised during candidate threshold computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThresholdError {
    /// One or both windows were empty. Recoverable: the cycle is skipped
    /// and the previous threshold stands.
    #[error("insufficient data for metric {metric}: {which} window is empty")]
    InsufficientData { metric: String, which: &'static str },
}

/// Result of a feedback-driven threshold adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackAdjustment {
    /// Fraction of the consumed batch marked "not useful".
    pub false_positive_rate: f64,
    /// Factor applied to the committed threshold (and the multiplier).
    pub factor: f64,
    /// Threshold value after the adjustment.
    pub new_threshold: f64,
}

/// Per-metric adaptive threshold state. Owned exclusively by the metric's
/// ingestion worker; all mutation is serialized through that worker.
#[derive(Debug, Clone)]
pub struct ThresholdState {
    metric: String,
    short_window: MetricWindow,
    long_window: MetricWindow,
    /// Last committed threshold; `0.0` means unset (first commit is
    /// unconditional).
    current_threshold: f64,
    /// Feedback-driven scaling applied to every candidate before the gate.
    sensitivity_multiplier: f64,
    adjustment_history: Vec<AdjustmentEvent>,
    /// Unconsumed feedback entries; drained whenever a full batch accrues.
    feedback_log: VecDeque<bool>,
    points_seen: u64,
    last_point_at: Option<DateTime<Utc>>,
}

impl ThresholdState {
    pub fn new(metric: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            metric: metric.into(),
            short_window: MetricWindow::new(Duration::seconds(config.windows.short_secs as i64)),
            long_window: MetricWindow::new(Duration::seconds(config.windows.long_secs as i64)),
            current_threshold: 0.0,
            sensitivity_multiplier: 1.0,
            adjustment_history: Vec::new(),
            feedback_log: VecDeque::new(),
            points_seen: 0,
            last_point_at: None,
        }
    }

    /// Route a point into both windows. Side effect only.
    pub fn add_metric(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.short_window.add_point(value, timestamp);
        self.long_window.add_point(value, timestamp);
        self.points_seen += 1;
        self.last_point_at = Some(timestamp);
    }

    /// Compute a candidate threshold from current window statistics.
    ///
    /// Volatility is the coefficient of variation (std/mean). An undefined
    /// recent volatility (zero mean) escalates to the conservative branch —
    /// it is never treated as "low". A zero historical mean yields zero
    /// historical volatility, which forces the conservative branch whenever
    /// recent volatility is nonzero.
    pub fn calculate_adaptive_threshold(&self, gate: &GateConfig) -> Result<f64, ThresholdError> {
        let short = self
            .short_window
            .statistics()
            .map_err(|_| ThresholdError::InsufficientData {
                metric: self.metric.clone(),
                which: "short",
            })?;
        let long = self
            .long_window
            .statistics()
            .map_err(|_| ThresholdError::InsufficientData {
                metric: self.metric.clone(),
                which: "long",
            })?;

        let recent_volatility = coefficient_of_variation(short.std, short.mean);
        let historical_volatility =
            coefficient_of_variation(long.std, long.mean).unwrap_or(0.0);

        let conservative = match recent_volatility {
            None => true,
            Some(recent) => recent > historical_volatility * gate.volatility_multiplier,
        };

        let candidate = if conservative {
            // Turbulent recent behavior: widen to the historical ceiling.
            long.p99
        } else {
            // Normal regime: baseline ceiling plus current short-term spread.
            long.p95 + 2.0 * short.std
        };

        Ok(candidate * self.sensitivity_multiplier)
    }

    /// Hysteresis gate: commit unconditionally while the threshold is unset
    /// (bootstrap), afterwards only on a >10% relative change.
    pub fn should_commit(&self, candidate: f64, gate: &GateConfig) -> bool {
        if self.current_threshold == 0.0 {
            return true;
        }
        let relative_change = (candidate - self.current_threshold).abs() / self.current_threshold;
        relative_change > gate.min_relative_change
    }

    /// Recompute, gate, and commit. Returns the new threshold when
    /// committed, `None` when the gate holds the previous value.
    pub fn update_threshold(
        &mut self,
        now: DateTime<Utc>,
        gate: &GateConfig,
    ) -> Result<Option<f64>, ThresholdError> {
        let candidate = self.calculate_adaptive_threshold(gate)?;
        if !self.should_commit(candidate, gate) {
            return Ok(None);
        }

        let reason = format!(
            "updated from {:.2} to {:.2}",
            self.current_threshold, candidate
        );
        debug!(metric = %self.metric, threshold = candidate, "threshold committed");
        self.current_threshold = candidate;
        self.adjustment_history.push(AdjustmentEvent {
            at: now,
            threshold: candidate,
            kind: AdjustmentKind::Recompute,
            reason,
        });
        Ok(Some(candidate))
    }

    /// Record one alert-outcome feedback entry. Once a full batch of
    /// unconsumed entries accrues, the batch is drained (the log is a
    /// consumed queue, never unbounded) and the false-positive rate decides
    /// the correction:
    /// - too many false positives → desensitize (threshold × 1.1)
    /// - almost none → sensitize (threshold × 0.9)
    ///
    /// The same factor is folded into the sensitivity multiplier so future
    /// candidates inherit the correction. Returns `Some` only when the
    /// threshold actually changed.
    pub fn record_feedback(
        &mut self,
        was_useful: bool,
        now: DateTime<Utc>,
        config: &FeedbackConfig,
    ) -> Option<FeedbackAdjustment> {
        self.feedback_log.push_back(was_useful);
        if self.feedback_log.len() < config.batch_size {
            return None;
        }

        let batch: Vec<bool> = self.feedback_log.drain(..config.batch_size).collect();
        let useful = batch.iter().filter(|b| **b).count() as f64;
        let false_positive_rate = 1.0 - useful / batch.len() as f64;

        let factor = if false_positive_rate > config.high_false_positive_rate {
            config.desensitize_factor
        } else if false_positive_rate < config.low_false_positive_rate {
            config.sensitize_factor
        } else {
            debug!(
                metric = %self.metric,
                false_positive_rate,
                "feedback batch consumed, rate within tolerance"
            );
            return None;
        };

        self.current_threshold *= factor;
        self.sensitivity_multiplier *= factor;
        debug!(
            metric = %self.metric,
            false_positive_rate,
            factor,
            threshold = self.current_threshold,
            "feedback-driven threshold adjustment"
        );
        self.adjustment_history.push(AdjustmentEvent {
            at: now,
            threshold: self.current_threshold,
            kind: AdjustmentKind::Feedback,
            reason: "feedback-driven sensitivity change".to_string(),
        });
        Some(FeedbackAdjustment {
            false_positive_rate,
            factor,
            new_threshold: self.current_threshold,
        })
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn current_threshold(&self) -> f64 {
        self.current_threshold
    }

    pub fn sensitivity_multiplier(&self) -> f64 {
        self.sensitivity_multiplier
    }

    pub fn adjustment_history(&self) -> &[AdjustmentEvent] {
        &self.adjustment_history
    }

    pub fn points_seen(&self) -> u64 {
        self.points_seen
    }

    pub fn last_point_at(&self) -> Option<DateTime<Utc>> {
        self.last_point_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    /// Fill the long window with `old` values older than the short span,
    /// then the short window (and the tail of the long window) with
    /// `recent` values.
    fn fill(state: &mut ThresholdState, old: &[f64], recent: &[f64]) {
        for (i, v) in old.iter().enumerate() {
            state.add_metric(*v, ts(i as i64));
        }
        // Recent block well past the 30-minute short span.
        let base = 10_000;
        for (i, v) in recent.iter().enumerate() {
            state.add_metric(*v, ts(base + i as i64));
        }
    }

    #[test]
    fn test_insufficient_data_on_empty_windows() {
        let cfg = config();
        let state = ThresholdState::new("api-latency", &cfg);
        let err = state.calculate_adaptive_threshold(&cfg.gate).unwrap_err();
        assert!(matches!(err, ThresholdError::InsufficientData { .. }));
    }

    #[test]
    fn test_bootstrap_always_commits() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        fill(&mut state, &[100.0; 20], &[100.0, 101.0, 99.0, 100.0]);

        assert_eq!(state.current_threshold(), 0.0);
        let committed = state.update_threshold(ts(20_000), &cfg.gate).unwrap();
        assert!(committed.is_some());
        assert_eq!(state.adjustment_history().len(), 1);
        assert_eq!(
            state.adjustment_history()[0].kind,
            AdjustmentKind::Recompute
        );
    }

    #[test]
    fn test_hysteresis_idempotence() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        fill(&mut state, &[100.0; 50], &[100.0, 102.0, 98.0, 100.0]);

        let first = state.update_threshold(ts(20_000), &cfg.gate).unwrap();
        assert!(first.is_some());

        // Stable stream: recomputing yields the same candidate; the gate
        // must hold and the history must not grow.
        for i in 0..5 {
            let again = state.update_threshold(ts(20_001 + i), &cfg.gate).unwrap();
            assert_eq!(again, None);
        }
        assert_eq!(state.adjustment_history().len(), 1);
    }

    #[test]
    fn test_gate_requires_ten_percent_change() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        fill(&mut state, &[100.0; 50], &[100.0; 10]);
        state.update_threshold(ts(20_000), &cfg.gate).unwrap();
        let committed = state.current_threshold();

        // Candidates within ±10% are rejected, beyond are accepted.
        assert!(!state.should_commit(committed * 1.05, &cfg.gate));
        assert!(!state.should_commit(committed * 0.95, &cfg.gate));
        assert!(state.should_commit(committed * 1.11, &cfg.gate));
        assert!(state.should_commit(committed * 0.89, &cfg.gate));
    }

    #[test]
    fn test_conservative_branch_on_doubled_volatility() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);

        // Long window: 45 x 90 + 45 x 110 (+ recent block) — the old block
        // alone has mean 100, std 10. Recent short block: 5 x 80 + 5 x 120,
        // mean 100, std 20 → recent volatility 0.2 = 2 x historical-ish.
        let mut old = vec![90.0; 45];
        old.extend(vec![110.0; 45]);
        let mut recent = vec![80.0; 5];
        recent.extend(vec![120.0; 5]);
        fill(&mut state, &old, &recent);

        let long_stats = state.long_window.statistics().unwrap();
        let short_stats = state.short_window.statistics().unwrap();
        let recent_vol = short_stats.std / short_stats.mean;
        let historical_vol = long_stats.std / long_stats.mean;
        assert!(recent_vol > historical_vol * cfg.gate.volatility_multiplier);

        let candidate = state.calculate_adaptive_threshold(&cfg.gate).unwrap();
        assert_eq!(candidate, long_stats.p99);
    }

    #[test]
    fn test_normal_branch_formula() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);

        // Calm recent behavior: short volatility well below historical.
        let mut old = vec![80.0; 45];
        old.extend(vec![120.0; 45]);
        let recent = vec![99.0, 101.0, 99.0, 101.0, 99.0, 101.0];
        fill(&mut state, &old, &recent);

        let long_stats = state.long_window.statistics().unwrap();
        let short_stats = state.short_window.statistics().unwrap();
        assert!(
            short_stats.std / short_stats.mean
                <= (long_stats.std / long_stats.mean) * cfg.gate.volatility_multiplier
        );

        let candidate = state.calculate_adaptive_threshold(&cfg.gate).unwrap();
        let expected = long_stats.p95 + 2.0 * short_stats.std;
        assert!((candidate - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_mean_guard_selects_conservative_branch() {
        let cfg = config();
        let mut state = ThresholdState::new("error-rate", &cfg);

        // All-zero recent block: short mean 0 → volatility undefined →
        // conservative branch, deterministically, with no division error.
        let old = vec![0.5, 1.5, 0.5, 1.5, 0.5, 1.5];
        let recent = vec![0.0; 6];
        fill(&mut state, &old, &recent);

        let candidate = state.calculate_adaptive_threshold(&cfg.gate).unwrap();
        let long_stats = state.long_window.statistics().unwrap();
        assert_eq!(candidate, long_stats.p99);
    }

    #[test]
    fn test_zero_historical_mean_forces_conservative() {
        let cfg = config();
        let mut state = ThresholdState::new("error-rate", &cfg);

        // Long window mean exactly 0 (the old block offsets the recent
        // block): historical volatility is treated as 0, so any nonzero
        // recent volatility escalates to the conservative branch.
        let old = vec![-2.0; 4];
        let recent = vec![1.0, 3.0, 1.0, 3.0];
        fill(&mut state, &old, &recent);

        let long_stats = state.long_window.statistics().unwrap();
        assert_eq!(long_stats.mean, 0.0);
        let candidate = state.calculate_adaptive_threshold(&cfg.gate).unwrap();
        // Short window: mean 2, std 1 → volatility 0.5 > 0 → conservative.
        assert_eq!(candidate, long_stats.p99);
    }

    #[test]
    fn test_sensitivity_multiplier_scales_candidate() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        fill(&mut state, &[100.0; 20], &[100.0; 10]);

        let base = state.calculate_adaptive_threshold(&cfg.gate).unwrap();
        state.sensitivity_multiplier = 1.5;
        let scaled = state.calculate_adaptive_threshold(&cfg.gate).unwrap();
        assert!((scaled - base * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_feedback_desensitizes_on_high_false_positive_rate() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        state.current_threshold = 200.0;

        // 1 useful out of 10 → false-positive rate 0.9 > 0.20 → × 1.1.
        let mut adjustment = None;
        for i in 0..10 {
            adjustment = state.record_feedback(i == 0, ts(i), &cfg.feedback);
        }
        let adjustment = adjustment.expect("tenth entry triggers adjustment");
        assert!((adjustment.false_positive_rate - 0.9).abs() < 1e-12);
        assert!((state.current_threshold() - 220.0).abs() < 1e-9);
        assert!((state.sensitivity_multiplier() - 1.1).abs() < 1e-12);

        let last = state.adjustment_history().last().unwrap();
        assert_eq!(last.kind, AdjustmentKind::Feedback);
        assert_eq!(last.reason, "feedback-driven sensitivity change");
    }

    #[test]
    fn test_feedback_sensitizes_on_all_useful() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        state.current_threshold = 200.0;

        // All useful → false-positive rate 0 < 0.05 → × 0.9.
        let mut adjustment = None;
        for i in 0..10 {
            adjustment = state.record_feedback(true, ts(i), &cfg.feedback);
        }
        let adjustment = adjustment.expect("tenth entry triggers adjustment");
        assert!((adjustment.false_positive_rate).abs() < 1e-12);
        assert!((state.current_threshold() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_feedback_dead_zone_leaves_threshold_alone() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        state.current_threshold = 200.0;

        // 9 useful / 1 not → rate 0.1: between 0.05 and 0.20 → no change,
        // but the batch is still consumed.
        for i in 0..10 {
            let adjustment = state.record_feedback(i != 0, ts(i), &cfg.feedback);
            assert_eq!(adjustment, None);
        }
        assert_eq!(state.current_threshold(), 200.0);
        assert!(state.feedback_log.is_empty());
        assert!(state.adjustment_history().is_empty());
    }

    #[test]
    fn test_feedback_log_stays_bounded() {
        let cfg = config();
        let mut state = ThresholdState::new("api-latency", &cfg);
        for i in 0..95 {
            state.record_feedback(i % 2 == 0, ts(i), &cfg.feedback);
        }
        // Nine batches consumed; only the remainder is retained.
        assert_eq!(state.feedback_log.len(), 5);
    }

    #[test]
    fn test_end_to_end_checkout_latency_scenario() {
        let cfg = config();
        let mut state = ThresholdState::new("checkout-latency", &cfg);

        // Short window: 5 x 195 + 5 x 225 → mean 210, population std 15.
        let mut recent = vec![195.0; 5];
        recent.extend(vec![225.0; 5]);

        // Older block: 90 values a ± d chosen so the full 100 points have
        // mean 200 and population std 20.
        let recent_sum: f64 = recent.iter().sum();
        let recent_sq: f64 = recent.iter().map(|v| v * v).sum();
        let m = (100.0 * 200.0 - recent_sum) / 90.0;
        let total_sq = 100.0 * (20.0 * 20.0 + 200.0 * 200.0);
        let d = ((total_sq - recent_sq) / 90.0 - m * m).sqrt();
        let mut old = vec![m - d; 45];
        old.extend(vec![m + d; 45]);

        fill(&mut state, &old, &recent);
        assert_eq!(state.long_window.len(), 100);
        assert_eq!(state.short_window.len(), 10);

        let long_stats = state.long_window.statistics().unwrap();
        let short_stats = state.short_window.statistics().unwrap();
        assert!((long_stats.mean - 200.0).abs() < 1e-9);
        assert!((long_stats.std - 20.0).abs() < 1e-9);
        assert!((short_stats.mean - 210.0).abs() < 1e-9);
        assert!((short_stats.std - 15.0).abs() < 1e-9);

        // recent_volatility ≈ 0.071 < 0.15 = 1.5 x historical_volatility →
        // normal branch: candidate = long.p95 + 2 x 15.
        let committed = state
            .update_threshold(ts(20_000), &cfg.gate)
            .unwrap()
            .expect("bootstrap commits unconditionally");
        let expected = long_stats.p95 + 30.0;
        assert_eq!(committed, expected);
        assert_eq!(state.current_threshold(), expected);

        let history = state.adjustment_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].threshold, expected);
        assert_eq!(
            history[0].reason,
            format!("updated from 0.00 to {:.2}", expected)
        );
    }
}
