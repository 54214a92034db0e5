//! Time-evicting metric windows.
//!
//! A [`MetricWindow`] retains `(timestamp, value)` pairs over a fixed span.
//! Eviction is lazy: each insert pops from the oldest end while the span
//! invariant is violated, so every point is evicted at most once and
//! insertion is amortized O(1). Callers must supply non-decreasing
//! timestamps per window; the ingestion pipeline sorts each batch before
//! folding to guarantee this under racing producers.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use thiserror::Error;
use tw_math::Summary;

/// Errors raised by window statistics.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    /// Statistics requested on a window with zero points. An empty window
    /// is an error rather than a zero summary: zeros would silently produce
    /// a valid-looking but meaningless threshold.
    #[error("window is empty: no statistics available")]
    EmptyWindow,
}

/// Fixed-duration sliding window over one metric's readings.
#[derive(Debug, Clone)]
pub struct MetricWindow {
    capacity: Duration,
    points: VecDeque<(DateTime<Utc>, f64)>,
}

impl MetricWindow {
    pub fn new(capacity: Duration) -> Self {
        Self {
            capacity,
            points: VecDeque::new(),
        }
    }

    /// Append a point, then evict from the front while the oldest point is
    /// older than `capacity` relative to the newly appended timestamp.
    /// Never fails.
    pub fn add_point(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.points.push_back((timestamp, value));
        while let Some((oldest, _)) = self.points.front() {
            if timestamp - *oldest > self.capacity {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    /// Summary statistics over all currently retained points.
    pub fn statistics(&self) -> Result<Summary, WindowError> {
        let values: Vec<f64> = self.points.iter().map(|(_, v)| *v).collect();
        tw_math::summarize(&values).ok_or(WindowError::EmptyWindow)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> Duration {
        self.capacity
    }

    /// Timestamp of the newest retained point.
    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.back().map(|(ts, _)| *ts)
    }

    /// Timestamp of the oldest retained point.
    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.front().map(|(ts, _)| *ts)
    }
}
