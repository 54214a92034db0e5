//! Threshold event emission.
//!
//! Committed thresholds, feedback adjustments, and anomaly flags are
//! dispatched through an in-process event bus that supports multiple
//! subscribers and JSONL formatting, so alerting and storage layers can
//! consume engine decisions without touching worker state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{mpsc, Mutex};

/// What kind of engine decision an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdEventKind {
    /// A recomputed threshold passed the gate and was committed.
    ThresholdCommitted,
    /// Alert-outcome feedback adjusted the committed threshold.
    FeedbackAdjusted,
    /// A folded point exceeded the committed threshold.
    AnomalyDetected,
}

/// Structured event for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdEvent {
    pub event: ThresholdEventKind,
    pub timestamp: DateTime<Utc>,
    pub metric: String,
    /// Committed threshold after the event, where applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Threshold before the event (committed events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_threshold: Option<f64>,
    /// Offending value (anomaly events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Consumed-batch false-positive rate (feedback events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub false_positive_rate: Option<f64>,
}

impl ThresholdEvent {
    fn new(event: ThresholdEventKind, metric: impl Into<String>) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            metric: metric.into(),
            threshold: None,
            previous_threshold: None,
            value: None,
            false_positive_rate: None,
        }
    }

    pub fn committed(metric: impl Into<String>, previous: f64, threshold: f64) -> Self {
        let mut event = Self::new(ThresholdEventKind::ThresholdCommitted, metric);
        event.previous_threshold = Some(previous);
        event.threshold = Some(threshold);
        event
    }

    pub fn feedback(metric: impl Into<String>, false_positive_rate: f64, threshold: f64) -> Self {
        let mut event = Self::new(ThresholdEventKind::FeedbackAdjusted, metric);
        event.false_positive_rate = Some(false_positive_rate);
        event.threshold = Some(threshold);
        event
    }

    pub fn anomaly(metric: impl Into<String>, value: f64, threshold: f64) -> Self {
        let mut event = Self::new(ThresholdEventKind::AnomalyDetected, metric);
        event.value = Some(value);
        event.threshold = Some(threshold);
        event
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","metric":"{}"}}"#,
                self.metric
            )
        })
    }
}

/// Trait for emitting threshold events.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: ThresholdEvent);
}

/// Broadcast event bus supporting multiple subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    senders: Mutex<Vec<mpsc::Sender<ThresholdEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to receive threshold events.
    pub fn subscribe(&self) -> mpsc::Receiver<ThresholdEvent> {
        let (tx, rx) = mpsc::channel();
        let mut senders = self.senders.lock().unwrap();
        senders.push(tx);
        rx
    }

    /// Emit an event to all subscribers, dropping disconnected ones.
    pub fn emit(&self, event: ThresholdEvent) {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: ThresholdEvent) {
        self.emit(event);
    }
}

/// JSONL writer for threshold events (CLI-friendly).
pub struct JsonlWriter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> EventEmitter for JsonlWriter<W> {
    fn emit(&self, event: ThresholdEvent) {
        let line = event.to_jsonl();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }
}

/// Fan-out emitter that forwards events to multiple emitters.
pub struct FanoutEmitter {
    emitters: Vec<std::sync::Arc<dyn EventEmitter>>,
}

impl FanoutEmitter {
    pub fn new(emitters: Vec<std::sync::Arc<dyn EventEmitter>>) -> Self {
        Self { emitters }
    }
}

impl EventEmitter for FanoutEmitter {
    fn emit(&self, event: ThresholdEvent) {
        for emitter in &self.emitters {
            emitter.emit(event.clone());
        }
    }
}
