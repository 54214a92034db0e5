//! Threshold Watch Core Library
//!
//! This library provides the adaptive threshold engine:
//! - Time-evicting metric windows and their summary statistics
//! - Per-metric threshold state: volatility-relative candidate selection,
//!   the hysteresis gate, and the alert-outcome feedback loop
//! - Per-metric ingestion workers with bounded queues and batch assembly
//! - Structured event emission for downstream alerting/storage consumers
//!
//! The binary entry point is in `main.rs`.

pub mod engine;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod threshold;
pub mod window;

pub use engine::{AdaptiveEngine, EngineError, EngineOptions};
pub use events::{EventBus, EventEmitter, JsonlWriter, ThresholdEvent, ThresholdEventKind};
pub use pipeline::BatchSink;
pub use threshold::policy::{CheckEveryBatch, HybridPolicy, UpdatePolicy};
pub use threshold::{ThresholdError, ThresholdState};
pub use window::{MetricWindow, WindowError};
