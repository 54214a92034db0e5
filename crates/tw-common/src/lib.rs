//! Threshold Watch shared types, events, and errors.
//!
//! This crate holds the small set of types shared between the engine core,
//! the configuration layer, and CLI consumers:
//! - Metric points and adjustment events (the engine's audit trail)
//! - Read-only per-metric snapshots for cross-metric consumers
//! - A unified error type with stable codes and recoverability hints

pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use types::{AdjustmentEvent, AdjustmentKind, MetricPoint, MetricSnapshot};
