//! Threshold Watch configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the engine configuration file (engine.json)
//! - Config resolution (explicit path → env → XDG → system → defaults)
//! - Semantic validation (positive durations, ordered rates, sane factors)
//!
//! Configuration is deployment-wide, not per metric: every metric worker
//! shares the same window durations, gate, feedback, and ingest settings.

pub mod engine;
pub mod resolve;
pub mod validate;

pub use engine::{
    load_config, ConfigError, EngineConfig, FeedbackConfig, GateConfig, IngestConfig,
    UpdatePolicyConfig, WindowsConfig,
};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use validate::{validate, ValidationError};
