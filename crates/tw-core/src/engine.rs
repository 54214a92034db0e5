//! The supervising engine: per-metric worker registry and read paths.
//!
//! [`AdaptiveEngine`] is the only process-wide state. It creates a worker
//! per metric name on first use (metrics are implicitly declared), routes
//! points and feedback to the owning worker, serves cross-metric reads from
//! the snapshot map, and owns the ordered shutdown sequence: stop accepting
//! first, then disconnect every queue and join the workers while they drain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::info;

use tw_common::types::{AdjustmentEvent, MetricPoint, MetricSnapshot};
use tw_config::EngineConfig;

use crate::events::EventEmitter;
use crate::pipeline::{spawn_worker, BatchSink, SnapshotMap, WorkerContext, WorkerHandle, WorkerMsg};
use crate::threshold::policy::{HybridPolicy, UpdatePolicy};

/// Builds a fresh policy instance for each new metric worker.
pub type PolicyFactory = Arc<dyn Fn() -> Box<dyn UpdatePolicy> + Send + Sync>;

/// Errors surfaced to engine callers. Everything else is absorbed inside
/// the engine (the last good threshold stands).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Ingestion backpressure: the metric's queue is at capacity. The
    /// caller decides whether to drop, retry, or block.
    #[error("ingest queue full for metric {metric} (capacity {capacity})")]
    QueueFull { metric: String, capacity: usize },

    /// The engine has been shut down and no longer accepts input.
    #[error("engine is closed: no longer accepting submissions")]
    Closed,
}

impl From<EngineError> for tw_common::Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::QueueFull { metric, capacity } => {
                tw_common::Error::QueueFull { metric, capacity }
            }
            EngineError::Closed => tw_common::Error::EngineClosed,
        }
    }
}

/// Optional wiring for an engine: event emitter, downstream batch sink,
/// and a custom check policy.
#[derive(Default, Clone)]
pub struct EngineOptions {
    pub emitter: Option<Arc<dyn EventEmitter>>,
    pub batch_sink: Option<Arc<dyn BatchSink>>,
    pub policy: Option<PolicyFactory>,
}

/// The adaptive threshold engine.
pub struct AdaptiveEngine {
    config: EngineConfig,
    options: EngineOptions,
    workers: Mutex<HashMap<String, WorkerHandle>>,
    snapshots: SnapshotMap,
    accepting: AtomicBool,
}

impl AdaptiveEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_options(config, EngineOptions::default())
    }

    pub fn with_options(config: EngineConfig, options: EngineOptions) -> Self {
        Self {
            config,
            options,
            workers: Mutex::new(HashMap::new()),
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit a raw metric point. Fails fast with [`EngineError::QueueFull`]
    /// when the metric's bounded queue is at capacity.
    pub fn submit(&self, point: MetricPoint) -> Result<(), EngineError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        let (tx, capacity) = self.worker_sender(&point.metric);
        match tx.try_send(WorkerMsg::Point {
            value: point.value,
            timestamp: point.timestamp,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EngineError::QueueFull {
                metric: point.metric,
                capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(EngineError::Closed),
        }
    }

    /// Record alert-outcome feedback for a metric. Creates the metric's
    /// worker if this is the first time the name is seen. Blocks briefly
    /// if the metric's queue is momentarily full — feedback is ground
    /// truth and is not dropped under backpressure.
    pub fn record_feedback(&self, metric: &str, was_useful: bool) -> Result<(), EngineError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        let (tx, _) = self.worker_sender(metric);
        tx.send(WorkerMsg::Feedback { was_useful })
            .map_err(|_| EngineError::Closed)
    }

    /// Current committed threshold for a metric. `Some(0.0)` means the
    /// metric exists but has no committed threshold yet; `None` means the
    /// metric has never been seen.
    pub fn get_threshold(&self, metric: &str) -> Option<f64> {
        self.snapshots
            .read()
            .unwrap()
            .get(metric)
            .map(|snap| snap.current_threshold)
    }

    /// The alerting hook: `value > current_threshold`. Returns `false`
    /// while no threshold has been committed — with nothing learned yet
    /// there is nothing to exceed.
    pub fn is_anomalous(&self, metric: &str, value: f64) -> bool {
        match self.snapshots.read().unwrap().get(metric) {
            Some(snap) if snap.has_threshold() => value > snap.current_threshold,
            _ => false,
        }
    }

    /// Ordered adjustment history for a metric (empty if never seen).
    pub fn get_adjustment_history(&self, metric: &str) -> Vec<AdjustmentEvent> {
        self.snapshots
            .read()
            .unwrap()
            .get(metric)
            .map(|snap| snap.adjustment_history.clone())
            .unwrap_or_default()
    }

    /// Full read-only snapshot for one metric.
    pub fn snapshot(&self, metric: &str) -> Option<MetricSnapshot> {
        self.snapshots.read().unwrap().get(metric).cloned()
    }

    /// All known metric names, sorted.
    pub fn metrics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshots.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Retire a metric: drain its queue, stop its worker, and drop its
    /// state and snapshot. Returns `false` if the metric was never seen.
    pub fn retire(&self, metric: &str) -> bool {
        let handle = self.workers.lock().unwrap().remove(metric);
        match handle {
            Some(handle) => {
                handle.stop();
                self.snapshots.write().unwrap().remove(metric);
                info!(metric, "metric retired");
                true
            }
            None => false,
        }
    }

    /// Shut the engine down: refuse new submissions, then disconnect every
    /// queue and join the workers while they drain in-flight batches.
    /// Snapshots remain readable afterwards. Idempotent.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let drained: Vec<(String, WorkerHandle)> = {
            let mut workers = self.workers.lock().unwrap();
            workers.drain().collect()
        };
        for (metric, handle) in drained {
            handle.stop();
            info!(metric = %metric, "metric worker drained");
        }
    }

    /// Get (or create) the worker for a metric and clone out its sender,
    /// so the registry lock is never held across a channel operation.
    fn worker_sender(&self, metric: &str) -> (SyncSender<WorkerMsg>, usize) {
        let mut workers = self.workers.lock().unwrap();
        let handle = workers.entry(metric.to_string()).or_insert_with(|| {
            let policy: Box<dyn UpdatePolicy> = match &self.options.policy {
                Some(factory) => factory(),
                None => Box::new(HybridPolicy::from_config(&self.config.update_policy)),
            };
            let ctx = WorkerContext {
                metric: metric.to_string(),
                config: self.config.clone(),
                snapshots: Arc::clone(&self.snapshots),
                emitter: self.options.emitter.clone(),
                batch_sink: self.options.batch_sink.clone(),
            };
            info!(metric, "metric worker created");
            spawn_worker(ctx, policy)
        });
        (handle.sender(), handle.capacity())
    }
}

impl Drop for AdaptiveEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
