//! Per-metric ingestion workers.
//!
//! Each metric gets one worker thread that exclusively owns its
//! [`ThresholdState`]. Producers push into a bounded channel; the worker
//! assembles batches (size- or timeout-bounded, measured from the first
//! point of the batch), sorts each batch by timestamp — arrival order is
//! not generation order under racing producers — and folds it into the
//! windows. Feedback arrives on the same channel, so both mutation paths
//! of the committed threshold are serialized through one consumer.
//!
//! Disconnection is the shutdown signal: when every sender is gone the
//! worker flushes its partially assembled batch, republishes its snapshot,
//! and exits. Nothing in flight is dropped.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use tw_common::types::{MetricPoint, MetricSnapshot};
use tw_config::EngineConfig;

use crate::events::{EventEmitter, ThresholdEvent};
use crate::threshold::policy::UpdatePolicy;
use crate::threshold::ThresholdState;

/// Message delivered to a metric's owning worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMsg {
    /// A raw metric reading.
    Point {
        value: f64,
        timestamp: DateTime<Utc>,
    },
    /// Alert-outcome feedback for this metric.
    Feedback { was_useful: bool },
}

/// Downstream consumer of assembled batches (storage, trend analysis).
/// Called on the worker thread after each batch is folded; implementations
/// should hand off quickly or accept that they backpressure the metric.
pub trait BatchSink: Send + Sync {
    fn on_batch(&self, metric: &str, batch: &[MetricPoint]);
}

/// Shared map of read-only snapshots, republished by each worker.
pub(crate) type SnapshotMap = Arc<RwLock<HashMap<String, MetricSnapshot>>>;

/// Everything a worker needs to run, moved onto its thread.
pub(crate) struct WorkerContext {
    pub metric: String,
    pub config: EngineConfig,
    pub snapshots: SnapshotMap,
    pub emitter: Option<Arc<dyn EventEmitter>>,
    pub batch_sink: Option<Arc<dyn BatchSink>>,
}

/// Handle to a running metric worker, owned by the engine registry.
pub(crate) struct WorkerHandle {
    tx: SyncSender<WorkerMsg>,
    join: thread::JoinHandle<()>,
    capacity: usize,
}

impl WorkerHandle {
    pub(crate) fn sender(&self) -> SyncSender<WorkerMsg> {
        self.tx.clone()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Disconnect the queue and wait for the worker to drain and exit.
    pub(crate) fn stop(self) {
        drop(self.tx);
        let _ = self.join.join();
    }
}

/// Spawn the worker thread for one metric.
pub(crate) fn spawn_worker(ctx: WorkerContext, policy: Box<dyn UpdatePolicy>) -> WorkerHandle {
    let capacity = ctx.config.ingest.queue_capacity;
    let (tx, rx) = mpsc::sync_channel(capacity);
    let join = thread::spawn(move || worker_loop(rx, ctx, policy));
    WorkerHandle { tx, join, capacity }
}

fn worker_loop(rx: Receiver<WorkerMsg>, ctx: WorkerContext, mut policy: Box<dyn UpdatePolicy>) {
    let mut state = ThresholdState::new(&ctx.metric, &ctx.config);
    let batch_size = ctx.config.ingest.batch_size;
    let batch_timeout = Duration::from_millis(ctx.config.ingest.batch_timeout_ms);

    let mut points_since_check: u64 = 0;
    let mut last_check = Instant::now();
    let mut published_history = 0usize;

    publish_snapshot(&ctx, &state, &mut published_history);
    debug!(metric = %ctx.metric, "metric worker started");

    let mut disconnected = false;
    while !disconnected {
        // Block for the first message of the next batch.
        let first = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => break,
        };

        let mut batch: Vec<(DateTime<Utc>, f64)> = Vec::with_capacity(batch_size);
        let deadline = Instant::now() + batch_timeout;
        handle_message(first, &mut batch, &mut state, &ctx, &mut published_history);

        while batch.len() < batch_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(msg) => {
                    handle_message(msg, &mut batch, &mut state, &ctx, &mut published_history)
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if !batch.is_empty() {
            process_batch(&mut batch, &mut state, &ctx, &mut points_since_check);
        }

        if points_since_check > 0 && policy.should_check(points_since_check, last_check.elapsed())
        {
            run_threshold_check(&mut state, &ctx);
            points_since_check = 0;
            last_check = Instant::now();
        }

        publish_snapshot(&ctx, &state, &mut published_history);
    }

    publish_snapshot(&ctx, &state, &mut published_history);
    debug!(metric = %ctx.metric, points = state.points_seen(), "metric worker stopped");
}

fn handle_message(
    msg: WorkerMsg,
    batch: &mut Vec<(DateTime<Utc>, f64)>,
    state: &mut ThresholdState,
    ctx: &WorkerContext,
    published_history: &mut usize,
) {
    match msg {
        WorkerMsg::Point { value, timestamp } => batch.push((timestamp, value)),
        WorkerMsg::Feedback { was_useful } => {
            // Applied immediately: feedback is serialized through this
            // worker and does not wait for batch assembly.
            if let Some(adjustment) =
                state.record_feedback(was_useful, Utc::now(), &ctx.config.feedback)
            {
                if let Some(emitter) = &ctx.emitter {
                    emitter.emit(ThresholdEvent::feedback(
                        &ctx.metric,
                        adjustment.false_positive_rate,
                        adjustment.new_threshold,
                    ));
                }
                publish_snapshot(ctx, state, published_history);
            }
        }
    }
}

fn process_batch(
    batch: &mut Vec<(DateTime<Utc>, f64)>,
    state: &mut ThresholdState,
    ctx: &WorkerContext,
    points_since_check: &mut u64,
) {
    // Window invariants require non-decreasing timestamps.
    batch.sort_by(|a, b| a.0.cmp(&b.0));

    let threshold = state.current_threshold();
    for (timestamp, value) in batch.iter() {
        if threshold > 0.0 && *value > threshold {
            if let Some(emitter) = &ctx.emitter {
                emitter.emit(ThresholdEvent::anomaly(&ctx.metric, *value, threshold));
            }
        }
        state.add_metric(*value, *timestamp);
    }
    *points_since_check += batch.len() as u64;

    if let Some(sink) = &ctx.batch_sink {
        let points: Vec<MetricPoint> = batch
            .iter()
            .map(|(ts, v)| MetricPoint::new(&ctx.metric, *v, *ts))
            .collect();
        sink.on_batch(&ctx.metric, &points);
    }
    batch.clear();
}

fn run_threshold_check(state: &mut ThresholdState, ctx: &WorkerContext) {
    let previous = state.current_threshold();
    match state.update_threshold(Utc::now(), &ctx.config.gate) {
        Ok(Some(new_threshold)) => {
            if let Some(emitter) = &ctx.emitter {
                emitter.emit(ThresholdEvent::committed(
                    &ctx.metric,
                    previous,
                    new_threshold,
                ));
            }
        }
        Ok(None) => {}
        Err(err) => {
            // Recoverable: the previous threshold stands for this cycle.
            debug!(metric = %ctx.metric, %err, "threshold check skipped");
        }
    }
}

fn publish_snapshot(ctx: &WorkerContext, state: &ThresholdState, published_history: &mut usize) {
    let mut map = ctx.snapshots.write().unwrap();
    let entry = map
        .entry(ctx.metric.clone())
        .or_insert_with(|| MetricSnapshot::new(&ctx.metric));
    entry.current_threshold = state.current_threshold();
    entry.sensitivity_multiplier = state.sensitivity_multiplier();
    entry.points_seen = state.points_seen();
    entry.last_point_at = state.last_point_at();

    let history = state.adjustment_history();
    if *published_history < history.len() {
        entry
            .adjustment_history
            .extend_from_slice(&history[*published_history..]);
        *published_history = history.len();
    }
}
