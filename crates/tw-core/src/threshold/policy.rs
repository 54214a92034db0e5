//! Pluggable "should we check the threshold now" policies.
//!
//! The worker consults its policy after folding each batch; the policy
//! decides whether this cycle recomputes the threshold. Policies see how
//! many points and how much wall-clock time have passed since the last
//! check — the worker resets both counters whenever a check fires.

use std::time::Duration;

use tw_config::UpdatePolicyConfig;

/// Decides when the threshold should be recomputed.
pub trait UpdatePolicy: Send {
    /// Called after each folded batch with the points and wall-clock time
    /// accumulated since the last check.
    fn should_check(&mut self, points_since_check: u64, elapsed_since_check: Duration) -> bool;
}

/// Default policy: check once either bound is reached — every N points or
/// every T seconds, whichever comes first.
#[derive(Debug, Clone)]
pub struct HybridPolicy {
    every_points: u64,
    every_interval: Duration,
}

impl HybridPolicy {
    pub fn new(every_points: u64, every_interval: Duration) -> Self {
        Self {
            every_points,
            every_interval,
        }
    }

    pub fn from_config(config: &UpdatePolicyConfig) -> Self {
        Self::new(
            config.check_every_points,
            Duration::from_secs(config.check_every_secs),
        )
    }
}

impl UpdatePolicy for HybridPolicy {
    fn should_check(&mut self, points_since_check: u64, elapsed_since_check: Duration) -> bool {
        points_since_check >= self.every_points || elapsed_since_check >= self.every_interval
    }
}

/// Check after every batch. Used in tests and low-volume deployments.
#[derive(Debug, Clone, Default)]
pub struct CheckEveryBatch;

impl UpdatePolicy for CheckEveryBatch {
    fn should_check(&mut self, _points_since_check: u64, _elapsed_since_check: Duration) -> bool {
        true
    }
}
