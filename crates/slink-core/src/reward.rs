//! Sign-replacing reward accumulator.
//!
//! Rewards of the same sign pile up within a tick; a reward of the opposite
//! sign discards the running total and replaces it. The accumulated value
//! decays geometrically between deliveries and snaps to zero once it falls
//! below a threshold, so a quiet agent reads exactly 0.0 rather than an
//! ever-shrinking residue.

use serde::{Deserialize, Serialize};

/// Running reward signal for a single agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardAccumulator {
    value: f32,
}

impl RewardAccumulator {
    /// Fold one reward event into the accumulator.
    ///
    /// Zero deltas are ignored. A delta whose sign matches the current value
    /// (or arrives while the value is zero) is added; an opposing sign
    /// replaces the value outright.
    pub fn apply(&mut self, delta: f32) {
        if delta == 0.0 {
            return;
        }
        if self.value == 0.0 || (self.value > 0.0) == (delta > 0.0) {
            self.value += delta;
        } else {
            self.value = delta;
        }
    }

    /// Apply one tick of geometric decay, snapping small magnitudes to zero.
    pub fn decay(&mut self, rate: f32, snap_threshold: f32) {
        self.value *= rate;
        if self.value.abs() < snap_threshold {
            self.value = 0.0;
        }
    }

    /// Current accumulated reward.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }
}
