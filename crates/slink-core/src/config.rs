//! Static configuration for a slink world.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frequency ratio of one equal-tempered semitone.
pub const SEMITONE_RATIO: f32 = 1.059_463_1;

/// Errors raised while validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Tunable parameters for the simulation.
///
/// Reward magnitudes and the accumulator decay are deliberately knobs rather
/// than constants; the defaults reproduce the reference behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlinkConfig {
    /// Segments appended to a freshly spawned agent beyond its head.
    pub initial_length: u32,
    /// Radius of the head segment in world units.
    pub head_width: f32,
    /// Radius the taper converges toward at the tail.
    pub tail_width: f32,
    /// Local anchor offset of the pin/spring pair linking segments.
    pub link_offset: f32,
    /// Stiffness applied to both chain constraints.
    pub link_stiffness: f32,
    /// Sensor wedge reach assigned to new agents.
    pub vision_depth: f32,
    /// Energy a fresh agent starts with.
    pub initial_energy: f32,
    /// Passive energy regeneration applied at the end of every tick.
    pub energy_regen: f32,
    /// Thrust magnitude for move actions.
    pub forward_force: f32,
    /// Torque magnitude for turn actions.
    pub turn_torque: f32,
    /// Per-action increment for tongue angle/extension.
    pub tongue_delta: f32,
    /// Energy debited by a move action.
    pub move_cost: f32,
    /// Energy debited by appending one segment.
    pub growth_cost: f32,
    /// Energy debited by releasing a pheromone mark.
    pub mark_cost: f32,
    /// Energy debited by a mating attempt.
    pub mate_cost: f32,
    /// Self-reward for a failed costed action (reference -100).
    pub failure_reward: f32,
    /// Self-reward for a successful eat/grow (reference +100).
    pub success_reward: f32,
    /// Geometric decay applied to the reward accumulator each tick.
    pub reward_decay: f32,
    /// Accumulator magnitudes below this snap to exactly zero.
    pub reward_snap_threshold: f32,
    /// Geometric decay applied to chirp volume each tick.
    pub sound_volume_decay: f32,
    /// Volume set by the chirp action.
    pub chirp_volume: f32,
    /// Lower bound of the audible frequency range, Hz.
    pub sound_freq_min: f32,
    /// Upper bound of the audible frequency range, Hz.
    pub sound_freq_max: f32,
    /// Starting vocalization frequency, Hz.
    pub initial_sound_freq: f32,
    /// Distance beyond which an emitter is inaudible.
    pub hearing_range: f32,
    /// Starting head hue (0..1 color wheel).
    pub initial_head_hue: f32,
    /// Starting tail hue (0..1 color wheel).
    pub initial_tail_hue: f32,
    /// Cyclic step for hue-shift actions (one degree of the wheel).
    pub hue_step: f32,
    /// Radius scale factor applied to every mark each tick.
    pub pheromone_decay: f32,
    /// Marks smaller than this radius expire.
    pub pheromone_min_size: f32,
    /// Radius of a freshly released mark.
    pub pheromone_size: f32,
    /// Air friction of the head body.
    pub head_friction: f32,
    /// Air friction of trailing segments.
    pub segment_friction: f32,
    /// Operator input queue staleness window, milliseconds.
    pub input_staleness_ms: u64,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for SlinkConfig {
    fn default() -> Self {
        Self {
            initial_length: 30,
            head_width: 10.0,
            tail_width: 5.0,
            link_offset: 1.5,
            link_stiffness: 1.0,
            vision_depth: 50.0,
            initial_energy: 1000.0,
            energy_regen: 0.1,
            forward_force: 0.01,
            turn_torque: 0.01,
            tongue_delta: 0.01,
            move_cost: 1.0,
            growth_cost: 50.0,
            mark_cost: 10.0,
            mate_cost: 100.0,
            failure_reward: -100.0,
            success_reward: 100.0,
            reward_decay: 0.85,
            reward_snap_threshold: 3.0,
            sound_volume_decay: 0.85,
            chirp_volume: 1.0,
            sound_freq_min: 20.0,
            sound_freq_max: 20_000.0,
            initial_sound_freq: 440.0,
            hearing_range: 400.0,
            initial_head_hue: 0.7,
            initial_tail_hue: 0.3,
            hue_step: 1.0 / 360.0,
            pheromone_decay: 0.999,
            pheromone_min_size: 2.0,
            pheromone_size: 8.0,
            head_friction: 0.5,
            segment_friction: 0.1,
            input_staleness_ms: 20,
            rng_seed: None,
        }
    }
}

impl SlinkConfig {
    /// Validate the configuration, failing fast on nonsensical values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.head_width <= 0.0 || self.tail_width <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "segment widths must be positive",
            ));
        }
        if self.tail_width > self.head_width {
            return Err(ConfigError::InvalidConfig(
                "tail_width cannot exceed head_width",
            ));
        }
        if self.vision_depth <= 0.0 {
            return Err(ConfigError::InvalidConfig("vision_depth must be positive"));
        }
        if self.initial_energy < 0.0 || self.energy_regen < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "energy values must be non-negative",
            ));
        }
        if self.move_cost < 0.0
            || self.growth_cost < 0.0
            || self.mark_cost < 0.0
            || self.mate_cost < 0.0
        {
            return Err(ConfigError::InvalidConfig(
                "action costs must be non-negative",
            ));
        }
        if !(0.0..1.0).contains(&self.reward_decay) {
            return Err(ConfigError::InvalidConfig(
                "reward_decay must be in [0, 1)",
            ));
        }
        if self.reward_snap_threshold < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "reward_snap_threshold must be non-negative",
            ));
        }
        if !(0.0..1.0).contains(&self.sound_volume_decay) {
            return Err(ConfigError::InvalidConfig(
                "sound_volume_decay must be in [0, 1)",
            ));
        }
        if self.sound_freq_min <= 0.0 || self.sound_freq_max <= self.sound_freq_min {
            return Err(ConfigError::InvalidConfig(
                "sound frequency range must be positive and ordered",
            ));
        }
        if !(self.sound_freq_min..=self.sound_freq_max).contains(&self.initial_sound_freq) {
            return Err(ConfigError::InvalidConfig(
                "initial_sound_freq outside the audible range",
            ));
        }
        if self.hearing_range <= 0.0 {
            return Err(ConfigError::InvalidConfig("hearing_range must be positive"));
        }
        if !(0.0..1.0).contains(&self.pheromone_decay) {
            return Err(ConfigError::InvalidConfig(
                "pheromone_decay must be in [0, 1)",
            ));
        }
        if self.pheromone_size <= 0.0 || self.pheromone_min_size <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "pheromone sizes must be positive",
            ));
        }
        if self.failure_reward > 0.0 {
            return Err(ConfigError::InvalidConfig(
                "failure_reward must not be positive",
            ));
        }
        if self.success_reward < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "success_reward must not be negative",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}
