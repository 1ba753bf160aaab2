//! Per-agent state: the segment chain, metabolic energy, tongue pose,
//! signaling channels, and the reward accumulator.

use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, new_key_type};

use slink_physics::{BodyId, Vec2, World};

use crate::reward::RewardAccumulator;
use crate::world::BodyTag;

new_key_type! {
    /// Stable generational handle for agents.
    pub struct AgentId;
}

/// Dense per-agent storage keyed by [`AgentId`].
pub type AgentMap<T> = SecondaryMap<AgentId, T>;

/// How the tongue is steered.
///
/// Autonomous tongues follow the angle/extension pose the agent's actions
/// set. A grabbing tongue tracks a specific body instead, which is how an
/// operator drags things around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Autonomous,
    Grabbing { body: BodyId },
}

/// Contacts registered against this agent's own segments during a tick.
///
/// Side touches carry the normalized position along the body (0 at the head,
/// 1 at the tail) so perception can tell where the body was brushed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchState {
    pub head: Option<AgentId>,
    pub tail: Option<AgentId>,
    pub left: Option<f32>,
    pub right: Option<f32>,
}

/// One segmented creature.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    /// Physics bodies head-first; index 0 is always the head.
    pub segments: Vec<BodyId>,
    /// Negative collision group shared by this agent's segments.
    pub group: i32,
    pub energy: f32,
    pub depth_of_vision: f32,
    /// Tongue angle relative to the head heading, radians in [-pi/2, pi/2].
    pub tongue_angle: f32,
    /// Tongue extension fraction in [0, 1].
    pub tongue_extension: f32,
    pub pheromone_hue: f32,
    pub head_hue: f32,
    pub tail_hue: f32,
    pub sound_freq: f32,
    pub sound_volume: f32,
    pub reward: RewardAccumulator,
    pub control: ControlMode,
    /// Touches routed from the current tick's contacts; snapshotted at the
    /// next sense stage.
    pub touch: TouchState,
}

impl Agent {
    #[must_use]
    pub fn head(&self) -> BodyId {
        self.segments[0]
    }

    #[must_use]
    pub fn tail(&self) -> BodyId {
        *self.segments.last().unwrap_or(&self.segments[0])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Effective tongue angle and extension, resolving grab tracking against
    /// the current body positions.
    #[must_use]
    pub fn tongue_pose(&self, physics: &World<BodyTag>) -> (f32, f32) {
        match self.control {
            ControlMode::Autonomous => (self.tongue_angle, self.tongue_extension),
            ControlMode::Grabbing { body } => {
                let Some(head) = physics.body(self.head()) else {
                    return (self.tongue_angle, self.tongue_extension);
                };
                let Some(target) = physics.body(body) else {
                    return (self.tongue_angle, self.tongue_extension);
                };
                let to_target = target.position - head.position;
                let forward = Vec2::forward(head.angle);
                let angle = forward
                    .cross(to_target.normalized())
                    .asin()
                    .clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2);
                let head_radius = head.radius();
                let extension = if self.depth_of_vision > 0.0 {
                    ((to_target.length() - head_radius) / self.depth_of_vision).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (angle, extension)
            }
        }
    }

    /// World position of the tongue tip.
    #[must_use]
    pub fn tongue_tip(&self, physics: &World<BodyTag>) -> Option<Vec2> {
        let head = physics.body(self.head())?;
        let (angle, extension) = self.tongue_pose(physics);
        let reach = head.radius() + extension * self.depth_of_vision;
        let direction = Vec2::forward(head.angle).rotate(angle);
        Some(head.position + direction.scale(reach))
    }
}
