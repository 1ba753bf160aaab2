//! Five-bin wedge sensor array.
//!
//! Each bin is a quarter-pi wedge anchored at the head; the five bins sweep
//! from hard left to hard right of the heading. Scanning itself lives in the
//! simulation (it needs the physics world); this module owns the geometry and
//! the per-bin record types.

use std::f32::consts::{FRAC_PI_4, FRAC_PI_8};

use slink_physics::Vec2;

use crate::agent::AgentId;
use crate::world::{FoodId, MarkId};

/// Number of sensor wedges.
pub const NUM_BINS: usize = 5;

/// Nearest foreign creature seen in a bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnakeHit {
    pub agent: AgentId,
    pub distance: f32,
    pub hue: f32,
    pub energy: f32,
}

/// Nearest pheromone mark seen in a bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkHit {
    pub mark: MarkId,
    pub distance: f32,
    pub hue: f32,
    pub size: f32,
}

/// Nearest food particle seen in a bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoodHit {
    pub food: FoodId,
    pub distance: f32,
    pub size: f32,
}

/// Nearest wall seen in a bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallHit {
    pub distance: f32,
}

/// What one wedge saw this tick: the nearest hit per category, or nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BinRecord {
    pub snake: Option<SnakeHit>,
    pub mark: Option<MarkHit>,
    pub food: Option<FoodHit>,
    pub wall: Option<WallHit>,
}

/// One full sweep of the array, left to right.
pub type SensorBins = [BinRecord; NUM_BINS];

/// World-space quad approximating the wedge for bin `bin` (0..NUM_BINS).
///
/// Bins sweep left to right: bin 0 is hard left of the heading (positive
/// rotation is leftward under the +Y-forward convention), bin 2 is dead
/// ahead. The quad is the apex plus three points on the far arc, which
/// keeps the region convex for the polygon query while hugging the true
/// sector.
#[must_use]
pub fn wedge_polygon(head_position: Vec2, head_angle: f32, bin: usize, depth: f32) -> [Vec2; 4] {
    debug_assert!(bin < NUM_BINS);
    let center_angle = head_angle + ((NUM_BINS as f32 - 1.0) / 2.0 - bin as f32) * FRAC_PI_4;
    let forward = Vec2::forward(center_angle).scale(depth);
    [
        head_position,
        head_position + forward.rotate(-FRAC_PI_8),
        head_position + forward,
        head_position + forward.rotate(FRAC_PI_8),
    ]
}
