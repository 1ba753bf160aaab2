//! Core types for the slink simulation: agent state, sensing, the action
//! executor, reward routing, and the per-tick orchestration pipeline.
//!
//! The physics substrate lives in `slink-physics`; decision policies plug in
//! behind the [`Policy`] trait and live in `slink-policy` (or anywhere else).

pub mod action;
pub mod agent;
pub mod config;
pub mod perception;
pub mod policy;
pub mod reward;
pub mod sensor;
pub mod sound;
pub mod world;

pub use action::{Action, ActionError, NUM_ACTIONS};
pub use agent::{Agent, AgentId, AgentMap, ControlMode, TouchState};
pub use config::{ConfigError, SlinkConfig};
pub use perception::{PERCEPTION_LEN, PerceptionInputs, assemble_perception};
pub use policy::{Decision, Policy, PolicyBinding, PolicyError, PolicyRegistry};
pub use reward::RewardAccumulator;
pub use sensor::{BinRecord, FoodHit, MarkHit, NUM_BINS, SensorBins, SnakeHit, WallHit};
pub use sound::{SideBand, SoundEmitter, SoundField, listen};
pub use world::{
    BodyTag, Food, FoodId, Mark, MarkId, Marker, MarkerId, MateEnd, MateRequest, Notice,
    Simulation, Tick, TickError, TickEvents,
};

/// Collision categories and masks shared by every body the core spawns.
///
/// Grate is a barrier that stops creatures while food and pheromone
/// particles drift through it; the scan mask is what a sensor wedge is
/// allowed to see.
pub mod layers {
    pub const FOOD: u32 = 0b00001;
    pub const PHEROMONE: u32 = 0b00010;
    pub const WALL: u32 = 0b00100;
    pub const GRATE: u32 = 0b01000;
    pub const SNAKE: u32 = 0b10000;

    pub const SNAKE_MASK: u32 = 0b11111;
    pub const FOOD_MASK: u32 = 0b10101;
    pub const PHEROMONE_MASK: u32 = 0b10110;
    pub const WALL_MASK: u32 = 0b10111;
    pub const GRATE_MASK: u32 = 0b11000;
    pub const SCAN_MASK: u32 = FOOD | PHEROMONE | WALL | SNAKE;
}
