//! World state and the per-tick pipeline.
//!
//! A tick always runs the same stages in the same order: advance physics,
//! sense, decide and execute actions, route contacts, deliver rewards and
//! decay signals, then age and sweep particles. Policies only ever observe
//! the world between ticks, through the perception vector.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slotmap::{Key, SlotMap, new_key_type};
use thiserror::Error;
use tracing::debug;

use slink_physics::{
    Body, BodyId, CollisionFilter, Contact, PhysicsError, Shape, Vec2, World,
};

use crate::action::{Action, ActionError};
use crate::agent::{Agent, AgentId, AgentMap, ControlMode, TouchState};
use crate::config::{SEMITONE_RATIO, ConfigError, SlinkConfig};
use crate::layers;
use crate::perception::{PerceptionInputs, assemble_perception};
use crate::policy::{Policy, PolicyBinding, PolicyError, PolicyRegistry};
use crate::reward::RewardAccumulator;
use crate::sensor::{FoodHit, MarkHit, SensorBins, SnakeHit, WallHit, wedge_polygon};
use crate::sound::{SoundEmitter, SoundField, listen};

new_key_type! {
    /// Handle for food particles.
    pub struct FoodId;
    /// Handle for pheromone marks.
    pub struct MarkId;
    /// Handle for reward markers.
    pub struct MarkerId;
}

/// What a physics body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyTag {
    Segment { agent: AgentId, index: u16 },
    Food(FoodId),
    Mark(MarkId),
    Marker(MarkerId),
    Wall,
}

/// Edible particle. Eating transfers `size` into the eater's energy.
#[derive(Debug, Clone, Copy)]
pub struct Food {
    pub body: BodyId,
    pub size: f32,
    pub consumed: bool,
}

/// Visible pheromone mark that shrinks every tick until it expires.
#[derive(Debug, Clone, Copy)]
pub struct Mark {
    pub body: BodyId,
    pub hue: f32,
    pub consumed: bool,
}

/// Reward token delivered to whichever agent touches it first.
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub body: BodyId,
    pub amount: f32,
    pub consumed: bool,
}

/// Which end of the body a mating attempt offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateEnd {
    Head,
    Tail,
}

/// A paid, contact-backed mating attempt surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MateRequest {
    pub agent: AgentId,
    pub partner: AgentId,
    pub end: MateEnd,
}

/// Human-readable event for interactive policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub agent: AgentId,
    pub message: String,
}

/// Monotonic tick counter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickEvents {
    pub tick: Tick,
    pub food_consumed: u32,
    pub marks_expired: u32,
    pub mate_requests: Vec<MateRequest>,
    pub notices: Vec<Notice>,
}

/// Fatal errors that abort a tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
    #[error("unknown agent handle")]
    UnknownAgent,
}

/// Readings captured at the sense stage, stable for the rest of the tick.
#[derive(Debug, Clone, Copy, Default)]
struct Sensed {
    bins: SensorBins,
    sound: SoundField,
    touch: TouchState,
}

/// The whole simulation: physics substrate, agents, particles, policies.
pub struct Simulation {
    config: SlinkConfig,
    physics: World<BodyTag>,
    tick: Tick,
    rng: rand::rngs::SmallRng,
    agents: SlotMap<AgentId, Agent>,
    policies: AgentMap<PolicyBinding>,
    registry: PolicyRegistry,
    foods: SlotMap<FoodId, Food>,
    marks: SlotMap<MarkId, Mark>,
    markers: SlotMap<MarkerId, Marker>,
    sensed: AgentMap<Sensed>,
    mate_requests: Vec<MateRequest>,
    notices: Vec<Notice>,
}

impl Simulation {
    /// Build a world from a validated configuration.
    pub fn new(config: SlinkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            physics: World::new(),
            tick: Tick::zero(),
            rng,
            agents: SlotMap::with_key(),
            policies: AgentMap::new(),
            registry: PolicyRegistry::new(),
            foods: SlotMap::with_key(),
            marks: SlotMap::with_key(),
            markers: SlotMap::with_key(),
            sensed: AgentMap::new(),
            mate_requests: Vec::new(),
            notices: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SlinkConfig {
        &self.config
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    #[must_use]
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    #[must_use]
    pub fn physics(&self) -> &World<BodyTag> {
        &self.physics
    }

    #[must_use]
    pub fn physics_mut(&mut self) -> &mut World<BodyTag> {
        &mut self.physics
    }

    #[must_use]
    pub fn registry_mut(&mut self) -> &mut PolicyRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn foods(&self) -> impl Iterator<Item = (FoodId, &Food)> {
        self.foods.iter()
    }

    #[must_use]
    pub fn marks(&self) -> impl Iterator<Item = (MarkId, &Mark)> {
        self.marks.iter()
    }

    /// Attach a policy instance to an agent.
    pub fn bind_policy(
        &mut self,
        agent: AgentId,
        policy: Box<dyn Policy>,
    ) -> Result<(), TickError> {
        if !self.agents.contains_key(agent) {
            return Err(TickError::UnknownAgent);
        }
        self.policies.insert(agent, PolicyBinding::new(agent, policy));
        Ok(())
    }

    /// Spawn a registered policy kind and bind it to an agent.
    pub fn bind_from_registry(&mut self, agent: AgentId, kind: &str) -> Result<(), TickError> {
        let policy = self.registry.spawn(kind, &mut self.rng)?;
        self.bind_policy(agent, policy)
    }

    /// Spawn a creature: a head plus `initial_length` tapered segments, all
    /// sharing a fresh negative collision group so the chain passes through
    /// itself.
    pub fn spawn_agent(
        &mut self,
        name: impl Into<String>,
        position: Vec2,
    ) -> Result<AgentId, TickError> {
        let group = self.physics.next_group();
        let filter = CollisionFilter {
            group,
            category: layers::SNAKE,
            mask: layers::SNAKE_MASK,
        };
        let physics = &mut self.physics;
        let config = &self.config;
        let id = self.agents.insert_with_key(|id| {
            let head = physics.insert_body(
                Body::circle(
                    position,
                    config.head_width,
                    filter,
                    BodyTag::Segment { agent: id, index: 0 },
                )
                .with_friction(config.head_friction),
            );
            Agent {
                name: String::new(),
                segments: vec![head],
                group,
                energy: config.initial_energy,
                depth_of_vision: config.vision_depth,
                tongue_angle: 0.0,
                tongue_extension: 0.5,
                pheromone_hue: 0.0,
                head_hue: config.initial_head_hue,
                tail_hue: config.initial_tail_hue,
                sound_freq: config.initial_sound_freq,
                sound_volume: 0.0,
                reward: RewardAccumulator::default(),
                control: ControlMode::Autonomous,
                touch: TouchState::default(),
            }
        });
        self.agents[id].name = name.into();
        self.grow_agent(id, self.config.initial_length as usize)?;
        debug!(agent = ?id, group, "spawned agent");
        Ok(id)
    }

    /// Append `count` segments at the tail and re-taper the whole chain so
    /// radii run linearly from head width down to tail width.
    pub fn grow_agent(&mut self, id: AgentId, count: usize) -> Result<(), TickError> {
        let (group, mut prev, mut index, tail_pos, tail_angle) = {
            let agent = self.agents.get(id).ok_or(TickError::UnknownAgent)?;
            let tail = self
                .physics
                .body(agent.tail())
                .ok_or(PhysicsError::UnknownBody)?;
            (
                agent.group,
                agent.tail(),
                agent.len() as u16,
                tail.position,
                tail.angle,
            )
        };
        let filter = CollisionFilter {
            group,
            category: layers::SNAKE,
            mask: layers::SNAKE_MASK,
        };
        let back = -Vec2::forward(tail_angle);
        for n in 0..count {
            let position = tail_pos + back.scale(self.config.link_offset * 4.0 * (n + 1) as f32);
            let body = self.physics.insert_body(
                Body::circle(
                    position,
                    self.config.tail_width,
                    filter,
                    BodyTag::Segment { agent: id, index },
                )
                .with_friction(self.config.segment_friction),
            );
            self.physics.link_segments(
                prev,
                body,
                self.config.link_offset,
                self.config.link_stiffness,
            )?;
            self.agents[id].segments.push(body);
            prev = body;
            index += 1;
        }
        self.retaper(id)
    }

    fn retaper(&mut self, id: AgentId) -> Result<(), TickError> {
        let segments = self.agents.get(id).ok_or(TickError::UnknownAgent)?.segments.clone();
        let len = segments.len();
        for (i, body_id) in segments.into_iter().enumerate() {
            let target = if len > 1 {
                let t = i as f32 / (len - 1) as f32;
                self.config.head_width + (self.config.tail_width - self.config.head_width) * t
            } else {
                self.config.head_width
            };
            let actual = self
                .physics
                .body(body_id)
                .ok_or(PhysicsError::UnknownBody)?
                .radius();
            if actual > 0.0 {
                self.physics.scale_radius(body_id, target / actual)?;
            }
        }
        Ok(())
    }

    /// Drop a food particle of the given size into the world.
    pub fn spawn_food(&mut self, position: Vec2, size: f32) -> FoodId {
        let filter = CollisionFilter {
            group: 0,
            category: layers::FOOD,
            mask: layers::FOOD_MASK,
        };
        let radius = size.sqrt().max(1.0);
        self.foods.insert_with_key(|fid| {
            let body = self
                .physics
                .insert_body(Body::circle(position, radius, filter, BodyTag::Food(fid)));
            Food {
                body,
                size,
                consumed: false,
            }
        })
    }

    /// Place a pheromone mark directly.
    pub fn spawn_mark(&mut self, position: Vec2, hue: f32, size: f32) -> MarkId {
        let filter = CollisionFilter {
            group: 0,
            category: layers::PHEROMONE,
            mask: layers::PHEROMONE_MASK,
        };
        self.marks.insert_with_key(|mid| {
            let body = self
                .physics
                .insert_body(Body::circle(position, size, filter, BodyTag::Mark(mid)));
            Mark {
                body,
                hue,
                consumed: false,
            }
        })
    }

    /// Place a reward marker worth `amount` to whoever touches it.
    pub fn spawn_marker(&mut self, position: Vec2, amount: f32, radius: f32) -> MarkerId {
        let filter = CollisionFilter {
            group: 0,
            category: layers::PHEROMONE,
            mask: layers::PHEROMONE_MASK,
        };
        self.markers.insert_with_key(|mid| {
            let body = self
                .physics
                .insert_body(Body::circle(position, radius, filter, BodyTag::Marker(mid)));
            Marker {
                body,
                amount,
                consumed: false,
            }
        })
    }

    /// Place a static wall.
    pub fn spawn_wall(&mut self, position: Vec2, width: f32, height: f32) -> BodyId {
        let filter = CollisionFilter {
            group: 0,
            category: layers::WALL,
            mask: layers::WALL_MASK,
        };
        self.physics
            .insert_body(Body::static_rect(position, width, height, filter, BodyTag::Wall))
    }

    /// Advance the world by one tick.
    pub fn step(&mut self) -> Result<TickEvents, TickError> {
        self.physics.step(1.0);
        let contacts = self.physics.drain_contacts();

        self.stage_sense();
        self.stage_decide()?;
        self.route_contacts(&contacts);
        self.stage_deliver();
        let mut events = self.stage_sweep();

        events.tick = self.tick;
        events.mate_requests = std::mem::take(&mut self.mate_requests);
        events.notices = std::mem::take(&mut self.notices);
        self.tick = self.tick.next();
        debug!(
            tick = self.tick.0,
            food_consumed = events.food_consumed,
            marks_expired = events.marks_expired,
            "tick complete"
        );
        Ok(events)
    }

    /// Snapshot every agent's senses: wedge scans, the stereo sound field,
    /// and the touches routed by the previous tick. Scans run in parallel;
    /// touch snapshots clear the live flags so stale contacts never leak
    /// into a later tick.
    fn stage_sense(&mut self) {
        let touches: Vec<(AgentId, TouchState)> = self
            .agents
            .iter_mut()
            .map(|(id, agent)| (id, std::mem::take(&mut agent.touch)))
            .collect();

        let emitters: Vec<(AgentId, SoundEmitter)> = self
            .agents
            .iter()
            .filter(|(_, agent)| agent.sound_volume > 0.0)
            .filter_map(|(id, agent)| {
                let head = self.physics.body(agent.head())?;
                Some((
                    id,
                    SoundEmitter {
                        position: head.position,
                        frequency: agent.sound_freq,
                        volume: agent.sound_volume,
                    },
                ))
            })
            .collect();

        let physics = &self.physics;
        let agents = &self.agents;
        let foods = &self.foods;
        let marks = &self.marks;
        let hearing_range = self.config.hearing_range;

        let sensed: Vec<(AgentId, Sensed)> = touches
            .into_par_iter()
            .map(|(id, touch)| {
                let agent = &agents[id];
                let bins = scan_bins(physics, agents, foods, marks, agent);
                let sound = match physics.body(agent.head()) {
                    Some(head) => {
                        let others: Vec<SoundEmitter> = emitters
                            .iter()
                            .filter(|(emitter_id, _)| *emitter_id != id)
                            .map(|(_, emitter)| *emitter)
                            .collect();
                        listen(head.position, head.angle, hearing_range, &others)
                    }
                    None => SoundField::default(),
                };
                (id, Sensed { bins, sound, touch })
            })
            .collect();

        self.sensed.clear();
        for (id, readings) in sensed {
            self.sensed.insert(id, readings);
        }
    }

    /// Assemble each bound agent's perception vector, ask its policy for a
    /// decision, and execute the resulting actions. Policy errors are fatal.
    fn stage_decide(&mut self) -> Result<(), TickError> {
        let ids: Vec<AgentId> = self.agents.keys().collect();
        for id in ids {
            if !self.policies.contains_key(id) {
                continue;
            }
            let vector = {
                let agent = self.agents.get(id).ok_or(TickError::UnknownAgent)?;
                let Some(readings) = self.sensed.get(id) else {
                    continue;
                };
                let head_velocity = self
                    .physics
                    .body(agent.head())
                    .map(|b| b.velocity)
                    .unwrap_or_default();
                assemble_perception(&PerceptionInputs {
                    segment_count: agent.len(),
                    energy: agent.energy,
                    head_velocity,
                    depth_of_vision: agent.depth_of_vision,
                    bins: &readings.bins,
                    touch: readings.touch,
                    sound: readings.sound,
                })
            };
            let decision = self
                .policies
                .get_mut(id)
                .ok_or(TickError::UnknownAgent)?
                .decide(&vector)?;
            for action in decision {
                self.execute(id, action)?;
            }
        }
        Ok(())
    }

    /// Apply one action for one agent. Costed actions that cannot be paid
    /// for are rejected outright and self-punished; they never partially
    /// apply.
    pub fn execute(&mut self, id: AgentId, action: Action) -> Result<(), TickError> {
        if !self.agents.contains_key(id) {
            return Err(TickError::UnknownAgent);
        }
        match action {
            Action::Forward | Action::Backward => {
                if self.try_spend(id, self.config.move_cost) {
                    let agent = &self.agents[id];
                    let head = agent.head();
                    let angle = self
                        .physics
                        .body(head)
                        .ok_or(PhysicsError::UnknownBody)?
                        .angle;
                    let sign = if action == Action::Forward { 1.0 } else { -1.0 };
                    let force = Vec2::forward(angle).scale(self.config.forward_force * sign);
                    self.physics.apply_force(head, force)?;
                }
            }
            Action::Left | Action::Right => {
                let head = self.agents[id].head();
                let sign = if action == Action::Left { 1.0 } else { -1.0 };
                self.physics
                    .apply_torque(head, self.config.turn_torque * sign)?;
            }
            Action::TongueOut => {
                let delta = self.config.tongue_delta;
                let agent = &mut self.agents[id];
                agent.tongue_extension = (agent.tongue_extension + delta).clamp(0.0, 1.0);
            }
            Action::TongueIn => {
                let delta = self.config.tongue_delta;
                let agent = &mut self.agents[id];
                agent.tongue_extension = (agent.tongue_extension - delta).clamp(0.0, 1.0);
            }
            Action::TongueLeft => {
                let delta = self.config.tongue_delta;
                let agent = &mut self.agents[id];
                agent.tongue_angle = (agent.tongue_angle + delta)
                    .clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2);
            }
            Action::TongueRight => {
                let delta = self.config.tongue_delta;
                let agent = &mut self.agents[id];
                agent.tongue_angle = (agent.tongue_angle - delta)
                    .clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2);
            }
            Action::Eat => self.execute_eat(id),
            Action::MateHead => self.execute_mate(id, MateEnd::Head),
            Action::MateTail => self.execute_mate(id, MateEnd::Tail),
            Action::Grow => {
                if self.try_spend(id, self.config.growth_cost) {
                    self.grow_agent(id, 1)?;
                    self.agents[id].reward.apply(self.config.success_reward);
                }
            }
            Action::PheromoneIncColor => {
                let step = self.config.hue_step;
                let agent = &mut self.agents[id];
                agent.pheromone_hue = (agent.pheromone_hue + step).rem_euclid(1.0);
            }
            Action::PheromoneDecColor => {
                let step = self.config.hue_step;
                let agent = &mut self.agents[id];
                agent.pheromone_hue = (agent.pheromone_hue - step).rem_euclid(1.0);
            }
            Action::PheromoneRelease => {
                if self.try_spend(id, self.config.mark_cost) {
                    let (position, hue) = {
                        let agent = &self.agents[id];
                        let head = self
                            .physics
                            .body(agent.head())
                            .ok_or(PhysicsError::UnknownBody)?;
                        let drop = head.position
                            + Vec2::forward(head.angle).scale(head.radius() * 2.0);
                        (drop, agent.pheromone_hue)
                    };
                    self.spawn_mark(position, hue, self.config.pheromone_size);
                }
            }
            Action::HeadIncColor => {
                let step = self.config.hue_step;
                let agent = &mut self.agents[id];
                agent.head_hue = (agent.head_hue + step).rem_euclid(1.0);
            }
            Action::HeadDecColor => {
                let step = self.config.hue_step;
                let agent = &mut self.agents[id];
                agent.head_hue = (agent.head_hue - step).rem_euclid(1.0);
            }
            Action::TailIncColor => {
                let step = self.config.hue_step;
                let agent = &mut self.agents[id];
                agent.tail_hue = (agent.tail_hue + step).rem_euclid(1.0);
            }
            Action::TailDecColor => {
                let step = self.config.hue_step;
                let agent = &mut self.agents[id];
                agent.tail_hue = (agent.tail_hue - step).rem_euclid(1.0);
            }
            Action::SoundIncFreq => {
                let (min, max) = (self.config.sound_freq_min, self.config.sound_freq_max);
                let agent = &mut self.agents[id];
                agent.sound_freq = (agent.sound_freq * SEMITONE_RATIO).clamp(min, max);
            }
            Action::SoundDecFreq => {
                let (min, max) = (self.config.sound_freq_min, self.config.sound_freq_max);
                let agent = &mut self.agents[id];
                agent.sound_freq = (agent.sound_freq / SEMITONE_RATIO).clamp(min, max);
            }
            Action::Chirp => {
                let volume = self.config.chirp_volume;
                self.agents[id].sound_volume = volume;
            }
        }
        Ok(())
    }

    /// Debit `cost` if the agent can afford it. Rejected actions are
    /// self-punished with the failure reward and never touch energy.
    fn try_spend(&mut self, id: AgentId, cost: f32) -> bool {
        let failure = self.config.failure_reward;
        let agent = &mut self.agents[id];
        if agent.energy > cost {
            agent.energy -= cost;
            true
        } else {
            agent.reward.apply(failure);
            self.notify(id, "not enough energy");
            false
        }
    }

    fn notify(&mut self, id: AgentId, message: &str) {
        if self.policies.get(id).is_some_and(PolicyBinding::is_interactive) {
            self.notices.push(Notice {
                agent: id,
                message: message.to_owned(),
            });
        }
    }

    fn execute_eat(&mut self, id: AgentId) {
        let tip_and_group = {
            let agent = &self.agents[id];
            agent.tongue_tip(&self.physics).map(|tip| (tip, agent.group))
        };
        let Some((tip, group)) = tip_and_group else {
            self.fail_action(id, "nothing to eat");
            return;
        };
        let filter = CollisionFilter {
            group,
            category: layers::SNAKE,
            mask: layers::FOOD,
        };
        let hit = self
            .physics
            .query_point(tip, filter)
            .into_iter()
            .find_map(|body| match self.physics.body(body)?.tag {
                BodyTag::Food(fid) if !self.foods.get(fid)?.consumed => Some(fid),
                _ => None,
            });
        match hit {
            Some(fid) => {
                let size = self.foods[fid].size;
                self.foods[fid].consumed = true;
                let body = self.foods[fid].body;
                if let Some(body) = self.physics.body_mut(body) {
                    // Excluded from queries and contacts for the rest of
                    // the tick.
                    body.filter.category = 0;
                    body.filter.mask = 0;
                }
                let agent = &mut self.agents[id];
                agent.energy += size;
                agent.reward.apply(self.config.success_reward);
            }
            None => self.fail_action(id, "nothing to eat"),
        }
    }

    fn execute_mate(&mut self, id: AgentId, end: MateEnd) {
        let partner = self.sensed.get(id).and_then(|s| match end {
            MateEnd::Head => s.touch.head,
            MateEnd::Tail => s.touch.tail,
        });
        let Some(partner) = partner else {
            self.fail_action(id, "no partner in contact");
            return;
        };
        if self.try_spend(id, self.config.mate_cost) {
            self.mate_requests.push(MateRequest { agent: id, partner, end });
        }
    }

    fn fail_action(&mut self, id: AgentId, message: &str) {
        let failure = self.config.failure_reward;
        self.agents[id].reward.apply(failure);
        self.notify(id, message);
    }

    /// Fold this tick's physics contacts into agent touch state and marker
    /// reward delivery.
    fn route_contacts(&mut self, contacts: &[Contact]) {
        for contact in contacts {
            let tags = {
                let a = self.physics.body(contact.body_a).map(|b| b.tag);
                let b = self.physics.body(contact.body_b).map(|b| b.tag);
                match (a, b) {
                    (Some(a), Some(b)) => Some((a, b)),
                    _ => None,
                }
            };
            let Some((tag_a, tag_b)) = tags else {
                continue;
            };
            self.route_pair(contact.body_a, tag_a, contact.body_b, tag_b);
            self.route_pair(contact.body_b, tag_b, contact.body_a, tag_a);
        }
    }

    fn route_pair(
        &mut self,
        touched_body: BodyId,
        touched: BodyTag,
        toucher_body: BodyId,
        toucher: BodyTag,
    ) {
        match (touched, toucher) {
            (
                BodyTag::Segment { agent, index },
                BodyTag::Segment { agent: other, .. },
            ) if other != agent => {
                self.register_touch(agent, touched_body, index, Some(other), toucher_body);
            }
            (BodyTag::Segment { agent, index }, BodyTag::Wall) => {
                self.register_touch(agent, touched_body, index, None, toucher_body);
            }
            (BodyTag::Segment { agent, .. }, BodyTag::Marker(mid)) => {
                self.consume_marker(mid, agent);
            }
            _ => {}
        }
    }

    /// Record a touch on one of an agent's segments. Head and tail contacts
    /// with another creature set the mating flags; everything else is a side
    /// touch carrying the normalized position along the body.
    fn register_touch(
        &mut self,
        agent_id: AgentId,
        segment_body: BodyId,
        index: u16,
        toucher: Option<AgentId>,
        toucher_body: BodyId,
    ) {
        let side = match (self.physics.body(segment_body), self.physics.body(toucher_body)) {
            (Some(segment), Some(toucher)) => {
                Vec2::forward(segment.angle).cross(toucher.position - segment.position)
            }
            _ => return,
        };
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        let len = agent.len();
        if let Some(other) = toucher {
            if index == 0 {
                agent.touch.head = Some(other);
                return;
            }
            if usize::from(index) + 1 == len {
                agent.touch.tail = Some(other);
                return;
            }
        }
        let along = if len > 1 {
            f32::from(index) / (len - 1) as f32
        } else {
            0.0
        };
        if side > 0.0 {
            agent.touch.left = Some(along);
        } else {
            agent.touch.right = Some(along);
        }
    }

    fn consume_marker(&mut self, mid: MarkerId, agent_id: AgentId) {
        let (amount, body) = {
            let Some(marker) = self.markers.get_mut(mid) else {
                return;
            };
            if marker.consumed {
                return;
            }
            marker.consumed = true;
            (marker.amount, marker.body)
        };
        if let Some(body) = self.physics.body_mut(body) {
            body.filter.category = 0;
            body.filter.mask = 0;
        }
        if let Some(agent) = self.agents.get_mut(agent_id) {
            agent.reward.apply(amount);
        }
    }

    /// Deliver accumulated rewards to policies, then decay per-agent
    /// signals: the accumulator, chirp volume, and energy regeneration.
    fn stage_deliver(&mut self) {
        let decay = self.config.reward_decay;
        let snap = self.config.reward_snap_threshold;
        let sound_decay = self.config.sound_volume_decay;
        let regen = self.config.energy_regen;
        for (id, agent) in &mut self.agents {
            if let Some(binding) = self.policies.get_mut(id) {
                binding.receive_reward(agent.reward.value());
            }
            agent.reward.decay(decay, snap);
            agent.sound_volume *= sound_decay;
            if agent.sound_volume < 1e-3 {
                agent.sound_volume = 0.0;
            }
            agent.energy += regen;
            if let Some(readings) = self.sensed.get_mut(id) {
                readings.touch = TouchState::default();
            }
        }
    }

    /// Age pheromone marks and sweep every consumed particle out of the
    /// world along with its body.
    fn stage_sweep(&mut self) -> TickEvents {
        let mut events = TickEvents::default();

        let decay = self.config.pheromone_decay;
        let min_size = self.config.pheromone_min_size;
        for mark in self.marks.values_mut() {
            if mark.consumed {
                continue;
            }
            let _ = self.physics.scale_radius(mark.body, decay);
            if self
                .physics
                .body(mark.body)
                .is_some_and(|b| b.radius() < min_size)
            {
                mark.consumed = true;
            }
        }

        let eaten: Vec<FoodId> = self
            .foods
            .iter()
            .filter(|(_, food)| food.consumed)
            .map(|(fid, _)| fid)
            .collect();
        for fid in eaten {
            if let Some(food) = self.foods.remove(fid) {
                self.physics.remove_body(food.body);
                events.food_consumed += 1;
            }
        }

        let expired: Vec<MarkId> = self
            .marks
            .iter()
            .filter(|(_, mark)| mark.consumed)
            .map(|(mid, _)| mid)
            .collect();
        for mid in expired {
            if let Some(mark) = self.marks.remove(mid) {
                self.physics.remove_body(mark.body);
                events.marks_expired += 1;
            }
        }

        let spent: Vec<MarkerId> = self
            .markers
            .iter()
            .filter(|(_, marker)| marker.consumed)
            .map(|(mid, _)| mid)
            .collect();
        for mid in spent {
            if let Some(marker) = self.markers.remove(mid) {
                self.physics.remove_body(marker.body);
            }
        }

        events
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("agents", &self.agents.len())
            .field("foods", &self.foods.len())
            .field("marks", &self.marks.len())
            .finish()
    }
}

/// One agent's wedge sweep against the physics world.
///
/// The query filter reuses the agent's own negative collision group, which
/// silently excludes its own segments. Per category the nearest hit wins;
/// ties break on the body handle so a sweep is deterministic.
fn scan_bins(
    physics: &World<BodyTag>,
    agents: &SlotMap<AgentId, Agent>,
    foods: &SlotMap<FoodId, Food>,
    marks: &SlotMap<MarkId, Mark>,
    agent: &Agent,
) -> SensorBins {
    let mut bins = SensorBins::default();
    let Some(head) = physics.body(agent.head()) else {
        return bins;
    };
    let filter = CollisionFilter {
        group: agent.group,
        category: layers::SNAKE,
        mask: layers::SCAN_MASK,
    };
    for (bin_index, record) in bins.iter_mut().enumerate() {
        let wedge = wedge_polygon(head.position, head.angle, bin_index, agent.depth_of_vision);
        let mut nearest_snake: Option<(OrderedFloat<f32>, u64, SnakeHit)> = None;
        let mut nearest_mark: Option<(OrderedFloat<f32>, u64, MarkHit)> = None;
        let mut nearest_food: Option<(OrderedFloat<f32>, u64, FoodHit)> = None;
        let mut nearest_wall: Option<(OrderedFloat<f32>, u64, WallHit)> = None;
        for body_id in physics.query_polygon(&wedge, filter) {
            let Some(body) = physics.body(body_id) else {
                continue;
            };
            let distance = hit_distance(head.position, body.position, body.shape);
            let key = (OrderedFloat(distance), body_id.data().as_ffi());
            match body.tag {
                BodyTag::Segment { agent: other, .. } => {
                    let Some(other_agent) = agents.get(other) else {
                        continue;
                    };
                    let hit = SnakeHit {
                        agent: other,
                        distance,
                        hue: other_agent.head_hue,
                        energy: other_agent.energy,
                    };
                    keep_nearest(&mut nearest_snake, key, hit);
                }
                BodyTag::Mark(mid) => {
                    let Some(mark) = marks.get(mid) else {
                        continue;
                    };
                    if mark.consumed {
                        continue;
                    }
                    let hit = MarkHit {
                        mark: mid,
                        distance,
                        hue: mark.hue,
                        size: body.radius(),
                    };
                    keep_nearest(&mut nearest_mark, key, hit);
                }
                BodyTag::Food(fid) => {
                    let Some(food) = foods.get(fid) else {
                        continue;
                    };
                    if food.consumed {
                        continue;
                    }
                    let hit = FoodHit {
                        food: fid,
                        distance,
                        size: food.size,
                    };
                    keep_nearest(&mut nearest_food, key, hit);
                }
                BodyTag::Wall => {
                    keep_nearest(&mut nearest_wall, key, WallHit { distance });
                }
                BodyTag::Marker(_) => {}
            }
        }
        record.snake = nearest_snake.map(|(_, _, hit)| hit);
        record.mark = nearest_mark.map(|(_, _, hit)| hit);
        record.food = nearest_food.map(|(_, _, hit)| hit);
        record.wall = nearest_wall.map(|(_, _, hit)| hit);
    }
    bins
}

fn keep_nearest<H: Copy>(
    slot: &mut Option<(OrderedFloat<f32>, u64, H)>,
    key: (OrderedFloat<f32>, u64),
    hit: H,
) {
    let replace = match slot {
        Some((distance, id, _)) => key < (*distance, *id),
        None => true,
    };
    if replace {
        *slot = Some((key.0, key.1, hit));
    }
}

/// Distance from the sensing head to a body: center distance for circles,
/// closest-point distance for rectangles.
fn hit_distance(from: Vec2, position: Vec2, shape: Shape) -> f32 {
    match shape {
        Shape::Circle { .. } => (position - from).length(),
        Shape::Rect {
            half_width,
            half_height,
        } => {
            let closest = Vec2::new(
                from.x.clamp(position.x - half_width, position.x + half_width),
                from.y.clamp(position.y - half_height, position.y + half_height),
            );
            (closest - from).length()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::PERCEPTION_LEN;
    use crate::policy::{Decision, Policy};

    fn small_world() -> Simulation {
        let config = SlinkConfig {
            initial_length: 4,
            rng_seed: Some(7),
            ..SlinkConfig::default()
        };
        Simulation::new(config).expect("valid config")
    }

    struct Scripted {
        actions: Vec<Action>,
        bound: bool,
    }

    impl Scripted {
        fn repeating(actions: Vec<Action>) -> Self {
            Self {
                actions,
                bound: false,
            }
        }
    }

    impl Policy for Scripted {
        fn kind(&self) -> &'static str {
            "test.scripted"
        }

        fn bind(&mut self, _agent: AgentId) {
            self.bound = true;
        }

        fn decide(&mut self, _input: &[f32; PERCEPTION_LEN]) -> Result<Decision, PolicyError> {
            if !self.bound {
                return Err(PolicyError::Unbound);
            }
            Ok(self.actions.iter().copied().collect())
        }

        fn receive_reward(&mut self, _reward: f32) {}
    }

    #[test]
    fn spawned_agent_has_tapered_chain() {
        let mut sim = small_world();
        let id = sim.spawn_agent("worm", Vec2::ZERO).expect("spawn");
        let agent = sim.agent(id).expect("agent");
        assert_eq!(agent.len(), 5);
        let radii: Vec<f32> = agent
            .segments
            .iter()
            .map(|&b| sim.physics().body(b).unwrap().radius())
            .collect();
        assert!((radii[0] - 10.0).abs() < 1e-3);
        assert!((radii[4] - 5.0).abs() < 1e-3);
        for pair in radii.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-3, "radii taper toward the tail");
        }
    }

    #[test]
    fn grow_appends_and_retapers() {
        let mut sim = small_world();
        let id = sim.spawn_agent("worm", Vec2::ZERO).expect("spawn");
        let (old_head, old_segments) = {
            let agent = sim.agent(id).expect("agent");
            (agent.head(), agent.segments.clone())
        };
        sim.grow_agent(id, 3).expect("grow");
        let agent = sim.agent(id).expect("agent");
        assert_eq!(agent.len(), 8);
        // The original chain is untouched; growth only appends.
        assert_eq!(agent.head(), old_head);
        assert_eq!(&agent.segments[..old_segments.len()], &old_segments[..]);
        let head_radius = sim.physics().body(agent.head()).unwrap().radius();
        let tail_radius = sim.physics().body(agent.tail()).unwrap().radius();
        assert!((head_radius - 10.0).abs() < 1e-3);
        assert!((tail_radius - 5.0).abs() < 1e-3);
    }

    #[test]
    fn rejected_move_leaves_energy_and_punishes() {
        let config = SlinkConfig {
            initial_length: 2,
            move_cost: 10.0,
            energy_regen: 0.0,
            rng_seed: Some(7),
            ..SlinkConfig::default()
        };
        let mut sim = Simulation::new(config).expect("valid config");
        let id = sim.spawn_agent("tired", Vec2::ZERO).expect("spawn");
        sim.agent_mut(id).unwrap().energy = 5.0;
        sim.execute(id, Action::Forward).expect("execute");
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.energy, 5.0);
        assert_eq!(agent.reward.value(), -100.0);
        let head = sim.physics().body(agent.head()).unwrap();
        assert_eq!(head.velocity, Vec2::ZERO);
    }

    #[test]
    fn eat_transfers_size_and_consumes_same_tick() {
        let mut sim = small_world();
        let id = sim.spawn_agent("eater", Vec2::ZERO).expect("spawn");
        let agent_energy = sim.agent(id).unwrap().energy;
        // Drop food exactly at the tongue tip.
        let tip = sim.agent(id).unwrap().tongue_tip(sim.physics()).unwrap();
        sim.spawn_food(tip, 30.0);
        sim.execute(id, Action::Eat).expect("execute");
        let agent = sim.agent(id).unwrap();
        assert!((agent.energy - (agent_energy + 30.0)).abs() < 1e-3);
        assert_eq!(agent.reward.value(), 100.0);
        // The particle is already invisible to a second bite this tick.
        sim.execute(id, Action::Eat).expect("execute");
        assert_eq!(sim.agent(id).unwrap().reward.value(), -100.0);
    }

    #[test]
    fn eat_with_nothing_in_reach_is_punished() {
        let mut sim = small_world();
        let id = sim.spawn_agent("hungry", Vec2::ZERO).expect("spawn");
        sim.execute(id, Action::Eat).expect("execute");
        assert_eq!(sim.agent(id).unwrap().reward.value(), -100.0);
    }

    #[test]
    fn grow_action_charges_and_rewards() {
        let mut sim = small_world();
        let id = sim.spawn_agent("grower", Vec2::ZERO).expect("spawn");
        let before = sim.agent(id).unwrap().energy;
        sim.execute(id, Action::Grow).expect("execute");
        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.len(), 6);
        assert!((agent.energy - (before - 50.0)).abs() < 1e-3);
        assert_eq!(agent.reward.value(), 100.0);
    }

    #[test]
    fn mate_without_contact_fails() {
        let mut sim = small_world();
        let id = sim.spawn_agent("lonely", Vec2::ZERO).expect("spawn");
        sim.bind_policy(id, Box::new(Scripted::repeating(vec![Action::MateHead])))
            .expect("bind");
        let events = sim.step().expect("step");
        assert!(events.mate_requests.is_empty());
        assert_eq!(sim.agent(id).unwrap().reward.value(), -100.0 * 0.85);
    }

    #[test]
    fn sound_frequency_steps_by_semitone_and_clamps() {
        let mut sim = small_world();
        let id = sim.spawn_agent("singer", Vec2::ZERO).expect("spawn");
        sim.execute(id, Action::SoundIncFreq).expect("execute");
        let freq = sim.agent(id).unwrap().sound_freq;
        assert!((freq - 440.0 * SEMITONE_RATIO).abs() < 0.1);
        sim.agent_mut(id).unwrap().sound_freq = 19_990.0;
        for _ in 0..5 {
            sim.execute(id, Action::SoundIncFreq).expect("execute");
        }
        assert_eq!(sim.agent(id).unwrap().sound_freq, 20_000.0);
    }

    #[test]
    fn chirp_decays_over_ticks() {
        let mut sim = small_world();
        let id = sim.spawn_agent("chirper", Vec2::ZERO).expect("spawn");
        sim.bind_policy(id, Box::new(Scripted::repeating(vec![])))
            .expect("bind");
        sim.execute(id, Action::Chirp).expect("execute");
        assert_eq!(sim.agent(id).unwrap().sound_volume, 1.0);
        sim.step().expect("step");
        let volume = sim.agent(id).unwrap().sound_volume;
        assert!((volume - 0.85).abs() < 1e-3);
        for _ in 0..60 {
            sim.step().expect("step");
        }
        assert_eq!(sim.agent(id).unwrap().sound_volume, 0.0);
    }

    #[test]
    fn marker_contact_routes_reward() {
        let mut sim = small_world();
        let id = sim.spawn_agent("lucky", Vec2::ZERO).expect("spawn");
        let head_pos = sim
            .physics()
            .body(sim.agent(id).unwrap().head())
            .unwrap()
            .position;
        sim.spawn_marker(head_pos, 42.0, 6.0);
        sim.step().expect("step");
        // Marker reward lands before end-of-tick decay.
        assert!((sim.agent(id).unwrap().reward.value() - 42.0 * 0.85).abs() < 1e-3);
    }

    #[test]
    fn pheromone_release_drops_a_mark() {
        let mut sim = small_world();
        let id = sim.spawn_agent("marker", Vec2::ZERO).expect("spawn");
        sim.execute(id, Action::PheromoneRelease).expect("execute");
        assert_eq!(sim.marks().count(), 1);
        let before = sim
            .marks()
            .next()
            .map(|(_, m)| sim.physics().body(m.body).unwrap().radius())
            .unwrap();
        assert!((before - 8.0).abs() < 1e-3);
    }

    #[test]
    fn marks_shrink_and_expire() {
        let mut sim = small_world();
        sim.spawn_mark(Vec2::new(200.0, 200.0), 0.5, 2.01);
        let mut expired = 0;
        for _ in 0..20 {
            expired += sim.step().expect("step").marks_expired;
        }
        assert_eq!(expired, 1);
        assert_eq!(sim.marks().count(), 0);
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let mut sim = small_world();
        let id = sim.spawn_agent("gone", Vec2::ZERO).expect("spawn");
        sim.bind_policy(id, Box::new(Scripted::repeating(vec![])))
            .expect("bind");
        let stale = AgentId::null();
        assert!(matches!(
            sim.execute(stale, Action::Forward),
            Err(TickError::UnknownAgent)
        ));
    }
}
