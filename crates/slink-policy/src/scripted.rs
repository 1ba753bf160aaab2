//! Scripted wanderer.
//!
//! Ignores perception and rewards entirely; every tick it emits a small
//! random burst of actions biased toward locomotion. Good enough to keep a
//! demo world lively and to drive deterministic integration tests.

use rand::{Rng, rngs::SmallRng};
use smallvec::SmallVec;

use slink_core::{Action, AgentId, Decision, PERCEPTION_LEN, Policy, PolicyError};

/// Registry kind for this policy.
pub const KIND: &str = "scripted";

/// Movement-heavy repertoire the wanderer samples from.
const REPERTOIRE: [Action; 10] = [
    Action::Forward,
    Action::Forward,
    Action::Forward,
    Action::Left,
    Action::Right,
    Action::TongueOut,
    Action::TongueIn,
    Action::Eat,
    Action::Chirp,
    Action::PheromoneRelease,
];

/// A policy that wanders at random.
pub struct ScriptedPolicy {
    owner: Option<AgentId>,
    rng: SmallRng,
}

impl ScriptedPolicy {
    #[must_use]
    pub fn new(rng: SmallRng) -> Self {
        Self { owner: None, rng }
    }
}

impl Policy for ScriptedPolicy {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn bind(&mut self, agent: AgentId) {
        self.owner = Some(agent);
    }

    fn decide(&mut self, _input: &[f32; PERCEPTION_LEN]) -> Result<Decision, PolicyError> {
        if self.owner.is_none() {
            return Err(PolicyError::Unbound);
        }
        let count = self.rng.random_range(1..=2);
        let mut decision: Decision = SmallVec::new();
        for _ in 0..count {
            let index = self.rng.random_range(0..REPERTOIRE.len());
            decision.push(REPERTOIRE[index]);
        }
        Ok(decision)
    }

    fn receive_reward(&mut self, _reward: f32) {}
}
