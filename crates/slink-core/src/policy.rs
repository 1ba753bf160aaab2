//! Decision policy seam.
//!
//! The simulation core never inspects how decisions are made; it hands each
//! bound policy the perception vector and executes whatever actions come
//! back. Policies are registered by kind so worlds can be assembled from
//! configuration without linking the core against any particular policy
//! implementation.

use std::collections::HashMap;

use rand::RngCore;
use smallvec::SmallVec;
use thiserror::Error;

use crate::action::{Action, ActionError};
use crate::agent::AgentId;
use crate::perception::PERCEPTION_LEN;

/// Errors surfaced by a policy during a tick.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// `decide` was called before the policy was bound to an agent.
    #[error("policy invoked before binding to an agent")]
    Unbound,
    #[error(transparent)]
    InvalidAction(#[from] ActionError),
    #[error("no policy registered under kind {0:?}")]
    UnknownKind(String),
}

/// Actions issued in a single tick. Small enough to avoid heap traffic for
/// the common one-or-two-action case.
pub type Decision = SmallVec<[Action; 4]>;

/// A pluggable decision maker for one agent.
pub trait Policy: Send {
    /// Stable identifier for this policy implementation.
    fn kind(&self) -> &'static str;

    /// Attach the policy to the agent it will control. Called exactly once,
    /// before the first `decide`.
    fn bind(&mut self, agent: AgentId);

    /// Choose this tick's actions from the perception vector.
    fn decide(&mut self, input: &[f32; PERCEPTION_LEN]) -> Result<Decision, PolicyError>;

    /// Deliver the accumulated reward at the end of a tick.
    fn receive_reward(&mut self, reward: f32);

    /// Interactive policies get human-readable failure notices routed to
    /// them in addition to the reward signal.
    fn is_interactive(&self) -> bool {
        false
    }
}

/// A policy attached to a specific agent.
pub struct PolicyBinding {
    policy: Box<dyn Policy>,
}

impl PolicyBinding {
    #[must_use]
    pub fn new(agent: AgentId, mut policy: Box<dyn Policy>) -> Self {
        policy.bind(agent);
        Self { policy }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.policy.kind()
    }

    pub fn decide(&mut self, input: &[f32; PERCEPTION_LEN]) -> Result<Decision, PolicyError> {
        self.policy.decide(input)
    }

    pub fn receive_reward(&mut self, reward: f32) {
        self.policy.receive_reward(reward);
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.policy.is_interactive()
    }
}

impl std::fmt::Debug for PolicyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyBinding")
            .field("kind", &self.kind())
            .finish()
    }
}

type Spawner = Box<dyn Fn(&mut dyn RngCore) -> Box<dyn Policy> + Send + Sync>;

/// Factory table mapping policy kinds to spawner closures.
#[derive(Default)]
pub struct PolicyRegistry {
    spawners: HashMap<&'static str, Spawner>,
}

impl PolicyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spawner under `kind`, replacing any previous entry.
    pub fn register<F>(&mut self, kind: &'static str, spawner: F)
    where
        F: Fn(&mut dyn RngCore) -> Box<dyn Policy> + Send + Sync + 'static,
    {
        self.spawners.insert(kind, Box::new(spawner));
    }

    /// Instantiate a fresh, unbound policy of the given kind.
    pub fn spawn(
        &self,
        kind: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Box<dyn Policy>, PolicyError> {
        let spawner = self
            .spawners
            .get(kind)
            .ok_or_else(|| PolicyError::UnknownKind(kind.to_owned()))?;
        Ok(spawner(rng))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.spawners.keys().copied()
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("kinds", &self.spawners.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};
    use smallvec::smallvec;

    struct FixedPolicy {
        owner: Option<AgentId>,
    }

    impl Policy for FixedPolicy {
        fn kind(&self) -> &'static str {
            "test.fixed"
        }

        fn bind(&mut self, agent: AgentId) {
            self.owner = Some(agent);
        }

        fn decide(&mut self, _input: &[f32; PERCEPTION_LEN]) -> Result<Decision, PolicyError> {
            if self.owner.is_none() {
                return Err(PolicyError::Unbound);
            }
            Ok(smallvec![Action::Forward])
        }

        fn receive_reward(&mut self, _reward: f32) {}
    }

    #[test]
    fn registry_spawns_registered_kinds() {
        let mut registry = PolicyRegistry::new();
        registry.register("test.fixed", |_| Box::new(FixedPolicy { owner: None }));
        let mut rng = SmallRng::seed_from_u64(1);
        let policy = registry.spawn("test.fixed", &mut rng).expect("spawn");
        assert_eq!(policy.kind(), "test.fixed");
        assert!(matches!(
            registry.spawn("test.missing", &mut rng),
            Err(PolicyError::UnknownKind(_))
        ));
    }

    #[test]
    fn unbound_policy_refuses_to_decide() {
        let mut policy = FixedPolicy { owner: None };
        let input = [0.0; PERCEPTION_LEN];
        assert_eq!(policy.decide(&input), Err(PolicyError::Unbound));
    }

    #[test]
    fn binding_binds_before_first_decide() {
        let agent = {
            use slotmap::SlotMap;
            let mut agents: SlotMap<AgentId, ()> = SlotMap::with_key();
            agents.insert(())
        };
        let mut binding = PolicyBinding::new(agent, Box::new(FixedPolicy { owner: None }));
        let input = [0.0; PERCEPTION_LEN];
        let decision = binding.decide(&input).expect("bound policy decides");
        assert_eq!(decision.as_slice(), [Action::Forward]);
    }
}
