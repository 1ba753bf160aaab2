//! Linear value learner.
//!
//! Scores every action as a dot product of per-action weights with the
//! perception vector, explores epsilon-greedily, and nudges the weights of
//! the most recent action by the delivered reward. Weights round-trip
//! through a compact postcard blob so learned policies survive restarts.

use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use thiserror::Error;

use slink_core::{
    Action, AgentId, Decision, NUM_ACTIONS, PERCEPTION_LEN, Policy, PolicyError,
};

/// Registry kind for this policy.
pub const KIND: &str = "value.linear";

const DEFAULT_EPSILON: f32 = 0.05;
const DEFAULT_LEARNING_RATE: f32 = 0.01;

/// Errors raised while importing or exporting a weight blob.
#[derive(Debug, Error)]
pub enum PolicyBlobError {
    #[error("blob encoding failed: {0}")]
    Encode(#[source] postcard::Error),
    #[error("blob decoding failed: {0}")]
    Decode(#[source] postcard::Error),
    #[error("blob carries {got} weights, expected {expected}")]
    WrongShape { got: usize, expected: usize },
}

#[derive(Serialize, Deserialize)]
struct ValueBlob {
    epsilon: f32,
    learning_rate: f32,
    weights: Vec<f32>,
}

/// Epsilon-greedy linear scorer over the action repertoire.
pub struct ValuePolicy {
    owner: Option<AgentId>,
    /// Row-major `NUM_ACTIONS x PERCEPTION_LEN`.
    weights: Vec<f32>,
    epsilon: f32,
    learning_rate: f32,
    rng: SmallRng,
    last: Option<(Action, [f32; PERCEPTION_LEN])>,
}

impl ValuePolicy {
    #[must_use]
    pub fn new(rng: SmallRng) -> Self {
        Self {
            owner: None,
            weights: vec![0.0; NUM_ACTIONS * PERCEPTION_LEN],
            epsilon: DEFAULT_EPSILON,
            learning_rate: DEFAULT_LEARNING_RATE,
            rng,
            last: None,
        }
    }

    #[must_use]
    pub fn with_exploration(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon.clamp(0.0, 1.0);
        self
    }

    /// Serialize the learned weights.
    pub fn export_blob(&self) -> Result<Vec<u8>, PolicyBlobError> {
        postcard::to_stdvec(&ValueBlob {
            epsilon: self.epsilon,
            learning_rate: self.learning_rate,
            weights: self.weights.clone(),
        })
        .map_err(PolicyBlobError::Encode)
    }

    /// Rebuild a policy from an exported blob.
    pub fn from_blob(bytes: &[u8], rng: SmallRng) -> Result<Self, PolicyBlobError> {
        let blob: ValueBlob = postcard::from_bytes(bytes).map_err(PolicyBlobError::Decode)?;
        let expected = NUM_ACTIONS * PERCEPTION_LEN;
        if blob.weights.len() != expected {
            return Err(PolicyBlobError::WrongShape {
                got: blob.weights.len(),
                expected,
            });
        }
        Ok(Self {
            owner: None,
            weights: blob.weights,
            epsilon: blob.epsilon,
            learning_rate: blob.learning_rate,
            rng,
            last: None,
        })
    }

    fn score(&self, action_index: usize, input: &[f32; PERCEPTION_LEN]) -> f32 {
        let row = &self.weights[action_index * PERCEPTION_LEN..(action_index + 1) * PERCEPTION_LEN];
        row.iter().zip(input.iter()).map(|(w, x)| w * x).sum()
    }
}

impl Policy for ValuePolicy {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn bind(&mut self, agent: AgentId) {
        self.owner = Some(agent);
    }

    fn decide(&mut self, input: &[f32; PERCEPTION_LEN]) -> Result<Decision, PolicyError> {
        if self.owner.is_none() {
            return Err(PolicyError::Unbound);
        }
        let index = if self.rng.random::<f32>() < self.epsilon {
            self.rng.random_range(0..NUM_ACTIONS)
        } else {
            let mut best = 0;
            let mut best_score = self.score(0, input);
            for candidate in 1..NUM_ACTIONS {
                let score = self.score(candidate, input);
                if score > best_score {
                    best = candidate;
                    best_score = score;
                }
            }
            best
        };
        let action = Action::try_from(index as u8).map_err(PolicyError::from)?;
        self.last = Some((action, *input));
        Ok(smallvec![action])
    }

    fn receive_reward(&mut self, reward: f32) {
        if reward == 0.0 {
            return;
        }
        let Some((action, input)) = self.last else {
            return;
        };
        let index = action as usize;
        let step = self.learning_rate * (reward / 100.0);
        let row = &mut self.weights[index * PERCEPTION_LEN..(index + 1) * PERCEPTION_LEN];
        for (w, x) in row.iter_mut().zip(input.iter()) {
            *w += step * x;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use slotmap::KeyData;

    fn bound_policy(seed: u64) -> ValuePolicy {
        let mut policy = ValuePolicy::new(SmallRng::seed_from_u64(seed)).with_exploration(0.0);
        policy.bind(AgentId::from(KeyData::from_ffi(1)));
        policy
    }

    #[test]
    fn unbound_policy_errors() {
        let mut policy = ValuePolicy::new(SmallRng::seed_from_u64(1));
        let input = [0.0; PERCEPTION_LEN];
        assert!(matches!(policy.decide(&input), Err(PolicyError::Unbound)));
    }

    #[test]
    fn positive_reward_reinforces_the_chosen_action() {
        let mut policy = bound_policy(3);
        let mut input = [0.0; PERCEPTION_LEN];
        input[0] = 1.0;
        let first = policy.decide(&input).expect("decide")[0];
        policy.receive_reward(100.0);
        // With zero exploration the reinforced action keeps winning.
        let second = policy.decide(&input).expect("decide")[0];
        assert_eq!(first, second);
        assert!(policy.score(first as usize, &input) > 0.0);
    }

    #[test]
    fn negative_reward_discourages_the_chosen_action() {
        let mut policy = bound_policy(4);
        let mut input = [0.0; PERCEPTION_LEN];
        input[1] = 1.0;
        let first = policy.decide(&input).expect("decide")[0];
        policy.receive_reward(-100.0);
        assert!(policy.score(first as usize, &input) < 0.0);
    }

    #[test]
    fn zero_reward_leaves_weights_untouched() {
        let mut policy = bound_policy(5);
        let input = [0.5; PERCEPTION_LEN];
        policy.decide(&input).expect("decide");
        policy.receive_reward(0.0);
        assert!(policy.weights.iter().all(|w| *w == 0.0));
    }

    #[test]
    fn blob_round_trip_preserves_weights() {
        let mut policy = bound_policy(6);
        let mut input = [0.0; PERCEPTION_LEN];
        input[2] = 1.0;
        policy.decide(&input).expect("decide");
        policy.receive_reward(50.0);
        let blob = policy.export_blob().expect("export");
        let restored =
            ValuePolicy::from_blob(&blob, SmallRng::seed_from_u64(6)).expect("import");
        assert_eq!(restored.weights, policy.weights);
    }

    #[test]
    fn malformed_blob_is_rejected() {
        assert!(matches!(
            ValuePolicy::from_blob(&[1, 2, 3], SmallRng::seed_from_u64(1)),
            Err(PolicyBlobError::Decode(_))
        ));
    }
}
