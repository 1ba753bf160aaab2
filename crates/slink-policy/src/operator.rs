//! Operator input queue.
//!
//! Bridges asynchronous human input to the synchronous tick loop. Inputs
//! arrive as raw timestamped action identifiers; at decide time the queue
//! discards anything older than the staleness window before consuming, so a
//! laggy connection can never replay minutes-old commands. An identifier
//! that decodes to no action is a fatal protocol error, not a skip.

use std::collections::VecDeque;

use smallvec::SmallVec;

use slink_core::{Action, AgentId, Decision, PERCEPTION_LEN, Policy, PolicyError};

/// Registry kind. Not registered by default; operator policies carry a
/// clock and must be constructed explicitly.
pub const KIND: &str = "operator";

/// Inputs held at most this long before the queue starts dropping oldest.
const QUEUE_CAPACITY: usize = 64;

/// Actions consumed per tick.
const ACTIONS_PER_TICK: usize = 4;

#[derive(Debug, Clone, Copy)]
struct QueuedInput {
    action: u8,
    timestamp_ms: u64,
}

type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

/// A policy driven by an external operator.
pub struct OperatorPolicy {
    owner: Option<AgentId>,
    queue: VecDeque<QueuedInput>,
    staleness_ms: u64,
    clock: Clock,
}

impl OperatorPolicy {
    /// Build a queue with a wall-clock time source.
    #[must_use]
    pub fn new(staleness_ms: u64) -> Self {
        Self::with_clock(
            staleness_ms,
            Box::new(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0)
            }),
        )
    }

    /// Build a queue with an injected time source.
    #[must_use]
    pub fn with_clock(staleness_ms: u64, clock: Clock) -> Self {
        Self {
            owner: None,
            queue: VecDeque::new(),
            staleness_ms,
            clock,
        }
    }

    /// Enqueue one raw input. Oldest entries are dropped once the queue is
    /// full; validity of the identifier is checked at decide time.
    pub fn push_input(&mut self, action: u8, timestamp_ms: u64) {
        if self.queue.len() == QUEUE_CAPACITY {
            self.queue.pop_front();
        }
        self.queue.push_back(QueuedInput {
            action,
            timestamp_ms,
        });
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Policy for OperatorPolicy {
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
        let now = (self.clock)();
        // Stale entries are dropped before anything is consumed.
        while let Some(front) = self.queue.front() {
            if now.saturating_sub(front.timestamp_ms) > self.staleness_ms {
                self.queue.pop_front();
            } else {
                break;
            }
        }
        let mut decision: Decision = SmallVec::new();
        while decision.len() < ACTIONS_PER_TICK {
            let Some(input) = self.queue.pop_front() else {
                break;
            };
            decision.push(Action::try_from(input.action)?);
        }
        Ok(decision)
    }

    fn receive_reward(&mut self, _reward: f32) {}

    fn is_interactive(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use slink_core::ActionError;
    use slotmap::KeyData;

    fn bound_with_clock(staleness_ms: u64) -> (OperatorPolicy, Arc<AtomicU64>) {
        let now = Arc::new(AtomicU64::new(0));
        let clock_now = Arc::clone(&now);
        let mut policy = OperatorPolicy::with_clock(
            staleness_ms,
            Box::new(move || clock_now.load(Ordering::Relaxed)),
        );
        policy.bind(AgentId::from(KeyData::from_ffi(1)));
        (policy, now)
    }

    #[test]
    fn fresh_inputs_are_consumed_in_order() {
        let (mut policy, now) = bound_with_clock(20);
        policy.push_input(Action::Forward as u8, 0);
        policy.push_input(Action::Left as u8, 1);
        now.store(5, Ordering::Relaxed);
        let input = [0.0; PERCEPTION_LEN];
        let decision = policy.decide(&input).expect("decide");
        assert_eq!(decision.as_slice(), [Action::Forward, Action::Left]);
        assert_eq!(policy.pending(), 0);
    }

    #[test]
    fn stale_inputs_are_discarded_before_consumption() {
        let (mut policy, now) = bound_with_clock(20);
        policy.push_input(Action::Forward as u8, 0);
        now.store(21, Ordering::Relaxed);
        let input = [0.0; PERCEPTION_LEN];
        let decision = policy.decide(&input).expect("decide");
        assert!(decision.is_empty());
        assert_eq!(policy.pending(), 0);
    }

    #[test]
    fn input_at_the_window_edge_still_counts() {
        let (mut policy, now) = bound_with_clock(20);
        policy.push_input(Action::Chirp as u8, 0);
        now.store(20, Ordering::Relaxed);
        let input = [0.0; PERCEPTION_LEN];
        let decision = policy.decide(&input).expect("decide");
        assert_eq!(decision.as_slice(), [Action::Chirp]);
    }

    #[test]
    fn unknown_identifier_is_fatal() {
        let (mut policy, _now) = bound_with_clock(20);
        policy.push_input(200, 0);
        let input = [0.0; PERCEPTION_LEN];
        assert!(matches!(
            policy.decide(&input),
            Err(PolicyError::InvalidAction(ActionError::UnknownAction(200)))
        ));
    }

    #[test]
    fn queue_drops_oldest_past_capacity() {
        let (mut policy, _now) = bound_with_clock(1_000);
        for i in 0..(QUEUE_CAPACITY + 5) {
            policy.push_input(Action::Forward as u8, i as u64);
        }
        assert_eq!(policy.pending(), QUEUE_CAPACITY);
    }

    #[test]
    fn consumption_is_bounded_per_tick() {
        let (mut policy, _now) = bound_with_clock(1_000);
        for _ in 0..10 {
            policy.push_input(Action::Forward as u8, 0);
        }
        let input = [0.0; PERCEPTION_LEN];
        let decision = policy.decide(&input).expect("decide");
        assert_eq!(decision.len(), ACTIONS_PER_TICK);
        assert_eq!(policy.pending(), 10 - ACTIONS_PER_TICK);
    }
}
