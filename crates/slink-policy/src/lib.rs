//! Built-in decision policies.
//!
//! Three implementations of the core's [`Policy`] seam: a linear value
//! learner that adjusts action weights from the reward signal, a scripted
//! wanderer useful for populating worlds and tests, and an operator queue
//! that turns timestamped human input into actions.

pub mod operator;
pub mod scripted;
pub mod value;

pub use operator::OperatorPolicy;
pub use scripted::ScriptedPolicy;
pub use value::{PolicyBlobError, ValuePolicy};

use rand::{RngCore, SeedableRng, rngs::SmallRng};
use slink_core::PolicyRegistry;

/// Register every built-in policy kind on a registry.
pub fn register_defaults(registry: &mut PolicyRegistry) {
    registry.register(value::KIND, |rng| {
        Box::new(ValuePolicy::new(SmallRng::seed_from_u64(rng.next_u64())))
    });
    registry.register(scripted::KIND, |rng| {
        Box::new(ScriptedPolicy::new(SmallRng::seed_from_u64(rng.next_u64())))
    });
}
