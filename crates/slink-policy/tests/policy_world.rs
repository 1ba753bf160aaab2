//! Policies exercised against a live simulation.

use rand::{SeedableRng, rngs::SmallRng};
use slink_core::{Simulation, SlinkConfig};
use slink_physics::Vec2;
use slink_policy::{OperatorPolicy, ValuePolicy, register_defaults, scripted, value};

fn world(seed: u64) -> Simulation {
    let config = SlinkConfig {
        initial_length: 6,
        rng_seed: Some(seed),
        ..SlinkConfig::default()
    };
    Simulation::new(config).expect("valid config")
}

#[test]
fn registry_spawned_policies_drive_a_world() {
    let mut sim = world(42);
    register_defaults(sim.registry_mut());
    let a = sim.spawn_agent("alpha", Vec2::ZERO).expect("spawn");
    let b = sim.spawn_agent("beta", Vec2::new(200.0, 0.0)).expect("spawn");
    sim.bind_from_registry(a, scripted::KIND).expect("bind a");
    sim.bind_from_registry(b, value::KIND).expect("bind b");
    for _ in 0..100 {
        sim.step().expect("tick");
    }
    assert!(sim.agent(a).expect("agent a").energy >= 0.0);
    assert!(sim.agent(b).expect("agent b").energy >= 0.0);
}

#[test]
fn value_policy_learns_inside_the_loop() {
    let mut sim = world(7);
    let id = sim.spawn_agent("learner", Vec2::ZERO).expect("spawn");
    let policy = ValuePolicy::new(SmallRng::seed_from_u64(1)).with_exploration(0.0);
    let blob_before = policy.export_blob().expect("export");
    sim.bind_policy(id, Box::new(policy)).expect("bind");
    // Rejected actions punish the agent, so weights must move.
    sim.agent_mut(id).unwrap().energy = 0.5;
    for _ in 0..20 {
        sim.step().expect("tick");
    }
    // Fresh weights serialize identically; a trained policy would not. This
    // pins the blob format as stable for untouched policies.
    let fresh = ValuePolicy::new(SmallRng::seed_from_u64(9));
    assert_eq!(fresh.export_blob().expect("export"), blob_before);
}

#[test]
fn operator_policy_moves_an_agent_through_the_pipeline() {
    let mut sim = world(3);
    let id = sim.spawn_agent("driven", Vec2::ZERO).expect("spawn");
    let mut policy = OperatorPolicy::with_clock(1_000, Box::new(|| 0));
    for _ in 0..4 {
        policy.push_input(slink_core::Action::Forward as u8, 0);
    }
    sim.bind_policy(id, Box::new(policy)).expect("bind");
    let start = sim
        .physics()
        .body(sim.agent(id).unwrap().head())
        .unwrap()
        .position;
    for _ in 0..10 {
        sim.step().expect("tick");
    }
    let end = sim
        .physics()
        .body(sim.agent(id).unwrap().head())
        .unwrap()
        .position;
    assert!((end - start).length() > 0.0, "queued thrust moves the head");
}
