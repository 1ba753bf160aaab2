//! Headless runner: builds a seeded world, populates it with wandering and
//! learning creatures plus scattered food, and steps it for a fixed number
//! of ticks while logging progress.

use anyhow::{Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use tracing::info;

use slink_core::{Simulation, SlinkConfig};
use slink_physics::Vec2;
use slink_policy::{register_defaults, scripted, value};

#[derive(Debug, Parser)]
#[command(name = "slink", about = "Segmented-creature simulation, headless")]
struct Args {
    /// RNG seed for a reproducible run.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Ticks to simulate.
    #[arg(long, default_value_t = 10_000)]
    ticks: u64,

    /// Scripted wanderers to spawn.
    #[arg(long, default_value_t = 8)]
    wanderers: usize,

    /// Learning agents to spawn.
    #[arg(long, default_value_t = 2)]
    learners: usize,

    /// Food particles scattered at startup.
    #[arg(long, default_value_t = 200)]
    food: usize,

    /// Side length of the square arena.
    #[arg(long, default_value_t = 2_000.0)]
    arena: f32,

    /// Log a progress line every this many ticks.
    #[arg(long, default_value_t = 1_000)]
    report_every: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SlinkConfig {
        rng_seed: Some(args.seed),
        ..SlinkConfig::default()
    };
    let mut sim = Simulation::new(config).context("configuration rejected")?;
    register_defaults(sim.registry_mut());

    populate(&mut sim, &args).context("world population failed")?;
    info!(
        seed = args.seed,
        wanderers = args.wanderers,
        learners = args.learners,
        food = args.food,
        "world ready"
    );

    let mut food_eaten = 0u64;
    let mut mate_attempts = 0u64;
    for _ in 0..args.ticks {
        let events = sim.step().context("tick failed")?;
        food_eaten += u64::from(events.food_consumed);
        mate_attempts += events.mate_requests.len() as u64;
        if args.report_every > 0 && events.tick.0 % args.report_every == 0 && events.tick.0 > 0 {
            info!(
                tick = events.tick.0,
                food_eaten,
                mate_attempts,
                agents = sim.agents().count(),
                "progress"
            );
        }
    }

    info!(
        ticks = args.ticks,
        food_eaten, mate_attempts, "run complete"
    );
    Ok(())
}

/// Spawn the requested population, spread across the arena. Placement uses
/// its own seeded RNG so runs with the same seed lay out the same world.
fn populate(sim: &mut Simulation, args: &Args) -> Result<()> {
    let half = args.arena / 2.0;
    let mut rng = SmallRng::seed_from_u64(args.seed);

    // Arena walls.
    let thickness = 40.0;
    sim.spawn_wall(Vec2::new(0.0, half), args.arena, thickness);
    sim.spawn_wall(Vec2::new(0.0, -half), args.arena, thickness);
    sim.spawn_wall(Vec2::new(half, 0.0), thickness, args.arena);
    sim.spawn_wall(Vec2::new(-half, 0.0), thickness, args.arena);

    let margin = half - 100.0;
    let mut scatter = |rng: &mut SmallRng| {
        Vec2::new(
            rng.random_range(-margin..margin),
            rng.random_range(-margin..margin),
        )
    };

    for i in 0..args.wanderers {
        let position = scatter(&mut rng);
        let id = sim.spawn_agent(format!("wanderer-{i}"), position)?;
        sim.bind_from_registry(id, scripted::KIND)?;
    }
    for i in 0..args.learners {
        let position = scatter(&mut rng);
        let id = sim.spawn_agent(format!("learner-{i}"), position)?;
        sim.bind_from_registry(id, value::KIND)?;
    }
    for _ in 0..args.food {
        let position = scatter(&mut rng);
        let size = rng.random_range(10.0..60.0);
        sim.spawn_food(position, size);
    }
    Ok(())
}
