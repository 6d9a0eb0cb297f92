//! Basic demonstration of the Horde simulation kernel.
//!
//! Runs a handful of environments with a scripted "walk to the target"
//! controller standing in for a learned policy.
//!
//! Run with: RUST_LOG=horde_sim=debug cargo run --example basic_demo

use glam::Vec3;
use horde_sim::episode::EpisodeTracker;
use horde_sim::observation::{self, ObservationLayout};
use horde_sim::spatial::ALL_LAYERS;
use horde_sim::{GlobalConfig, SimWorld, StaticScene};

const ENVIRONMENTS: usize = 4;
const STEPS: usize = 600;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    println!("=== Horde - Squad Kernel Demo ===\n");

    let config = GlobalConfig {
        members_per_squad: 4,
        ..Default::default()
    };
    let layout = ObservationLayout::from_config(&config);

    // Flat ground with a low wall in every environment.
    let mut scene = StaticScene::default().with_ground(0.0, ALL_LAYERS);
    for center in horde_sim::layout::spiral_centers(ENVIRONMENTS, 60.0) {
        scene = scene.with_box(center + Vec3::new(0.0, 1.0, 6.0), Vec3::new(4.0, 1.0, 0.5), ALL_LAYERS);
    }

    let mut sim = SimWorld::with_environments(config, ENVIRONMENTS, 60.0).with_spatial_query(scene);
    sim.tick();

    let ids = sim.environment_ids();
    let mut trackers: Vec<EpisodeTracker> = ids.iter().map(|_| EpisodeTracker::new(400)).collect();
    for (tracker, &env_id) in trackers.iter_mut().zip(&ids) {
        if let Some(mut env) = sim.environment(env_id) {
            tracker.start(&mut env);
        }
    }

    println!(
        "{} environments, observation size {}, action size {}\n",
        ids.len(),
        layout.observation_size(),
        layout.action_size()
    );

    let mut obs = Vec::with_capacity(layout.observation_size());
    let mut actions = vec![0.0; layout.action_size()];

    for step in 0..STEPS {
        for (tracker, &env_id) in trackers.iter_mut().zip(&ids) {
            let Some(mut env) = sim.environment(env_id) else {
                continue;
            };

            observation::collect(&mut env, &layout, &mut obs);

            // Head straight for the target using the relative-position block.
            for i in 0..layout.members {
                let base = i * layout.per_member();
                let to_target = Vec3::new(obs[base], 0.0, obs[base + 2]).normalize_or_zero();
                actions[2 * i] = to_target.x;
                actions[2 * i + 1] = to_target.z;
            }
            observation::apply_actions(&mut env, &actions);

            let result = tracker.step(&env);
            if result.outcome.is_terminal() {
                println!(
                    "  step {:>4} env {}: {:?} after {} steps, return {:.3}",
                    step,
                    env_id,
                    result.outcome,
                    tracker.steps(),
                    tracker.total_reward()
                );
                tracker.start(&mut env);
            }
        }
        sim.tick();
    }

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty().unwrap_or_default());
}
