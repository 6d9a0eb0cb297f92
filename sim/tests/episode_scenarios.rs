//! End-to-end controller scenarios against a full kernel.

use glam::Vec3;
use horde_sim::episode::{EpisodeOutcome, EpisodeTracker};
use horde_sim::observation::{self, ObservationLayout};
use horde_sim::spatial::ALL_LAYERS;
use horde_sim::{GlobalConfig, KernelSettings, SimWorld, StaticScene, Transform};

fn squad_config(members: u32) -> GlobalConfig {
    GlobalConfig {
        members_per_squad: members,
        spawn_radius: 5.0,
        ray_count: 5,
        angle_degrees: 120.0,
        vertical_ray_count: 3,
        vertical_angle_degrees: 45.0,
        ray_length: 20.0,
        ..Default::default()
    }
}

fn kernel(config: GlobalConfig, environments: usize, integrate: bool) -> SimWorld {
    let settings = KernelSettings {
        integrate_kinematics: integrate,
        ..Default::default()
    };
    let mut sim = SimWorld::with_settings(config, settings)
        .with_spatial_query(StaticScene::default().with_ground(0.0, ALL_LAYERS));
    for (env_id, center) in horde_sim::layout::spiral_centers(environments, 60.0).into_iter().enumerate() {
        sim.add_environment(env_id as i32, center);
    }
    sim.tick();
    sim
}

fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, 0.0, a.z - b.z).length()
}

#[test]
fn four_member_squad_spawns_with_full_ray_buffers() {
    let mut sim = kernel(squad_config(4), 1, true);
    let mut env = sim.environment(0).unwrap();

    assert!(env.is_ready());
    assert_eq!(env.member_count(), 4);
    assert_eq!(env.all_sensor_readings().len(), 4 * 15);
    assert!(env.all_sensor_readings().iter().all(|r| (0.0..=1.0).contains(r)));

    let target = env.target_position();
    assert!((horizontal_distance(target, env.center()) - 15.0).abs() < 1e-3);
    assert!((target.y - 0.5).abs() < 1e-4);
}

#[test]
fn set_command_drives_velocity_next_tick() {
    let mut sim = kernel(squad_config(4), 1, false);

    sim.environment(0).unwrap().set_command(2, Vec3::new(1.0, 0.0, 0.0));
    sim.tick();

    let env = sim.environment(0).unwrap();
    let state = env.member_state(2);
    assert_eq!(state.linear_velocity.x, 8.0);
    assert_eq!(state.linear_velocity.z, 0.0);
    assert_eq!(state.angular_velocity.x, 0.0);
    assert_eq!(state.angular_velocity.z, -16.0);

    // Other members are untouched.
    assert_eq!(env.member_state(0).linear_velocity, Vec3::ZERO);
}

#[test]
fn reset_restores_formation_without_respawning() {
    let mut sim = kernel(squad_config(4), 1, true);

    {
        let mut env = sim.environment(0).unwrap();
        for i in 0..4 {
            env.set_command(i, Vec3::new(0.3, 0.0, -0.8));
        }
    }
    for _ in 0..20 {
        sim.tick();
    }

    let before = sim.store().entity_count();
    let mut env = sim.environment(0).unwrap();
    env.reset_episode();
    env.reset_episode();
    let center = env.center();

    let positions: Vec<Vec3> = (0..4).map(|i| env.member_state(i).position).collect();
    for i in 0..4 {
        let state = env.member_state(i);
        assert_eq!(state.linear_velocity, Vec3::ZERO);
        assert_eq!(state.angular_velocity, Vec3::ZERO);
        assert!((horizontal_distance(state.position, center) - 2.0).abs() < 1e-4);

        // Evenly spaced: neighbours on a square of circumradius 2.
        let next = positions[(i + 1) % 4];
        assert!((horizontal_distance(state.position, next) - 8f32.sqrt()).abs() < 1e-4);
    }
    assert!((horizontal_distance(env.target_position(), center) - 15.0).abs() < 1e-3);
    drop(env);

    assert_eq!(sim.store().entity_count(), before);
}

#[test]
fn spawner_never_fires_twice() {
    let mut sim = kernel(squad_config(3), 2, true);
    let count = sim.store().entity_count();
    // Two environment markers, two targets, six members.
    assert_eq!(count, 10);

    for _ in 0..30 {
        sim.tick();
    }
    assert_eq!(sim.store().entity_count(), count);
}

#[test]
fn fallen_member_fails_episode_and_bridge_stays_queryable() {
    let mut sim = kernel(squad_config(2), 1, false);

    let mut tracker = EpisodeTracker::default();
    tracker.start(&mut sim.environment(0).unwrap());

    let member = sim.environment(0).unwrap().members()[1];
    sim.store_mut().get_mut::<Transform>(member).unwrap().position.y = -3.0;

    let mut env = sim.environment(0).unwrap();
    let result = tracker.step(&env);
    assert_eq!(result.outcome, EpisodeOutcome::Failure);
    assert_eq!(result.fallen, 1);

    assert!(env.is_ready());
    assert_eq!(env.member_state(1).position.y, -3.0);
    assert_eq!(env.all_sensor_readings().len(), 2 * 15);

    tracker.start(&mut env);
    assert!((env.member_state(1).position.y - 0.5).abs() < 1e-4);
}

#[test]
fn walking_to_target_succeeds() {
    let mut sim = kernel(squad_config(1), 1, true);
    let layout = ObservationLayout::from_config(sim.config().unwrap());

    let mut tracker = EpisodeTracker::default();
    tracker.start(&mut sim.environment(0).unwrap());

    let mut obs = Vec::new();
    let mut outcome = EpisodeOutcome::Running;
    for _ in 0..400 {
        {
            let mut env = sim.environment(0).unwrap();
            observation::collect(&mut env, &layout, &mut obs);
            let dir = Vec3::new(obs[0], 0.0, obs[2]).normalize_or_zero();
            observation::apply_actions(&mut env, &[dir.x, dir.z]);
        }
        sim.tick();

        let result = tracker.step(&sim.environment(0).unwrap());
        if result.outcome.is_terminal() {
            outcome = result.outcome;
            break;
        }
    }

    assert_eq!(outcome, EpisodeOutcome::Success);
    assert!(tracker.total_reward() > 0.0);
}

#[test]
fn environments_are_isolated() {
    let mut sim = kernel(squad_config(2), 3, true);

    sim.environment(1).unwrap().set_command(0, Vec3::Z);
    sim.environment(1).unwrap().reset_episode();
    sim.tick();

    for env_id in [0, 2] {
        let env = sim.environment(env_id).unwrap();
        assert_eq!(env.episode(), 0);
        for i in 0..2 {
            assert_eq!(env.member_state(i).linear_velocity, Vec3::ZERO);
            assert!((horizontal_distance(env.member_state(i).position, env.center()) - 2.0).abs() < 1e-4);
        }
    }

    let env = sim.environment(1).unwrap();
    assert_eq!(env.episode(), 1);
    assert_eq!(env.member_state(0).linear_velocity.z, 8.0);
}

#[test]
fn same_seed_same_episode_layout() {
    let mut a = kernel(squad_config(2), 4, true);
    let mut b = kernel(squad_config(2), 4, true);

    for env_id in 0..4 {
        let mut ea = a.environment(env_id).unwrap();
        let mut eb = b.environment(env_id).unwrap();
        assert_eq!(ea.target_position(), eb.target_position());
        assert_eq!(ea.all_sensor_readings(), eb.all_sensor_readings());

        ea.reset_episode();
        eb.reset_episode();
        assert_eq!(ea.target_position(), eb.target_position());
    }
}

#[test]
fn observation_vector_layout() {
    let mut sim = kernel(squad_config(2), 1, true);
    let layout = ObservationLayout::from_config(sim.config().unwrap());
    let mut env = sim.environment(0).unwrap();

    let mut obs = Vec::new();
    observation::collect(&mut env, &layout, &mut obs);
    assert_eq!(obs.len(), layout.observation_size());

    let target = env.target_position();
    for i in 0..2 {
        let base = i * layout.per_member();
        let to_target = target - env.member_state(i).position;
        assert_eq!(&obs[base..base + 3], &to_target.to_array());
        assert_eq!(&obs[base + 3..base + 6], &[0.0, 0.0, 0.0]);
    }
    let readings = env.all_sensor_readings().to_vec();
    assert_eq!(&obs[6..21], &readings[..15]);

    // Short action vectors only command complete pairs.
    assert_eq!(observation::apply_actions(&mut env, &[1.0, 0.0, 0.5]), 1);
}

#[test]
fn destroyed_target_makes_environment_unready() {
    let mut sim = kernel(squad_config(2), 1, true);

    let target = sim.environment(0).unwrap().target().unwrap();
    sim.store_mut().destroy(target).unwrap();

    let mut env = sim.environment(0).unwrap();
    assert!(!env.is_ready());
    assert!(env.all_sensor_readings().is_empty());
    assert_eq!(env.member_state(0).position, Vec3::ZERO);
    env.set_command(0, Vec3::X);
    env.reset_episode();
    assert_eq!(env.episode(), 0);

    let layout = ObservationLayout::new(2, 15);
    let mut obs = Vec::new();
    observation::collect(&mut env, &layout, &mut obs);
    assert!(obs.iter().all(|v| *v == 0.0));
}
