//! Spawner system - initializes environments with a target and a squad.

use crate::components::*;
use crate::config::GlobalConfig;
use crate::placement;
use crate::spatial::SpatialQueryService;
use bevy_ecs::prelude::*;
use tracing::{debug, trace};

/// System that populates every uninitialized environment.
///
/// Entity creation is recorded in `Commands` and only becomes visible after
/// the next `apply_deferred` barrier, so later systems never see a partially
/// built member.
///
/// ## Data Access
/// - Reads: GlobalConfig, SpatialQueryService
/// - Writes: EnvironmentTag
/// - Spawns: one target and `members_per_squad` members per environment
pub fn spawner_system(
    mut commands: Commands,
    config: Option<Res<GlobalConfig>>,
    spatial: Option<Res<SpatialQueryService>>,
    mut environments: Query<&mut EnvironmentTag>,
) {
    let (Some(config), Some(spatial)) = (config, spatial) else {
        trace!("spawner waiting for config and spatial query service");
        return;
    };
    let spatial = Some(spatial.0.as_ref());

    for mut env in environments.iter_mut() {
        if env.initialized {
            continue;
        }
        // Mark before spawning so a retried tick can never double-spawn.
        env.initialized = true;

        let env_id = env.env_id;
        let center = env.center;
        let mut rng = placement::episode_rng(config.seed, env_id, 0);

        let target_pos = placement::target_position(&mut rng, center, config.target_distance(), spatial);
        commands.spawn(TargetBundle {
            tag: TargetTag { env_id },
            transform: Transform::from_position(target_pos)
                .with_rotation(config.target_template.rotation),
            label: Label(config.target_template.label.clone()),
        });

        let count = config.members_per_squad as usize;
        let sensor = config.sensor_config();
        for slot in 0..count {
            let position = placement::formation_position(center, slot, count, spatial);
            commands.spawn(MemberBundle {
                member: SquadMember {
                    squad_id: 0,
                    env_id,
                    slot: slot as u32,
                },
                transform: Transform::from_position(position)
                    .with_rotation(config.member_template.rotation),
                velocity: PhysicsVelocity::zero(),
                command: AgentCommand::idle(config.move_speed),
                sensor,
                rays: RayBuffer::default(),
                label: Label(config.member_template.label.clone()),
            });
        }

        debug!(env_id, members = count, target = ?target_pos, "environment initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{StaticScene, ALL_LAYERS};
    use glam::Vec3;

    fn world_with(config: Option<GlobalConfig>, scene: Option<StaticScene>) -> World {
        let mut world = World::new();
        if let Some(config) = config {
            world.insert_resource(config);
        }
        if let Some(scene) = scene {
            world.insert_resource(SpatialQueryService::new(scene));
        }
        world
    }

    fn run_spawner(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(spawner_system);
        schedule.run(world);
    }

    #[test]
    fn test_spawns_target_and_squad() {
        let config = GlobalConfig {
            members_per_squad: 4,
            ..Default::default()
        };
        let mut world = world_with(Some(config), Some(StaticScene::default().with_ground(1.0, ALL_LAYERS)));
        world.spawn(EnvironmentBundle::new(7, Vec3::new(10.0, 0.0, 10.0)));

        run_spawner(&mut world);

        let mut members = world.query::<(&SquadMember, &Transform, &AgentCommand)>();
        assert_eq!(members.iter(&world).count(), 4);
        for (member, transform, command) in members.iter(&world) {
            assert_eq!(member.env_id, 7);
            assert!((transform.position.y - 1.5).abs() < 1e-4);
            assert_eq!(command.move_vector, Vec3::ZERO);
            assert_eq!(command.move_speed, 8.0);
        }

        let mut targets = world.query::<&TargetTag>();
        assert_eq!(targets.iter(&world).count(), 1);

        let mut envs = world.query::<&EnvironmentTag>();
        assert!(envs.single(&world).initialized);
    }

    #[test]
    fn test_never_respawns_initialized_environment() {
        let mut world = world_with(Some(GlobalConfig::default()), Some(StaticScene::default()));
        world.spawn(EnvironmentBundle::new(0, Vec3::ZERO));

        for _ in 0..5 {
            run_spawner(&mut world);
        }

        let mut members = world.query::<&SquadMember>();
        assert_eq!(members.iter(&world).count(), 1);
        let mut targets = world.query::<&TargetTag>();
        assert_eq!(targets.iter(&world).count(), 1);
    }

    #[test]
    fn test_waits_for_spatial_service() {
        let mut world = world_with(Some(GlobalConfig::default()), None);
        world.spawn(EnvironmentBundle::new(0, Vec3::ZERO));

        run_spawner(&mut world);
        let mut envs = world.query::<&EnvironmentTag>();
        assert!(!envs.single(&world).initialized);

        world.insert_resource(SpatialQueryService::new(StaticScene::default()));
        run_spawner(&mut world);
        assert!(envs.single(&world).initialized);
    }

    #[test]
    fn test_waits_for_config() {
        let mut world = world_with(None, Some(StaticScene::default()));
        world.spawn(EnvironmentBundle::new(0, Vec3::ZERO));

        run_spawner(&mut world);

        let mut envs = world.query::<&EnvironmentTag>();
        assert!(!envs.single(&world).initialized);
        let mut members = world.query::<&SquadMember>();
        assert_eq!(members.iter(&world).count(), 0);
    }
}
