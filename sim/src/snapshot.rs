//! Serializable view of the kernel state.
//!
//! The `Snapshot` struct is a read-only dump of every environment, meant for
//! debugging tools and recorded runs rather than the controller hot path.

use crate::components::*;
use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of a single squad member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub slot: u32,
    pub squad_id: i32,
    pub position: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub move_vector: Vec3,
    pub move_speed: f32,
    /// Normalized ray readings in buffer order.
    pub rays: Vec<f32>,
}

/// Snapshot of one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub env_id: i32,
    pub center: Vec3,
    pub initialized: bool,
    /// Resets performed on this environment.
    pub episode: u64,
    pub target: Option<Vec3>,
    pub members: Vec<MemberSnapshot>,
}

impl EnvironmentSnapshot {
    fn empty(env_id: i32, center: Vec3, initialized: bool) -> Self {
        Self {
            env_id,
            center,
            initialized,
            episode: 0,
            target: None,
            members: Vec::new(),
        }
    }
}

/// Complete kernel state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    /// Environments ordered by id.
    pub environments: Vec<EnvironmentSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut environments: BTreeMap<i32, EnvironmentSnapshot> = BTreeMap::new();

        let mut env_query = world.query::<&EnvironmentTag>();
        for env in env_query.iter(world) {
            environments.insert(env.env_id, EnvironmentSnapshot::empty(env.env_id, env.center, env.initialized));
        }

        let mut target_query = world.query::<(&TargetTag, &Transform)>();
        for (tag, transform) in target_query.iter(world) {
            let entry = environments
                .entry(tag.env_id)
                .or_insert_with(|| EnvironmentSnapshot::empty(tag.env_id, Vec3::ZERO, false));
            if entry.target.is_none() {
                entry.target = Some(transform.position);
            }
        }

        let mut member_query = world.query::<(
            &SquadMember,
            &Transform,
            Option<&PhysicsVelocity>,
            Option<&AgentCommand>,
            Option<&RayBuffer>,
        )>();
        for (member, transform, velocity, command, rays) in member_query.iter(world) {
            let velocity = velocity.copied().unwrap_or_default();
            let command = command.copied().unwrap_or_default();

            environments
                .entry(member.env_id)
                .or_insert_with(|| EnvironmentSnapshot::empty(member.env_id, Vec3::ZERO, false))
                .members
                .push(MemberSnapshot {
                    slot: member.slot,
                    squad_id: member.squad_id,
                    position: transform.position,
                    linear_velocity: velocity.linear,
                    angular_velocity: velocity.angular,
                    move_vector: command.move_vector,
                    move_speed: command.move_speed,
                    rays: rays
                        .map(|b| b.as_slice().iter().map(|r| r.distance_normalized).collect())
                        .unwrap_or_default(),
                });
        }

        let mut environments: Vec<_> = environments.into_values().collect();
        for env in &mut environments {
            env.members.sort_by_key(|m| m.slot);
        }

        Self {
            tick,
            time,
            environments,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn environment(&self, env_id: i32) -> Option<&EnvironmentSnapshot> {
        self.environments.iter().find(|e| e.env_id == env_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let mut world = World::new();
        let snapshot = Snapshot::from_world(&mut world, 3, 0.06);
        assert_eq!(snapshot.tick, 3);
        assert!(snapshot.environments.is_empty());
    }

    #[test]
    fn test_groups_entities_by_environment() {
        let mut world = World::new();
        world.spawn(EnvironmentBundle::new(1, Vec3::new(60.0, 0.0, 0.0)));
        world.spawn(EnvironmentBundle::new(0, Vec3::ZERO));
        world.spawn(TargetBundle {
            tag: TargetTag { env_id: 1 },
            transform: Transform::from_position(Vec3::new(75.0, 0.5, 0.0)),
            label: Label("target".into()),
        });
        for slot in [1, 0] {
            world.spawn(MemberBundle {
                member: SquadMember { squad_id: 0, env_id: 1, slot },
                rays: DynamicBuffer(vec![RaycastResult { distance_normalized: 0.25 }; 2]),
                ..Default::default()
            });
        }

        let snapshot = Snapshot::from_world(&mut world, 0, 0.0);
        assert_eq!(snapshot.environments.len(), 2);
        assert_eq!(snapshot.environments[0].env_id, 0);
        assert!(snapshot.environments[0].members.is_empty());

        let env = snapshot.environment(1).unwrap();
        assert_eq!(env.target, Some(Vec3::new(75.0, 0.5, 0.0)));
        assert_eq!(env.members.iter().map(|m| m.slot).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(env.members[0].rays, vec![0.25, 0.25]);
    }

    #[test]
    fn test_json_output() {
        let mut world = World::new();
        world.spawn(EnvironmentBundle::new(4, Vec3::ZERO));
        let snapshot = Snapshot::from_world(&mut world, 1, 0.02);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"env_id\":4"));
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.environments.len(), 1);
        assert!(snapshot.to_json_pretty().unwrap().contains('\n'));
    }
}
