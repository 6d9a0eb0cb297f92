//! Per-environment facade for an external learning controller.
//!
//! A bridge never owns entities. It caches the handles of its environment's
//! members and target, found by matching `env_id`, and re-checks liveness
//! before every access. Bridges of different environments never touch each
//! other's entities; `env_id` filtering is the only isolation.

use crate::components::*;
use crate::config::GlobalConfig;
use crate::placement;
use crate::spatial::{SpatialQuery, SpatialQueryService};
use crate::store::EntityStore;
use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use tracing::{debug, warn};

/// Kinematic state of one squad member as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for MemberState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// Cached view of one environment's entities.
#[derive(Debug, Clone)]
pub struct EnvironmentBridge {
    env_id: i32,
    center: Vec3,
    /// Ordered by formation slot.
    members: Vec<Entity>,
    target: Option<Entity>,
    target_position: Vec3,
    sensor_cache: Vec<f32>,
    episode: u64,
}

impl EnvironmentBridge {
    pub fn new(env_id: i32, center: Vec3) -> Self {
        Self {
            env_id,
            center,
            members: Vec::new(),
            target: None,
            target_position: Vec3::ZERO,
            sensor_cache: Vec::new(),
            episode: 0,
        }
    }

    pub fn env_id(&self) -> i32 {
        self.env_id
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Number of resets performed so far.
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Cached member handles in formation order.
    pub fn members(&self) -> &[Entity] {
        &self.members
    }

    pub fn target(&self) -> Option<Entity> {
        self.target
    }

    /// Per-tick refresh.
    ///
    /// Resolves the cache when it is empty. Otherwise re-validates every
    /// cached handle and rescans if any went stale, then refreshes the target
    /// position from the live target.
    pub fn sync(&mut self, store: &mut EntityStore) {
        if self.members.is_empty() {
            self.resolve(store);
            return;
        }

        let stale = self.members.iter().any(|&e| !store.is_alive(e))
            || self.target.map_or(true, |t| !store.is_alive(t));
        if stale {
            debug!(env_id = self.env_id, "cached entities went stale, rescanning");
            self.resolve(store);
        }

        if let Some(target) = self.target {
            if let Ok(transform) = store.get::<Transform>(target) {
                self.target_position = transform.position;
            }
        }
    }

    /// Rebuild the cache by scanning the store for this environment's entities.
    fn resolve(&mut self, store: &mut EntityStore) {
        self.members.clear();
        self.target = None;

        let mut found: Vec<(u32, Entity)> = store
            .matching::<(With<SquadMember>, With<Transform>)>()
            .into_iter()
            .filter_map(|e| {
                let member = store.get::<SquadMember>(e).ok()?;
                (member.env_id == self.env_id).then_some((member.slot, e))
            })
            .collect();
        found.sort_by_key(|&(slot, e)| (slot, e));
        self.members.extend(found.into_iter().map(|(_, e)| e));

        self.target = store
            .matching::<(With<TargetTag>, With<Transform>)>()
            .into_iter()
            .find(|&e| store.get::<TargetTag>(e).is_ok_and(|tag| tag.env_id == self.env_id));

        if let Some(target) = self.target {
            if let Ok(transform) = store.get::<Transform>(target) {
                self.target_position = transform.position;
            }
        }

        if !self.members.is_empty() {
            debug!(
                env_id = self.env_id,
                members = self.members.len(),
                has_target = self.target.is_some(),
                "bridge resolved environment entities"
            );
        }
    }

    /// True once members are cached and the target is alive.
    pub fn is_ready(&self, store: &EntityStore) -> bool {
        !self.members.is_empty() && self.target.is_some_and(|t| store.is_alive(t))
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Target position as of the last sync (or reset).
    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    /// State of member `index`; zeroed if out of range or no longer alive.
    pub fn member_state(&self, store: &EntityStore, index: usize) -> MemberState {
        if !self.is_ready(store) {
            return MemberState::default();
        }
        let Some(&entity) = self.members.get(index) else {
            return MemberState::default();
        };
        let Ok(transform) = store.get::<Transform>(entity) else {
            return MemberState::default();
        };

        let velocity = store
            .get::<PhysicsVelocity>(entity)
            .copied()
            .unwrap_or_default();

        MemberState {
            position: transform.position,
            rotation: transform.rotation,
            linear_velocity: velocity.linear,
            angular_velocity: velocity.angular,
        }
    }

    /// Every member's ray readings, contiguous per member in cached order.
    ///
    /// Rays per member follow the first live member's buffer. Dead members or
    /// members without a buffer read as "no hit". Empty when not ready.
    pub fn all_sensor_readings(&mut self, store: &EntityStore) -> &[f32] {
        if !self.is_ready(store) {
            self.sensor_cache.clear();
            return &self.sensor_cache;
        }

        let rays_per_member = self.rays_per_member(store);
        let total = self.members.len() * rays_per_member;
        if self.sensor_cache.len() != total {
            self.sensor_cache.resize(total, 1.0);
        }

        for (i, &entity) in self.members.iter().enumerate() {
            let slice = &mut self.sensor_cache[i * rays_per_member..(i + 1) * rays_per_member];
            match store.buffer::<RaycastResult>(entity) {
                Ok(buffer) => {
                    for (dst, reading) in slice.iter_mut().zip(buffer.iter()) {
                        *dst = reading.distance_normalized;
                    }
                    if buffer.len() < slice.len() {
                        slice[buffer.len()..].fill(1.0);
                    }
                }
                Err(_) => slice.fill(1.0),
            }
        }

        &self.sensor_cache
    }

    /// Readings per member: the first live member with a filled buffer,
    /// else the first live member's sensor layout.
    fn rays_per_member(&self, store: &EntityStore) -> usize {
        let live = || self.members.iter().copied().filter(|&e| store.is_alive(e));
        live()
            .find_map(|e| store.buffer::<RaycastResult>(e).ok().filter(|b| !b.is_empty()).map(|b| b.len()))
            .or_else(|| live().find_map(|e| store.get::<SensorConfig>(e).ok().map(|c| c.total_rays())))
            .unwrap_or(0)
    }

    /// Set member `index`'s move direction. No-op when not ready, out of
    /// range, or the member is gone.
    pub fn set_command(&self, store: &mut EntityStore, index: usize, direction: Vec3) {
        if !self.is_ready(store) {
            return;
        }
        let Some(&entity) = self.members.get(index) else {
            return;
        };
        if let Ok(mut command) = store.get_mut::<AgentCommand>(entity) {
            command.move_vector = direction;
        }
    }

    /// Start a new episode by repositioning the existing target and members.
    ///
    /// The target is re-drawn on the spawn annulus, members go back to the
    /// spawn formation with identity rotation and zero velocity. No entity is
    /// created or destroyed.
    pub fn reset_episode(&mut self, store: &mut EntityStore) {
        if !self.is_ready(store) {
            return;
        }
        self.episode += 1;

        let (seed, target_distance) = match store.resource::<GlobalConfig>() {
            Some(config) => (config.seed, config.target_distance()),
            None => {
                warn!(env_id = self.env_id, "global config missing during reset, using defaults");
                let fallback = GlobalConfig::default();
                (fallback.seed, fallback.target_distance())
            }
        };
        let service = store.resource::<SpatialQueryService>().cloned();
        let spatial: Option<&dyn SpatialQuery> = service.as_ref().map(|s| s.0.as_ref());

        let mut rng = placement::episode_rng(seed, self.env_id, self.episode);

        if let Some(target) = self.target {
            let position = placement::target_position(&mut rng, self.center, target_distance, spatial);
            if let Ok(mut transform) = store.get_mut::<Transform>(target) {
                transform.position = position;
                self.target_position = position;
            }
        }

        let count = self.members.len();
        for (slot, &entity) in self.members.iter().enumerate() {
            if !store.is_alive(entity) {
                continue;
            }
            let position = placement::formation_position(self.center, slot, count, spatial);
            if let Ok(mut transform) = store.get_mut::<Transform>(entity) {
                transform.position = position;
                transform.rotation = Quat::IDENTITY;
            }
            if let Ok(mut velocity) = store.get_mut::<PhysicsVelocity>(entity) {
                *velocity = PhysicsVelocity::zero();
            }
        }

        debug!(env_id = self.env_id, episode = self.episode, target = ?self.target_position, "episode reset");
    }
}
