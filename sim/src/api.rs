//! Public API for the simulation kernel.
//!
//! This module provides the main interface for a learning controller (or any
//! other client) to drive the kernel.
//!
//! ## Fixed Timestep
//!
//! The kernel uses a fixed timestep internally (default 50 Hz). When `step(dt)`
//! is called, the kernel accumulates time and runs fixed updates as needed.
//! `tick()` runs exactly one fixed update, which is what a controller stepping
//! in lockstep with its policy usually wants.
//!
//! ## Environments
//!
//! Every environment gets one [`EnvironmentBridge`]. Controllers reach an
//! environment through [`SimWorld::environment`], which pairs the bridge with
//! the entity store for the duration of the borrow.

use crate::bridge::{EnvironmentBridge, MemberState};
use crate::components::*;
use crate::config::{GlobalConfig, KernelSettings, SimTick, DEFAULT_FIXED_TIMESTEP};
use crate::layout;
use crate::snapshot::Snapshot;
use crate::spatial::{SpatialQuery, SpatialQueryService};
use crate::store::EntityStore;
use crate::systems::*;
use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The main simulation world container.
///
/// Holds the entity store, the schedule and one bridge per environment,
/// providing a clean API for:
/// - Registering environments
/// - Stepping the kernel forward
/// - Reaching a single environment's controller surface
/// - Extracting state snapshots
pub struct SimWorld {
    store: EntityStore,
    schedule: Schedule,
    bridges: BTreeMap<i32, EnvironmentBridge>,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

/// Run condition for the reference integrator.
fn integration_enabled(settings: Option<Res<KernelSettings>>) -> bool {
    settings.is_some_and(|s| s.integrate_kinematics)
}

impl SimWorld {
    /// Create a kernel with default scenario and kernel settings.
    pub fn new() -> Self {
        Self::with_config(GlobalConfig::default())
    }

    /// Create a kernel with a custom scenario configuration.
    pub fn with_config(config: GlobalConfig) -> Self {
        Self::with_settings(config, KernelSettings::default())
    }

    /// Create a kernel with custom scenario and kernel settings.
    pub fn with_settings(config: GlobalConfig, settings: KernelSettings) -> Self {
        if let Err(err) = settings.validate() {
            warn!(%err, timestep = settings.fixed_timestep, "falling back to default fixed timestep");
        }
        let settings = settings.sanitized();

        let mut store = EntityStore::new();

        store.insert_resource(DeltaTime(settings.fixed_timestep));
        store.insert_resource(SimTick(0));
        store.insert_resource(settings);
        store.insert_resource(config);

        let mut schedule = Schedule::default();

        // Sequential chain: every stage consumes what the previous one wrote.
        schedule.add_systems(
            (
                spawner_system,
                apply_deferred,
                sensor_system,
                movement_system,
                kinematic_integration_system.run_if(integration_enabled),
            )
                .chain(),
        );

        Self {
            store,
            schedule,
            bridges: BTreeMap::new(),
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Create a kernel with `count` environments laid out on a spiral.
    pub fn with_environments(config: GlobalConfig, count: usize, spacing: f32) -> Self {
        let mut sim = Self::with_config(config);
        for (env_id, center) in layout::spiral_centers(count, spacing).into_iter().enumerate() {
            sim.add_environment(env_id as i32, center);
        }
        info!(environments = count, spacing, "kernel created");
        sim
    }

    /// Install the spatial query service all sensor rays and ground casts go through.
    pub fn set_spatial_query(&mut self, query: impl SpatialQuery + 'static) {
        self.store.insert_resource(SpatialQueryService::new(query));
    }

    /// Builder form of [`SimWorld::set_spatial_query`].
    pub fn with_spatial_query(mut self, query: impl SpatialQuery + 'static) -> Self {
        self.set_spatial_query(query);
        self
    }

    /// Register an environment. It is populated on the next fixed update.
    ///
    /// Returns `false` if the id is already taken.
    pub fn add_environment(&mut self, env_id: i32, center: Vec3) -> bool {
        if self.bridges.contains_key(&env_id) {
            warn!(env_id, "environment already registered");
            return false;
        }
        self.store.spawn(EnvironmentBundle::new(env_id, center));
        self.bridges.insert(env_id, EnvironmentBridge::new(env_id, center));
        true
    }

    /// Registered environment ids in ascending order.
    pub fn environment_ids(&self) -> Vec<i32> {
        self.bridges.keys().copied().collect()
    }

    pub fn environment_count(&self) -> usize {
        self.bridges.len()
    }

    /// Controller surface of one environment.
    pub fn environment(&mut self, env_id: i32) -> Option<EnvironmentHandle<'_>> {
        let bridge = self.bridges.get_mut(&env_id)?;
        Some(EnvironmentHandle {
            bridge,
            store: &mut self.store,
        })
    }

    /// Step the kernel forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. Negative or non-finite durations are ignored.
    pub fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt >= 0.0) {
            warn!(dt, "ignoring invalid step duration");
            return;
        }
        let fixed_dt = self.fixed_timestep();

        self.time_accumulator += dt;

        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run exactly one fixed update.
    pub fn tick(&mut self) {
        let fixed_dt = self.fixed_timestep();
        self.fixed_update(fixed_dt);
    }

    fn fixed_timestep(&self) -> f32 {
        self.store
            .resource::<KernelSettings>()
            .map(|s| s.fixed_timestep)
            .filter(|dt| dt.is_finite() && *dt > 0.0)
            .unwrap_or(DEFAULT_FIXED_TIMESTEP)
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        let world = self.store.world_mut();

        if let Some(mut dt_res) = world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }

        if let Some(mut tick_res) = world.get_resource_mut::<SimTick>() {
            tick_res.increment();
        }

        self.schedule.run(world);

        for bridge in self.bridges.values_mut() {
            bridge.sync(&mut self.store);
        }

        self.tick += 1;
        self.time += dt;
    }

    /// Get a snapshot of the current kernel state.
    pub fn snapshot(&mut self) -> Snapshot {
        let mut snapshot = Snapshot::from_world(self.store.world_mut(), self.tick, self.time);
        for env in &mut snapshot.environments {
            if let Some(bridge) = self.bridges.get(&env.env_id) {
                env.episode = bridge.episode();
            }
        }
        snapshot
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Scenario configuration the kernel was built with.
    pub fn config(&self) -> Option<&GlobalConfig> {
        self.store.resource::<GlobalConfig>()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        self.store.world()
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        self.store.world_mut()
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// One environment's bridge paired with the store it reads from.
pub struct EnvironmentHandle<'a> {
    bridge: &'a mut EnvironmentBridge,
    store: &'a mut EntityStore,
}

impl EnvironmentHandle<'_> {
    pub fn env_id(&self) -> i32 {
        self.bridge.env_id()
    }

    pub fn center(&self) -> Vec3 {
        self.bridge.center()
    }

    pub fn episode(&self) -> u64 {
        self.bridge.episode()
    }

    pub fn is_ready(&self) -> bool {
        self.bridge.is_ready(self.store)
    }

    pub fn member_count(&self) -> usize {
        self.bridge.member_count()
    }

    /// Member entities in formation order.
    pub fn members(&self) -> &[Entity] {
        self.bridge.members()
    }

    pub fn target(&self) -> Option<Entity> {
        self.bridge.target()
    }

    pub fn target_position(&self) -> Vec3 {
        self.bridge.target_position()
    }

    pub fn member_state(&self, index: usize) -> MemberState {
        self.bridge.member_state(self.store, index)
    }

    pub fn all_sensor_readings(&mut self) -> &[f32] {
        self.bridge.all_sensor_readings(self.store)
    }

    pub fn set_command(&mut self, index: usize, direction: Vec3) {
        self.bridge.set_command(self.store, index, direction);
    }

    pub fn reset_episode(&mut self) {
        self.bridge.reset_episode(self.store);
    }
}
