//! Process-wide configuration resources.
//!
//! [`GlobalConfig`] describes the squad scenario (squad size, spawn radius,
//! vision layout) and is read-only once the world is built.
//! [`KernelSettings`] tunes how the kernel itself steps.

use crate::components::SensorConfig;
use bevy_ecs::prelude::*;
use glam::Quat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Template an entity is instantiated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    pub label: String,
    /// Initial orientation of spawned instances.
    #[serde(default = "identity")]
    pub rotation: Quat,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

impl EntityTemplate {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            rotation: Quat::IDENTITY,
        }
    }
}

/// Scenario configuration shared by every environment.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub member_template: EntityTemplate,
    pub target_template: EntityTemplate,
    pub members_per_squad: u32,
    /// Target spawns at `spawn_radius + 10` from the environment center.
    pub spawn_radius: f32,
    pub move_speed: f32,
    /// Horizontal ray count.
    pub ray_count: u32,
    /// Horizontal field of view in degrees.
    pub angle_degrees: f32,
    pub vertical_ray_count: u32,
    pub vertical_angle_degrees: f32,
    pub ray_length: f32,
    /// Layers the vision rays collide with.
    pub vision_mask: u32,
    /// Base seed for per-environment placement generators.
    pub seed: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            member_template: EntityTemplate::new("member"),
            target_template: EntityTemplate::new("target"),
            members_per_squad: 1,
            spawn_radius: 5.0,
            move_speed: 8.0,
            ray_count: 5,
            angle_degrees: 120.0,
            vertical_ray_count: 3,
            vertical_angle_degrees: 45.0,
            ray_length: 20.0,
            vision_mask: u32::MAX,
            seed: 0,
        }
    }
}

impl GlobalConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.members_per_squad == 0 {
            return Err(ConfigError::Invalid("members_per_squad must be at least 1"));
        }
        if !self.spawn_radius.is_finite() || self.spawn_radius < 0.0 {
            return Err(ConfigError::Invalid("spawn_radius must be finite and non-negative"));
        }
        if !self.move_speed.is_finite() {
            return Err(ConfigError::Invalid("move_speed must be finite"));
        }
        if !(self.ray_length.is_finite() && self.ray_length > 0.0) {
            return Err(ConfigError::Invalid("ray_length must be positive"));
        }
        if !self.angle_degrees.is_finite() || !self.vertical_angle_degrees.is_finite() {
            return Err(ConfigError::Invalid("field of view angles must be finite"));
        }
        Ok(())
    }

    /// Sensor layout handed to every spawned member.
    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            ray_count: self.ray_count,
            angle_degrees: self.angle_degrees,
            vertical_ray_count: self.vertical_ray_count,
            vertical_angle_degrees: self.vertical_angle_degrees,
            ray_length: self.ray_length,
            collision_mask: self.vision_mask,
        }
    }

    /// Distance of the target from the environment center.
    #[inline]
    pub fn target_distance(&self) -> f32 {
        self.spawn_radius + 10.0
    }
}

/// Fixed timestep used when none (or an unusable one) is configured.
pub const DEFAULT_FIXED_TIMESTEP: f32 = 1.0 / 50.0;

/// Configuration for kernel stepping.
#[derive(Resource, Debug, Clone)]
pub struct KernelSettings {
    /// Fixed timestep in seconds (e.g., 1/50 = 0.02 for 50 Hz).
    pub fixed_timestep: f32,
    /// Run the reference kinematic integrator after the movement pass.
    /// Leave off when an external physics engine advances positions.
    pub integrate_kinematics: bool,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            fixed_timestep: DEFAULT_FIXED_TIMESTEP,
            integrate_kinematics: true,
        }
    }
}

impl KernelSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(ConfigError::Invalid("fixed_timestep must be finite and positive"));
        }
        Ok(())
    }

    /// Same settings with an unusable timestep replaced by the default.
    pub fn sanitized(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(_) => Self {
                fixed_timestep: DEFAULT_FIXED_TIMESTEP,
                ..self
            },
        }
    }
}

/// Global simulation tick counter.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}
