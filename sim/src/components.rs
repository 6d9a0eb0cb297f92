//! ECS Components for the Horde simulation kernel.
//!
//! Components are pure data containers attached to entities.
//! All simulation logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World-space placement of an entity (y is up).
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Distance to a point ignoring the vertical axis.
    pub fn horizontal_distance_to(&self, point: Vec3) -> f32 {
        let dx = self.position.x - point.x;
        let dz = self.position.z - point.z;
        (dx * dx + dz * dz).sqrt()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

/// Linear and angular velocity pair, written by the movement system and
/// consumed by whatever integrates positions (external physics or the
/// reference kinematic integrator).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsVelocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl PhysicsVelocity {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.linear == Vec3::ZERO && self.angular == Vec3::ZERO
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Marks the entity that represents one environment instance.
///
/// Members and targets are associated with an environment through their
/// `env_id` field, not through any parent/child relation.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentTag {
    pub env_id: i32,
    pub center: Vec3,
    /// Flipped once by the spawner; never cleared.
    pub initialized: bool,
}

impl EnvironmentTag {
    pub fn new(env_id: i32, center: Vec3) -> Self {
        Self {
            env_id,
            center,
            initialized: false,
        }
    }
}

/// Squad membership of an agent.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SquadMember {
    pub squad_id: i32,
    pub env_id: i32,
    /// Position of this member in its squad's spawn formation.
    pub slot: u32,
}

impl Default for SquadMember {
    fn default() -> Self {
        Self {
            squad_id: -1,
            env_id: -1,
            slot: 0,
        }
    }
}

/// Marks the single target entity of an environment.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetTag {
    pub env_id: i32,
}

/// Name of the template an entity was instantiated from.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label(pub String);

// ============================================================================
// CONTROL COMPONENTS
// ============================================================================

/// What the controller tells the body to do.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCommand {
    /// Desired direction of travel. Not normalized or clamped.
    pub move_vector: Vec3,
    pub move_speed: f32,
}

impl AgentCommand {
    pub fn idle(move_speed: f32) -> Self {
        Self {
            move_vector: Vec3::ZERO,
            move_speed,
        }
    }

    /// Velocity the command asks for.
    #[inline]
    pub fn target_velocity(&self) -> Vec3 {
        self.move_vector * self.move_speed
    }
}

// ============================================================================
// SENSOR COMPONENTS
// ============================================================================

/// Ray fan layout for an agent's vision sensor.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Horizontal ray count (values below 1 are treated as 1).
    pub ray_count: u32,
    /// Horizontal field of view in degrees. 360 or more means a full turn.
    pub angle_degrees: f32,
    /// Vertical ray count (values below 1 are treated as 1).
    pub vertical_ray_count: u32,
    /// Vertical field of view in degrees.
    pub vertical_angle_degrees: f32,
    pub ray_length: f32,
    pub collision_mask: u32,
}

impl SensorConfig {
    #[inline]
    pub fn horizontal_rays(&self) -> usize {
        self.ray_count.max(1) as usize
    }

    #[inline]
    pub fn vertical_rays(&self) -> usize {
        self.vertical_ray_count.max(1) as usize
    }

    /// Number of readings one scan produces.
    #[inline]
    pub fn total_rays(&self) -> usize {
        self.horizontal_rays() * self.vertical_rays()
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ray_count: 5,
            angle_degrees: 120.0,
            vertical_ray_count: 3,
            vertical_angle_degrees: 45.0,
            ray_length: 20.0,
            collision_mask: u32::MAX,
        }
    }
}

/// One ray reading: 0.0 = touching, 1.0 = nothing within range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaycastResult {
    pub distance_normalized: f32,
}

impl RaycastResult {
    pub const MISS: Self = Self {
        distance_normalized: 1.0,
    };
}

impl Default for RaycastResult {
    fn default() -> Self {
        Self::MISS
    }
}

/// Variable-length per-entity buffer of `T` elements.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct DynamicBuffer<T: Send + Sync + 'static>(pub Vec<T>);

impl<T: Send + Sync + 'static> Default for DynamicBuffer<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: Send + Sync + 'static> DynamicBuffer<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

/// Per-agent vision observation.
pub type RayBuffer = DynamicBuffer<RaycastResult>;

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning an environment marker.
#[derive(Bundle)]
pub struct EnvironmentBundle {
    pub tag: EnvironmentTag,
    pub transform: Transform,
}

impl EnvironmentBundle {
    pub fn new(env_id: i32, center: Vec3) -> Self {
        Self {
            tag: EnvironmentTag::new(env_id, center),
            transform: Transform::from_position(center),
        }
    }
}

/// Bundle for spawning a complete squad member.
#[derive(Bundle, Default)]
pub struct MemberBundle {
    pub member: SquadMember,
    pub transform: Transform,
    pub velocity: PhysicsVelocity,
    pub command: AgentCommand,
    pub sensor: SensorConfig,
    pub rays: RayBuffer,
    pub label: Label,
}

/// Bundle for spawning an environment's target.
#[derive(Bundle)]
pub struct TargetBundle {
    pub tag: TargetTag,
    pub transform: Transform,
    pub label: Label,
}
