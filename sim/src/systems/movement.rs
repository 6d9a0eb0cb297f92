//! Movement system - turns agent commands into velocities.

use crate::components::*;
use bevy_ecs::prelude::*;
use glam::Quat;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Angular velocity per unit of horizontal velocity, for the banking tilt.
pub const TILT_COEFFICIENT: f32 = 2.0;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Apply a command to a velocity pair.
///
/// Only the horizontal linear components are driven; vertical motion belongs
/// to gravity and the physics step. The tilt is cosmetic.
#[inline]
pub fn apply_command(command: &AgentCommand, velocity: &mut PhysicsVelocity) {
    let target = command.target_velocity();

    velocity.linear.x = target.x;
    velocity.linear.z = target.z;

    velocity.angular.x = target.z * TILT_COEFFICIENT;
    velocity.angular.z = -target.x * TILT_COEFFICIENT;
}

/// System that updates velocity based on agent commands.
///
/// ## Data Access
/// - Reads: AgentCommand
/// - Writes: PhysicsVelocity
pub fn movement_system(mut query: Query<(&AgentCommand, &mut PhysicsVelocity)>) {
    #[cfg(feature = "parallel")]
    {
        let mut jobs: Vec<_> = query.iter_mut().collect();
        jobs.par_iter_mut().for_each(|(command, velocity)| {
            apply_command(command, velocity);
        });
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (command, mut velocity) in query.iter_mut() {
            apply_command(command, &mut velocity);
        }
    }
}

/// System that applies velocity to transforms.
///
/// Reference integrator for headless runs; an external physics engine
/// replaces it by leaving `KernelSettings::integrate_kinematics` off.
pub fn kinematic_integration_system(
    dt: Res<DeltaTime>,
    mut query: Query<(&mut Transform, &PhysicsVelocity)>,
) {
    let delta = dt.0;
    for (mut transform, velocity) in query.iter_mut() {
        transform.position += velocity.linear * delta;

        let spin = velocity.angular * delta;
        if spin != glam::Vec3::ZERO {
            transform.rotation = (Quat::from_scaled_axis(spin) * transform.rotation).normalize();
        }
    }
}
