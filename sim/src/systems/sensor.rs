//! Sensor system - casts each agent's ray fan and records normalized hit distances.
//!
//! ## Ray Layout
//!
//! Readings are written vertical-row-major: for each pitch (bottom to top),
//! every yaw (left to right) in turn. Consumers index a member's buffer as
//! `row * horizontal_rays + column`; this order is part of the observation
//! contract.
//!
//! ## Parallelization Strategy
//!
//! Each agent's scan only reads its own transform and config and only writes
//! its own buffer, and the spatial query service is shared read-only. With
//! `--features parallel` the scans are spread across rayon workers per agent;
//! rays of a single agent stay sequential since ray counts are small.

use crate::components::*;
use crate::spatial::{SpatialQuery, SpatialQueryService};
use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Distance a ray starts from the agent's position, to avoid hitting itself.
pub const SELF_CLEARANCE: f32 = 0.6;

/// Yaw angles in degrees for a sensor config, in sweep order.
pub fn horizontal_angles(config: &SensorConfig) -> Vec<f32> {
    let count = config.horizontal_rays();
    let fov = config.angle_degrees;

    let (start, step) = if fov.abs() >= 360.0 {
        // Full turn: no duplicated endpoint.
        (0.0, fov / count as f32)
    } else if count > 1 {
        (-fov / 2.0, fov / (count - 1) as f32)
    } else {
        (0.0, 0.0)
    };

    (0..count).map(|i| start + step * i as f32).collect()
}

/// Pitch angles in degrees for a sensor config, in sweep order.
pub fn vertical_angles(config: &SensorConfig) -> Vec<f32> {
    let count = config.vertical_rays();
    let fov = config.vertical_angle_degrees;

    let (start, step) = if count > 1 {
        (-fov / 2.0, fov / (count - 1) as f32)
    } else {
        (0.0, 0.0)
    };

    (0..count).map(|i| start + step * i as f32).collect()
}

/// World-space unit direction for a (pitch, yaw) pair in degrees.
///
/// Forward is +Z; positive pitch tilts up, positive yaw turns toward +X.
#[inline]
pub fn ray_direction(pitch_degrees: f32, yaw_degrees: f32) -> Vec3 {
    let pitch = Quat::from_rotation_x((-pitch_degrees).to_radians());
    let yaw = Quat::from_rotation_y(yaw_degrees.to_radians());
    (yaw * pitch) * Vec3::Z
}

/// Scan one agent's ray fan into `out`, resizing it to the config's ray count.
pub fn scan(position: Vec3, config: &SensorConfig, spatial: &dyn SpatialQuery, out: &mut Vec<RaycastResult>) {
    let total = config.total_rays();
    if out.len() != total {
        // Every slot is overwritten below.
        out.resize(total, RaycastResult::MISS);
    }

    let yaws = horizontal_angles(config);
    let pitches = vertical_angles(config);

    let mut index = 0;
    for &pitch in &pitches {
        for &yaw in &yaws {
            let dir = ray_direction(pitch, yaw);
            let start = position + dir * SELF_CLEARANCE;
            let end = start + dir * config.ray_length;

            let distance_normalized = spatial
                .cast_ray(start, end, config.collision_mask)
                .map(|hit| hit.fraction.clamp(0.0, 1.0))
                .unwrap_or(1.0);

            out[index] = RaycastResult { distance_normalized };
            index += 1;
        }
    }
}

/// System that refreshes every agent's ray buffer.
///
/// ## Data Access
/// - Reads: SpatialQueryService, Transform, SensorConfig
/// - Writes: RayBuffer
pub fn sensor_system(
    spatial: Option<Res<SpatialQueryService>>,
    mut query: Query<(&Transform, &SensorConfig, &mut RayBuffer)>,
) {
    let Some(spatial) = spatial else {
        return;
    };
    let spatial: &dyn SpatialQuery = spatial.0.as_ref();

    #[cfg(feature = "parallel")]
    {
        // Gather per-agent handles, then scan them across worker threads.
        let mut jobs: Vec<_> = query.iter_mut().collect();
        jobs.par_iter_mut().for_each(|(transform, config, buffer)| {
            scan(transform.position, config, spatial, &mut buffer.0);
        });
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (transform, config, mut buffer) in query.iter_mut() {
            scan(transform.position, config, spatial, &mut buffer.0);
        }
    }
}
