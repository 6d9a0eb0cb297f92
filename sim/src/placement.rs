//! Placement rules shared by the initial spawn and episode resets.
//!
//! Both paths must put the target on the same annulus and the squad on the
//! same formation circle, snapped to the ground the same way.

use crate::spatial::{SpatialQuery, ALL_LAYERS};
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Height the ground cast starts from.
pub const GROUND_PROBE_TOP: f32 = 50.0;
/// Height the ground cast ends at.
pub const GROUND_PROBE_BOTTOM: f32 = -50.0;
/// Clearance above the ground hit, and the fallback height on a miss.
pub const GROUND_CLEARANCE: f32 = 0.5;
/// Radius of the squad's spawn formation around the environment center.
pub const FORMATION_RADIUS: f32 = 2.0;

/// Seed for an environment's placement generator in a given episode.
///
/// Episode 0 is the initial spawn. Each reset advances the episode, so
/// targets move between episodes while runs stay reproducible.
pub fn episode_seed(base_seed: u64, env_id: i32, episode: u64) -> u64 {
    let env = (env_id as i64 as u64).wrapping_add(1);
    base_seed
        ^ env.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ episode.wrapping_mul(0xC2B2_AE3D_27D4_EB4F).rotate_left(31)
}

/// Placement generator for an environment's episode.
pub fn episode_rng(base_seed: u64, env_id: i32, episode: u64) -> SmallRng {
    SmallRng::seed_from_u64(episode_seed(base_seed, env_id, episode))
}

/// Height to place an entity at, probing straight down at `(x, z)`.
pub fn ground_height(spatial: Option<&dyn SpatialQuery>, x: f32, z: f32) -> f32 {
    let Some(spatial) = spatial else {
        return GROUND_CLEARANCE;
    };
    let start = Vec3::new(x, GROUND_PROBE_TOP, z);
    let end = Vec3::new(x, GROUND_PROBE_BOTTOM, z);
    spatial
        .cast_ray(start, end, ALL_LAYERS)
        .map(|hit| hit.position.y + GROUND_CLEARANCE)
        .unwrap_or(GROUND_CLEARANCE)
}

/// Snap a horizontal position to the ground.
pub fn snap_to_ground(spatial: Option<&dyn SpatialQuery>, xz: Vec3) -> Vec3 {
    Vec3::new(xz.x, ground_height(spatial, xz.x, xz.z), xz.z)
}

/// Target position on the annulus of `distance` around `center`.
pub fn target_position(
    rng: &mut impl Rng,
    center: Vec3,
    distance: f32,
    spatial: Option<&dyn SpatialQuery>,
) -> Vec3 {
    let angle = rng.gen_range(0.0..TAU);
    let xz = center + Vec3::new(angle.cos(), 0.0, angle.sin()) * distance;
    snap_to_ground(spatial, xz)
}

/// Horizontal offset of formation slot `index` out of `count`.
pub fn formation_offset(index: usize, count: usize) -> Vec3 {
    let step = TAU / count.max(1) as f32;
    let angle = index as f32 * step;
    Vec3::new(angle.cos(), 0.0, angle.sin()) * FORMATION_RADIUS
}

/// Ground-snapped position of formation slot `index` around `center`.
pub fn formation_position(
    center: Vec3,
    index: usize,
    count: usize,
    spatial: Option<&dyn SpatialQuery>,
) -> Vec3 {
    snap_to_ground(spatial, center + formation_offset(index, count))
}
