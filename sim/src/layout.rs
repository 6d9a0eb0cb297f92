//! Placement of training environments on the XZ plane.
//!
//! Environments are laid out on a square spiral around the origin so any
//! count stays roughly square and environment 0 sits at the origin.

use glam::Vec3;

/// Default distance between neighbouring environment centers.
pub const DEFAULT_ENVIRONMENT_SPACING: f32 = 60.0;

/// Grid coordinates of the first `count` cells of a square spiral.
///
/// The walk starts at `(0, 0)`, steps to `(1, 0)`, then turns
/// counter-clockwise each time it reaches a corner of the current ring.
pub fn spiral_cells(count: usize) -> Vec<(i32, i32)> {
    let mut cells = Vec::with_capacity(count);
    let (mut x, mut z) = (0i32, 0i32);
    let (mut dx, mut dz) = (0i32, -1i32);

    for _ in 0..count {
        cells.push((x, z));

        if x == z || (x < 0 && x == -z) || (x > 0 && x == 1 - z) {
            let turned = dx;
            dx = -dz;
            dz = turned;
        }
        x += dx;
        z += dz;
    }

    cells
}

/// World-space centers for `count` environments, `spacing` apart.
pub fn spiral_centers(count: usize, spacing: f32) -> Vec<Vec3> {
    spiral_cells(count)
        .into_iter()
        .map(|(x, z)| Vec3::new(x as f32 * spacing, 0.0, z as f32 * spacing))
        .collect()
}
