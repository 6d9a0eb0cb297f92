//! Spatial query seam and a reference static collision scene.
//!
//! The kernel never owns collision geometry. It talks to whatever answers
//! [`SpatialQuery::cast_ray`] through the [`SpatialQueryService`] resource.
//! [`StaticScene`] is a read-only implementation with a uniform XZ grid for
//! O(k) candidate lookup, used for headless runs and tests.

use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::HashMap;
use std::sync::Arc;

/// Collision layer mask that matches every layer.
pub const ALL_LAYERS: u32 = u32::MAX;

/// Closest hit along a ray segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// World-space hit point.
    pub position: Vec3,
    /// Hit distance as a fraction of the segment length, in `[0, 1]`.
    pub fraction: f32,
}

/// "What, if anything, does this ray hit first."
///
/// Implementations are called concurrently from the sensor pass and must not
/// mutate shared state while answering.
pub trait SpatialQuery: Send + Sync {
    /// Cast the segment `origin -> end` against colliders whose layers
    /// intersect `collision_mask`.
    fn cast_ray(&self, origin: Vec3, end: Vec3, collision_mask: u32) -> Option<RaycastHit>;
}

/// Resource wrapper for the spatial query service, shared read-only by systems.
#[derive(Resource, Clone)]
pub struct SpatialQueryService(pub Arc<dyn SpatialQuery>);

impl SpatialQueryService {
    pub fn new(query: impl SpatialQuery + 'static) -> Self {
        Self(Arc::new(query))
    }

    #[inline]
    pub fn cast_ray(&self, origin: Vec3, end: Vec3, collision_mask: u32) -> Option<RaycastHit> {
        self.0.cast_ray(origin, end, collision_mask)
    }
}

// ============================================================================
// REFERENCE SCENE
// ============================================================================

/// Collider geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Infinite horizontal plane at the given height.
    Ground { height: f32 },
    /// Axis-aligned box.
    Cuboid { min: Vec3, max: Vec3 },
    Sphere { center: Vec3, radius: f32 },
}

/// A static collider on one or more layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    pub layers: u32,
}

impl Collider {
    /// Entry fraction of the segment `origin + t * delta`, `t` in `[0, 1]`.
    fn intersect(&self, origin: Vec3, delta: Vec3) -> Option<f32> {
        match self.shape {
            Shape::Ground { height } => {
                if delta.y.abs() < f32::EPSILON {
                    return None;
                }
                let t = (height - origin.y) / delta.y;
                (0.0..=1.0).contains(&t).then_some(t)
            }
            Shape::Cuboid { min, max } => {
                let mut t_enter = 0.0f32;
                let mut t_exit = 1.0f32;
                for axis in 0..3 {
                    let o = origin[axis];
                    let d = delta[axis];
                    if d.abs() < f32::EPSILON {
                        if o < min[axis] || o > max[axis] {
                            return None;
                        }
                        continue;
                    }
                    let inv = 1.0 / d;
                    let mut t0 = (min[axis] - o) * inv;
                    let mut t1 = (max[axis] - o) * inv;
                    if t0 > t1 {
                        std::mem::swap(&mut t0, &mut t1);
                    }
                    t_enter = t_enter.max(t0);
                    t_exit = t_exit.min(t1);
                    if t_enter > t_exit {
                        return None;
                    }
                }
                Some(t_enter)
            }
            Shape::Sphere { center, radius } => {
                let m = origin - center;
                let a = delta.length_squared();
                if a < f32::EPSILON {
                    return None;
                }
                let b = m.dot(delta);
                let c = m.length_squared() - radius * radius;
                if c <= 0.0 {
                    // Segment starts inside.
                    return Some(0.0);
                }
                let disc = b * b - a * c;
                if disc < 0.0 {
                    return None;
                }
                let t = (-b - disc.sqrt()) / a;
                (0.0..=1.0).contains(&t).then_some(t)
            }
        }
    }

    /// XZ footprint as (min_x, min_z, max_x, max_z). `None` for unbounded shapes.
    fn footprint(&self) -> Option<(f32, f32, f32, f32)> {
        match self.shape {
            Shape::Ground { .. } => None,
            Shape::Cuboid { min, max } => Some((min.x, min.z, max.x, max.z)),
            Shape::Sphere { center, radius } => Some((
                center.x - radius,
                center.z - radius,
                center.x + radius,
                center.z + radius,
            )),
        }
    }
}

/// Read-only collider set bucketed into a uniform XZ grid.
#[derive(Debug, Clone)]
pub struct StaticScene {
    /// Cell size in world units.
    pub cell_size: f32,
    colliders: Vec<Collider>,
    /// Colliders without a footprint, tested against every ray.
    unbounded: Vec<usize>,
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl Default for StaticScene {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl StaticScene {
    /// Create an empty scene with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.01),
            colliders: Vec::new(),
            unbounded: Vec::new(),
            cells: HashMap::new(),
        }
    }

    /// Convert world XZ coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (z / self.cell_size).floor() as i32,
        )
    }

    /// Insert a collider.
    pub fn insert(&mut self, collider: Collider) {
        let index = self.colliders.len();
        self.colliders.push(collider);
        match collider.footprint() {
            None => self.unbounded.push(index),
            Some((min_x, min_z, max_x, max_z)) => {
                let (c0x, c0z) = self.world_to_cell(min_x, min_z);
                let (c1x, c1z) = self.world_to_cell(max_x, max_z);
                for cx in c0x..=c1x {
                    for cz in c0z..=c1z {
                        self.cells.entry((cx, cz)).or_default().push(index);
                    }
                }
            }
        }
    }

    pub fn with_ground(mut self, height: f32, layers: u32) -> Self {
        self.insert(Collider {
            shape: Shape::Ground { height },
            layers,
        });
        self
    }

    pub fn with_box(mut self, center: Vec3, half_extents: Vec3, layers: u32) -> Self {
        let half = half_extents.abs();
        self.insert(Collider {
            shape: Shape::Cuboid {
                min: center - half,
                max: center + half,
            },
            layers,
        });
        self
    }

    pub fn with_sphere(mut self, center: Vec3, radius: f32, layers: u32) -> Self {
        self.insert(Collider {
            shape: Shape::Sphere {
                center,
                radius: radius.abs(),
            },
            layers,
        });
        self
    }

    /// Get total collider count.
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Collider indices registered in the cells a segment passes over.
    fn candidates(&self, origin: Vec3, end: Vec3) -> Vec<usize> {
        let mut found = self.unbounded.clone();
        for cell in self.cells_along(origin, end) {
            if let Some(entries) = self.cells.get(&cell) {
                found.extend_from_slice(entries);
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Cells crossed by the XZ projection of a segment, walked in order
    /// (grid traversal; cost is linear in the number of cells crossed).
    /// Near-corner crossings also report both side neighbours.
    fn cells_along(&self, origin: Vec3, end: Vec3) -> Vec<(i32, i32)> {
        let (mut cx, mut cz) = self.world_to_cell(origin.x, origin.z);
        let (ex, ez) = self.world_to_cell(end.x, end.z);
        let dx = end.x - origin.x;
        let dz = end.z - origin.z;
        let step_x = if ex > cx { 1 } else if ex < cx { -1 } else { 0 };
        let step_z = if ez > cz { 1 } else if ez < cz { -1 } else { 0 };

        // Segment parameter at the next cell boundary on each axis.
        let boundary = |cell: i32, step: i32| (cell + (step > 0) as i32) as f32 * self.cell_size;
        let mut t_max_x = if step_x != 0 { (boundary(cx, step_x) - origin.x) / dx } else { f32::INFINITY };
        let mut t_max_z = if step_z != 0 { (boundary(cz, step_z) - origin.z) / dz } else { f32::INFINITY };
        let t_delta_x = if step_x != 0 { self.cell_size / dx.abs() } else { f32::INFINITY };
        let t_delta_z = if step_z != 0 { self.cell_size / dz.abs() } else { f32::INFINITY };

        let manhattan = (ex - cx).unsigned_abs() + (ez - cz).unsigned_abs();
        let mut cells = Vec::with_capacity(manhattan as usize + 1);
        cells.push((cx, cz));

        while (cx, cz) != (ex, ez) {
            let x_done = cx == ex;
            let z_done = cz == ez;
            if !x_done && !z_done && (t_max_x - t_max_z).abs() <= 1e-5 {
                cells.push((cx + step_x, cz));
                cells.push((cx, cz + step_z));
            }

            if z_done || (!x_done && t_max_x < t_max_z) {
                cx += step_x;
                t_max_x += t_delta_x;
            } else {
                cz += step_z;
                t_max_z += t_delta_z;
            }
            cells.push((cx, cz));
        }

        cells
    }
}

impl SpatialQuery for StaticScene {
    fn cast_ray(&self, origin: Vec3, end: Vec3, collision_mask: u32) -> Option<RaycastHit> {
        let delta = end - origin;
        let mut best: Option<f32> = None;

        for index in self.candidates(origin, end) {
            let collider = &self.colliders[index];
            if collider.layers & collision_mask == 0 {
                continue;
            }
            if let Some(t) = collider.intersect(origin, delta) {
                if best.map_or(true, |b| t < b) {
                    best = Some(t);
                }
            }
        }

        best.map(|fraction| RaycastHit {
            position: origin + delta * fraction,
            fraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_hit_fraction() {
        let scene = StaticScene::default().with_ground(0.0, ALL_LAYERS);

        let hit = scene
            .cast_ray(Vec3::new(3.0, 50.0, -2.0), Vec3::new(3.0, -50.0, -2.0), ALL_LAYERS)
            .unwrap();
        assert!((hit.fraction - 0.5).abs() < 1e-5);
        assert!(hit.position.y.abs() < 1e-4);
        assert!((hit.position.x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_hit_wins() {
        let scene = StaticScene::new(5.0)
            .with_box(Vec3::new(0.0, 1.0, 10.0), Vec3::splat(1.0), ALL_LAYERS)
            .with_box(Vec3::new(0.0, 1.0, 6.0), Vec3::splat(1.0), ALL_LAYERS);

        let hit = scene
            .cast_ray(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 20.0), ALL_LAYERS)
            .unwrap();
        // Near face of the closer box is at z = 5.
        assert!((hit.fraction - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_layer_mask_filters_colliders() {
        let scene = StaticScene::default().with_sphere(Vec3::new(0.0, 0.0, 5.0), 1.0, 0b01);

        let origin = Vec3::ZERO;
        let end = Vec3::new(0.0, 0.0, 10.0);
        assert!(scene.cast_ray(origin, end, 0b10).is_none());
        let hit = scene.cast_ray(origin, end, 0b01).unwrap();
        assert!((hit.fraction - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_miss_beyond_segment() {
        let scene = StaticScene::default().with_box(Vec3::new(0.0, 0.0, 30.0), Vec3::splat(1.0), ALL_LAYERS);
        assert!(scene
            .cast_ray(Vec3::ZERO, Vec3::new(0.0, 0.0, 20.0), ALL_LAYERS)
            .is_none());
    }

    #[test]
    fn test_long_diagonal_walks_only_crossed_cells() {
        let scene = StaticScene::new(1.0);
        let origin = Vec3::new(0.3, 0.0, 0.6);
        let end = Vec3::new(100.7, 0.0, 50.2);
        let cells = scene.cells_along(origin, end);

        assert_eq!(cells.first(), Some(&(0, 0)));
        assert_eq!(cells.last(), Some(&(100, 50)));
        // A bounding-rectangle scan would touch 101 x 51 cells.
        assert!(cells.len() < 300, "walked {} cells", cells.len());
        for pair in cells.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!((a.0 - b.0).abs() <= 1 && (a.1 - b.1).abs() <= 1);
        }
    }

    #[test]
    fn test_walk_handles_negative_and_axis_aligned_rays() {
        let scene = StaticScene::new(2.0);
        let back = scene.cells_along(Vec3::new(5.0, 0.0, 5.0), Vec3::new(-5.0, 0.0, 5.0));
        assert_eq!(back, vec![(2, 2), (1, 2), (0, 2), (-1, 2), (-2, 2), (-3, 2)]);

        let vertical = scene.cells_along(Vec3::new(1.0, 50.0, 1.0), Vec3::new(1.0, -50.0, 1.0));
        assert_eq!(vertical, vec![(0, 0)]);
    }

    #[test]
    fn test_diagonal_ray_finds_distant_sphere() {
        let scene = StaticScene::new(0.5)
            .with_sphere(Vec3::new(30.0, 0.0, 30.0), 1.0, ALL_LAYERS)
            .with_sphere(Vec3::new(30.0, 0.0, -30.0), 1.0, ALL_LAYERS);

        let hit = scene
            .cast_ray(Vec3::ZERO, Vec3::new(40.0, 0.0, 40.0), ALL_LAYERS)
            .unwrap();
        assert!((hit.position.length() - (30.0 * 2f32.sqrt() - 1.0)).abs() < 1e-3);
    }

    #[test]
    fn test_box_spanning_many_cells() {
        let scene = StaticScene::new(2.0).with_box(Vec3::new(0.0, 0.0, 8.0), Vec3::new(20.0, 2.0, 0.5), ALL_LAYERS);
        assert_eq!(scene.collider_count(), 1);
        let hit = scene
            .cast_ray(Vec3::new(15.0, 0.0, 0.0), Vec3::new(15.0, 0.0, 10.0), ALL_LAYERS)
            .unwrap();
        assert!((hit.position.z - 7.5).abs() < 1e-4);
    }
}
