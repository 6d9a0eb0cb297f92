//! Observation and action layout for the learning controller.
//!
//! The controller sees one environment as a single flat `f32` vector and
//! answers with a flat action vector. Both layouts are fixed for the lifetime
//! of a run and derived from the global config.
//!
//! # Observation Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ MEMBER BLOCKS (members × per_member elements)                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ For member i (offset = i * per_member):                         │
//! │   [+0..+3]  to_target   - target - position (world units)       │
//! │   [+3..+6]  velocity    - linear velocity (units/sec)           │
//! │   [+6..]    rays        - normalized hit distances, row-major   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `per_member = MEMBER_HEADER + rays_per_member`. A vector is always exactly
//! `observation_size()` long; anything the environment cannot supply yet
//! (not ready, fewer members) is zero.
//!
//! # Action Layout
//!
//! | Offset        | Meaning                     |
//! |---------------|-----------------------------|
//! | `2 * i + 0`   | member i move direction x   |
//! | `2 * i + 1`   | member i move direction z   |

use crate::api::EnvironmentHandle;
use crate::config::GlobalConfig;
use glam::Vec3;

/// Values per member before its rays.
pub const MEMBER_HEADER: usize = 6;
/// Continuous actions per member.
pub const ACTIONS_PER_MEMBER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationLayout {
    pub members: usize,
    pub rays_per_member: usize,
}

impl ObservationLayout {
    pub fn new(members: usize, rays_per_member: usize) -> Self {
        Self {
            members,
            rays_per_member,
        }
    }

    /// Layout implied by a global config.
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(
            config.members_per_squad as usize,
            config.sensor_config().total_rays(),
        )
    }

    pub const fn per_member(&self) -> usize {
        MEMBER_HEADER + self.rays_per_member
    }

    pub const fn observation_size(&self) -> usize {
        self.per_member() * self.members
    }

    pub const fn action_size(&self) -> usize {
        ACTIONS_PER_MEMBER * self.members
    }
}

/// Write one environment's observation vector into `out`.
///
/// Rays per member are taken from the environment's own readings. The
/// result is zero-padded or cut to the layout size.
pub fn collect(env: &mut EnvironmentHandle<'_>, layout: &ObservationLayout, out: &mut Vec<f32>) {
    out.clear();

    if env.is_ready() {
        let members = env.member_count();
        let target = env.target_position();
        let states: Vec<_> = (0..members).map(|i| env.member_state(i)).collect();
        let rays = env.all_sensor_readings();
        let rays_per_member = if members > 0 { rays.len() / members } else { 0 };

        for (i, state) in states.iter().enumerate() {
            out.extend_from_slice(&(target - state.position).to_array());
            out.extend_from_slice(&state.linear_velocity.to_array());
            out.extend_from_slice(&rays[i * rays_per_member..(i + 1) * rays_per_member]);
        }
    }

    out.resize(layout.observation_size(), 0.0);
}

/// Decode an action vector into member move commands.
///
/// Stops at the first member without a complete pair. Returns the number of
/// members commanded.
pub fn apply_actions(env: &mut EnvironmentHandle<'_>, actions: &[f32]) -> usize {
    if !env.is_ready() {
        return 0;
    }

    let members = env.member_count();
    let mut applied = 0;
    for (i, pair) in actions.chunks_exact(ACTIONS_PER_MEMBER).take(members).enumerate() {
        env.set_command(i, Vec3::new(pair[0], 0.0, pair[1]));
        applied += 1;
    }
    applied
}
