//! Horde - Squad Simulation Kernel
//!
//! A fixed-timestep ECS kernel that runs many isolated training environments,
//! each with a small squad of agents and one target. Agents scan their
//! surroundings with ray fans every tick and move on commands issued by an
//! external learning controller.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod bridge;
pub mod components;
pub mod config;
pub mod episode;
pub mod layout;
pub mod observation;
pub mod placement;
pub mod snapshot;
pub mod spatial;
pub mod store;
pub mod systems;

pub use api::{EnvironmentHandle, SimWorld};
pub use bridge::{EnvironmentBridge, MemberState};
pub use components::*;
pub use config::{ConfigError, EntityTemplate, GlobalConfig, KernelSettings, SimTick, DEFAULT_FIXED_TIMESTEP};
pub use episode::{EpisodeOutcome, EpisodeTracker, StepResult};
pub use observation::ObservationLayout;
pub use snapshot::Snapshot;
pub use spatial::{RaycastHit, SpatialQuery, SpatialQueryService, StaticScene, ALL_LAYERS};
pub use store::{EntityStore, StoreError};
pub use systems::*;
