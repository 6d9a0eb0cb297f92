//! ECS Systems for the horde simulation kernel.
//!
//! Systems contain the kernel logic that operates on components.
//!
//! ## System Ordering
//!
//! One fixed update runs the systems as a chain:
//!
//! 1. `spawner_system` - populates uninitialized environments via `Commands`
//! 2. `apply_deferred` - barrier; spawned entities become visible
//! 3. `sensor_system` - ray scans, parallel across agents
//! 4. `movement_system` - commands into velocities, parallel across agents
//! 5. `kinematic_integration_system` - only when the kernel integrates
//!    velocities itself instead of handing them to an external physics step
//!
//! No two systems with overlapping write sets run at the same time.

pub mod movement;
pub mod sensor;
pub mod spawner;

pub use movement::*;
pub use sensor::*;
pub use spawner::*;
