//! Deterministic simulation module
//!
//! All physics and interaction logic lives here. This module must be pure and
//! deterministic:
//! - Fixed timestep only
//! - Constants injected through settings, never globals
//! - No threads, clocks or I/O (callers pass timestamps in)

pub mod collision;
pub mod drag;
pub mod state;
pub mod tick;

pub use collision::{WallHit, clamp_to_bounds, floor_rebound, wall_collision};
pub use drag::{DragEstimator, Throw};
pub use state::{InteractionMode, MotionState, Phase, SimEvent, Wall};
pub use tick::{Integrator, TickReport};
