//! Bounce Sim - a ball dropped under gravity, caught and thrown by the pointer
//!
//! Core modules:
//! - `sim`: Deterministic physics (motion state, integrator, drag-to-throw)
//! - `runner`: Background timed loops sharing the motion state
//! - `control`: Command surface and read-only snapshots for a presentation layer
//! - `console`: Console (non-graphical) variant with the dual-rate monitor
//! - `settings`: Data-driven physics, drag, viewport and loop configuration

pub mod console;
pub mod control;
pub mod runner;
pub mod settings;
pub mod sim;

pub use control::{Command, Controller, Snapshot};
pub use runner::{LoopEvent, LoopExit, LoopState, SharedState, SimulationLoop};
pub use settings::{DragConfig, LoopConfig, PhysicsConfig, Settings, Viewport};

/// Simulation configuration constants
pub mod consts {
    /// Gravitational acceleration (m/s²)
    pub const GRAVITY: f32 = 9.8;
    /// Fraction of vertical impact speed kept after a floor bounce
    pub const REBOUND_COEFFICIENT: f32 = 0.5;
    /// Rebound speeds below this snap to zero (stops endless micro-bounces)
    pub const MIN_REBOUND_SPEED: f32 = 0.5;

    /// Height used when the startup prompt gets unusable input (metres)
    pub const DEFAULT_HEIGHT: f32 = 100.0;

    /// Interactive time step bounds and increment (seconds)
    pub const DEFAULT_TIME_STEP: f32 = 0.1;
    pub const MIN_TIME_STEP: f32 = 0.01;
    pub const MAX_TIME_STEP: f32 = 1.0;
    pub const TIME_STEP_INCREMENT: f32 = 0.01;

    /// Console variant: primary step and the precision monitor's step
    pub const CONSOLE_TIME_STEP: f32 = 1.0;
    pub const MONITOR_TIME_STEP: f32 = 0.1;
    /// Monitor ticks between reconciliation checks (once per primary step)
    pub const MONITOR_RECONCILE_EVERY: u32 = 10;
    /// Height divergence that triggers a monitor resync (metres)
    pub const MONITOR_TOLERANCE: f32 = 0.01;
    /// Console run ends after this many floor contacts
    pub const CONSOLE_REBOUND_LIMIT: u32 = 3;

    /// Screen layout (pixels)
    pub const SCREEN_WIDTH: f32 = 800.0;
    pub const SCREEN_HEIGHT: f32 = 600.0;
    pub const GROUND_Y: f32 = SCREEN_HEIGHT - 50.0;
    pub const BALL_RADIUS: f32 = 20.0;
    /// Pixels per metre
    pub const SCALE_FACTOR: f32 = 3.0;

    /// Drag-to-throw tuning
    pub const THROW_SCALE: f32 = 1500.0 / SCALE_FACTOR;
    pub const THROW_GAIN: f32 = 1.5;
    pub const THROW_MAX_SPEED: f32 = 30.0;
    /// Release samples closer than this count as a tap (milliseconds)
    pub const MIN_SAMPLE_INTERVAL_MS: f32 = 10.0;
}

/// Clamp a scalar into `[min, max]`
///
/// Unlike `f32::clamp` this never panics when `min > max`.
#[inline]
pub fn clamp_range(value: f32, min: f32, max: f32) -> f32 {
    if value <= min {
        min
    } else if value >= max {
        max
    } else {
        value
    }
}
