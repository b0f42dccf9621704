//! Motion state and core simulation types
//!
//! Plain data; the integrator and drag estimator mutate it.

use serde::{Deserialize, Serialize};

use crate::clamp_range;

/// Vertical direction of travel
///
/// `vertical_speed` is a magnitude; the phase gives it a sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    Rising,
    #[default]
    Falling,
}

/// Who is moving the ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Driven by physics
    #[default]
    Free,
    /// Pinned under the pointer, vertical integration suspended
    Dragged,
}

/// Which side wall was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wall {
    Left,
    Right,
}

/// Side effects of a step, for logging and presentation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Ball touched the floor
    GroundContact {
        rebound_count: u32,
        /// Speed just before the bounce
        impact_speed: f32,
        /// Speed just after (after threshold snapping)
        rebound_speed: f32,
    },
    /// Ball reached the top of its arc
    Apex { height: f32 },
    /// Ball touched a side wall
    WallContact { wall: Wall, x: f32 },
}

/// Position, velocity and mode flags of the ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    /// Height above the floor (metres, >= 0)
    pub height: f32,
    /// Horizontal position of the ball centre (pixels)
    pub x: f32,
    /// Vertical speed magnitude; direction from `phase`
    pub vertical_speed: f32,
    /// Signed horizontal velocity (px/s, positive = right)
    pub horizontal_velocity: f32,
    pub phase: Phase,
    pub rebound_count: u32,
    /// Simulated seconds while unpaused
    pub elapsed: f32,
    pub mode: InteractionMode,
    pub paused: bool,
    /// Legal range for `x`
    pub min_x: f32,
    pub max_x: f32,
}

impl MotionState {
    /// Ball at rest at `height`, centred between the bounds
    pub fn new(height: f32, min_x: f32, max_x: f32) -> Self {
        let mut state = Self {
            height: 0.0,
            x: (min_x + max_x) / 2.0,
            vertical_speed: 0.0,
            horizontal_velocity: 0.0,
            phase: Phase::Falling,
            rebound_count: 0,
            elapsed: 0.0,
            mode: InteractionMode::Free,
            paused: false,
            min_x,
            max_x,
        };
        state.set_height(height);
        state
    }

    /// Set height, clamped at the floor
    #[inline]
    pub fn set_height(&mut self, height: f32) {
        self.height = if height > 0.0 { height } else { 0.0 };
    }

    /// Set horizontal position, clamped into the bounds
    #[inline]
    pub fn set_x(&mut self, x: f32) {
        self.x = clamp_range(x, self.min_x, self.max_x);
    }

    /// Signed vertical velocity (positive = up)
    pub fn vertical_velocity(&self) -> f32 {
        match self.phase {
            Phase::Rising => self.vertical_speed,
            Phase::Falling => -self.vertical_speed,
        }
    }

    /// Set vertical motion from a signed velocity (positive = up)
    pub fn set_vertical_velocity(&mut self, velocity: f32) {
        if velocity > 0.0 {
            self.phase = Phase::Rising;
            self.vertical_speed = velocity;
        } else {
            self.phase = Phase::Falling;
            self.vertical_speed = -velocity;
        }
    }

    pub fn is_dragged(&self) -> bool {
        self.mode == InteractionMode::Dragged
    }

    /// Whether the integrator should advance this state
    pub fn is_integrating(&self) -> bool {
        !self.paused && self.mode == InteractionMode::Free
    }

    /// Put the ball back at `height` with fresh counters
    ///
    /// Keeps `x`, `paused` and the bounds.
    pub fn restart(&mut self, height: f32, horizontal_velocity: f32) {
        self.set_height(height);
        self.vertical_speed = 0.0;
        self.horizontal_velocity = horizontal_velocity;
        self.phase = Phase::Falling;
        self.rebound_count = 0;
        self.elapsed = 0.0;
        self.mode = InteractionMode::Free;
    }

    /// Copy only the vertical motion of another state (monitor resync)
    pub fn sync_vertical_from(&mut self, other: &MotionState) {
        self.height = other.height;
        self.vertical_speed = other.vertical_speed;
        self.phase = other.phase;
    }
}
