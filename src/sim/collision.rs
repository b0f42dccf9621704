//! Collision response against the floor and the side walls
//!
//! Point mass only: no penetration correction beyond clamping, and a fast
//! enough ball may tunnel past a boundary inside a single step.

use super::state::Wall;
use crate::clamp_range;

/// Result of a side wall check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallHit {
    pub wall: Wall,
    /// Clamped position (on the wall)
    pub x: f32,
    /// Velocity after the rebound, pointing away from the wall
    pub velocity: f32,
}

/// Speed after bouncing off the floor
///
/// Keeps `coefficient` of the impact speed; anything slower than
/// `min_speed` becomes exactly zero so the ball comes to rest.
#[inline]
pub fn floor_rebound(impact_speed: f32, coefficient: f32, min_speed: f32) -> f32 {
    let speed = impact_speed.abs() * coefficient;
    if speed < min_speed { 0.0 } else { speed }
}

/// Clamp a horizontal position into `[min_x, max_x]`
#[inline]
pub fn clamp_to_bounds(x: f32, min_x: f32, max_x: f32) -> f32 {
    clamp_range(x, min_x, max_x)
}

/// Check a horizontal position against both walls
///
/// A hit requires the ball to be at or past a wall while moving into it; the
/// returned velocity always points back into the play area.
pub fn wall_collision(
    x: f32,
    velocity: f32,
    min_x: f32,
    max_x: f32,
    coefficient: f32,
) -> Option<WallHit> {
    if x <= min_x && velocity < 0.0 {
        Some(WallHit {
            wall: Wall::Left,
            x: min_x,
            velocity: velocity.abs() * coefficient,
        })
    } else if x >= max_x && velocity > 0.0 {
        Some(WallHit {
            wall: Wall::Right,
            x: max_x,
            velocity: -velocity.abs() * coefficient,
        })
    } else {
        None
    }
}
