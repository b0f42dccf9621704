//! Grab-and-throw interaction
//!
//! While the pointer holds the ball, physics is suspended and the ball follows
//! the pointer at a fixed offset. On release the throw velocity comes from the
//! last sampled pointer segment only, not the whole gesture.

use std::time::Duration;

use glam::Vec2;

use super::state::{InteractionMode, MotionState, Phase};
use crate::settings::{DragConfig, Viewport};

/// An in-progress drag
#[derive(Debug, Clone, Copy, PartialEq)]
struct Gesture {
    /// Ball centre minus pointer at grab time (screen px)
    offset: Vec2,
    last_pos: Vec2,
    last_time: Duration,
}

/// Velocity handed to the ball on release
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throw {
    /// Screen-space velocity (y grows downward), after scaling and clamping
    pub velocity: Vec2,
    /// Release came too soon after the last sample; nothing was imparted
    pub tap: bool,
}

/// Turns pointer drags into throws
#[derive(Debug, Clone)]
pub struct DragEstimator {
    config: DragConfig,
    viewport: Viewport,
    gesture: Option<Gesture>,
}

impl DragEstimator {
    pub fn new(config: DragConfig, viewport: Viewport) -> Self {
        Self {
            config,
            viewport,
            gesture: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Screen position of the ball centre
    pub fn ball_center(&self, state: &MotionState) -> Vec2 {
        Vec2::new(state.x, self.viewport.ball_y(state.height))
    }

    /// Whether `pointer` lies on the ball
    pub fn hit_test(&self, state: &MotionState, pointer: Vec2) -> bool {
        pointer.distance(self.ball_center(state)) <= self.viewport.ball_radius
    }

    /// Grab the ball if the pointer is on it
    ///
    /// Returns false (and leaves the state alone) on a miss.
    pub fn begin(&mut self, state: &mut MotionState, pointer: Vec2, now: Duration) -> bool {
        if !self.hit_test(state, pointer) {
            return false;
        }
        self.gesture = Some(Gesture {
            offset: self.ball_center(state) - pointer,
            last_pos: pointer,
            last_time: now,
        });
        state.mode = InteractionMode::Dragged;
        state.vertical_speed = 0.0;
        state.phase = Phase::Falling;
        log::debug!("Drag started at ({:.0}, {:.0})", pointer.x, pointer.y);
        true
    }

    /// Move the held ball with the pointer and record the sample
    ///
    /// Returns false when no drag is in progress.
    pub fn update(&mut self, state: &mut MotionState, pointer: Vec2, now: Duration) -> bool {
        let Some(gesture) = self.gesture.as_mut() else {
            return false;
        };
        let center = pointer + gesture.offset;
        state.set_x(center.x);
        state.set_height(self.viewport.height_at(center.y));
        state.vertical_speed = 0.0;
        state.phase = Phase::Falling;
        gesture.last_pos = pointer;
        gesture.last_time = now;
        true
    }

    /// Let go of the ball, imparting the estimated throw
    ///
    /// Returns `None` when no drag is in progress.
    pub fn release(&mut self, state: &mut MotionState, pointer: Vec2, now: Duration) -> Option<Throw> {
        let gesture = self.gesture.take()?;
        let throw = self.estimate(gesture.last_pos, gesture.last_time, pointer, now);

        state.mode = InteractionMode::Free;
        state.horizontal_velocity = throw.velocity.x;
        // Screen y points down; the state's positive vertical is up
        state.set_vertical_velocity(-throw.velocity.y);

        if throw.tap {
            log::debug!("Drag released as a tap");
        } else {
            log::debug!(
                "Thrown with velocity ({:.2}, {:.2})",
                throw.velocity.x,
                throw.velocity.y
            );
        }
        Some(throw)
    }

    /// Abandon a drag without throwing (ball is left at rest where it is)
    pub fn cancel(&mut self, state: &mut MotionState) {
        if self.gesture.take().is_some() {
            state.mode = InteractionMode::Free;
            state.vertical_speed = 0.0;
            state.horizontal_velocity = 0.0;
            state.phase = Phase::Falling;
        }
    }

    /// Throw velocity for a pointer moving from `from` at `from_time` to `to` at `to_time`
    pub fn estimate(&self, from: Vec2, from_time: Duration, to: Vec2, to_time: Duration) -> Throw {
        let Some(elapsed) = to_time.checked_sub(from_time) else {
            return Throw {
                velocity: Vec2::ZERO,
                tap: true,
            };
        };
        let elapsed_ms = elapsed.as_micros() as f32 / 1000.0;
        if elapsed_ms <= self.config.min_sample_interval_ms || elapsed_ms <= 0.0 {
            return Throw {
                velocity: Vec2::ZERO,
                tap: true,
            };
        }

        let limit = self.config.max_speed.abs();
        let velocity = (to - from) / elapsed_ms * self.config.scale * self.config.gain;
        Throw {
            velocity: velocity.clamp(Vec2::splat(-limit), Vec2::splat(limit)),
            tap: false,
        }
    }
}
