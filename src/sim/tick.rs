//! Fixed timestep integrator
//!
//! Semi-implicit Euler: velocity is updated before position every step.

use super::collision::{floor_rebound, wall_collision};
use super::state::{MotionState, Phase, SimEvent};
use crate::settings::{IntegrationOrder, PhysicsConfig};

/// Outcome of a single integrator step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// False when the step was skipped (paused, dragged or bad `dt`)
    pub advanced: bool,
    pub events: Vec<SimEvent>,
    /// The termination policy has been met
    pub terminated: bool,
}

impl TickReport {
    /// Number of floor contacts in this step (0 or 1)
    pub fn ground_contacts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SimEvent::GroundContact { .. }))
            .count()
    }
}

/// Advances a [`MotionState`] using injected physical constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    config: PhysicsConfig,
}

impl Integrator {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Vertical distance covered in one step at (already updated) speed `speed`
    #[inline]
    fn displacement(&self, speed: f32, dt: f32) -> f32 {
        match self.config.order {
            IntegrationOrder::FirstOrder => speed * dt,
            IntegrationOrder::SecondOrder => speed * dt - 0.5 * self.config.gravity * dt * dt,
        }
    }

    /// Advance the state by one fixed timestep
    ///
    /// Does nothing while the state is paused or dragged.
    pub fn step(&self, state: &mut MotionState, dt: f32) -> TickReport {
        let mut report = TickReport::default();

        if !dt.is_finite() || dt <= 0.0 {
            log::warn!("Ignoring step with invalid dt {dt}");
            report.terminated = self.config.termination.is_reached(state.rebound_count);
            return report;
        }
        if !state.is_integrating() {
            report.terminated = self.config.termination.is_reached(state.rebound_count);
            return report;
        }
        report.advanced = true;

        let g = self.config.gravity;

        // Vertical
        let new_height = match state.phase {
            Phase::Falling => {
                state.vertical_speed += g * dt;
                state.height - self.displacement(state.vertical_speed, dt)
            }
            Phase::Rising => {
                state.vertical_speed -= g * dt;
                state.height + self.displacement(state.vertical_speed, dt)
            }
        };

        if new_height <= 0.0 {
            let impact_speed = state.vertical_speed.abs();
            state.height = 0.0;
            state.phase = Phase::Rising;
            state.vertical_speed = floor_rebound(
                impact_speed,
                self.config.vertical_rebound,
                self.config.min_rebound_speed,
            );
            state.rebound_count += 1;
            report.events.push(SimEvent::GroundContact {
                rebound_count: state.rebound_count,
                impact_speed,
                rebound_speed: state.vertical_speed,
            });
        } else {
            state.height = new_height;
        }

        // Apex: upward motion used up
        if state.phase == Phase::Rising && state.vertical_speed <= 0.0 {
            state.phase = Phase::Falling;
            state.vertical_speed = 0.0;
            report.events.push(SimEvent::Apex {
                height: state.height,
            });
        }

        // Horizontal
        let x = state.x + state.horizontal_velocity * dt;
        match wall_collision(
            x,
            state.horizontal_velocity,
            state.min_x,
            state.max_x,
            self.config.horizontal_rebound,
        ) {
            Some(hit) => {
                state.x = hit.x;
                state.horizontal_velocity = hit.velocity;
                report.events.push(SimEvent::WallContact {
                    wall: hit.wall,
                    x: hit.x,
                });
            }
            None => state.set_x(x),
        }

        state.elapsed += dt;
        report.terminated = self.config.termination.is_reached(state.rebound_count);
        report
    }
}
