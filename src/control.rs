//! Presentation boundary
//!
//! A window or terminal front end turns its raw input into [`Command`]s,
//! feeds them through [`Controller::drain`] once per frame, and draws from the
//! [`Snapshot`] it gets back. Every command touches the shared state inside a
//! single short critical section.

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::TIME_STEP_INCREMENT;
use crate::runner::Shared;
use crate::settings::{Settings, Viewport};
use crate::sim::{DragEstimator, Phase};

/// Discrete input from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePause,
    Pause,
    Resume,
    /// Show or hide the info overlay
    ToggleInfo,
    IncreaseTimeStep,
    DecreaseTimeStep,
    /// Back to the initial height with zeroed counters
    Reset,
    /// Pointer pressed; grabs the ball if it is under the pointer
    DragStart { pointer: Vec2, at: Duration },
    DragMove { pointer: Vec2, at: Duration },
    DragEnd { pointer: Vec2, at: Duration },
    /// Move the ball to the pointer and restart from there
    SpawnAt { pointer: Vec2 },
    Quit,
}

/// What applying a command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// Nothing to do (e.g. drag move with no drag in progress)
    Ignored,
    Quit,
}

/// Everything a frame needs to draw
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub height: f32,
    /// Vertical speed magnitude
    pub speed: f32,
    pub phase: Phase,
    pub horizontal_velocity: f32,
    pub elapsed: f32,
    pub rebound_count: u32,
    pub time_step: f32,
    pub paused: bool,
    pub dragging: bool,
    pub show_info: bool,
    /// Ball centre in screen pixels
    pub ball: Vec2,
}

/// Applies commands to the shared state on behalf of the presentation task
#[derive(Debug)]
pub struct Controller {
    shared: Shared,
    drag: DragEstimator,
    viewport: Viewport,
    show_info: bool,
}

impl Controller {
    pub fn new(shared: Shared, settings: &Settings) -> Self {
        Self {
            shared,
            drag: DragEstimator::new(settings.drag, settings.viewport),
            viewport: settings.viewport,
            show_info: true,
        }
    }

    pub fn show_info(&self) -> bool {
        self.show_info
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_active()
    }

    /// Apply one command
    pub fn apply(&mut self, command: Command) -> Applied {
        match command {
            Command::Quit => Applied::Quit,
            Command::ToggleInfo => {
                self.show_info = !self.show_info;
                Applied::Changed
            }
            other => self.apply_locked(other),
        }
    }

    fn apply_locked(&mut self, command: Command) -> Applied {
        let mut shared = self.shared.lock();
        match command {
            Command::TogglePause => {
                shared.motion.paused = !shared.motion.paused;
                log::info!("{}", if shared.motion.paused { "Paused" } else { "Resumed" });
            }
            Command::Pause | Command::Resume => {
                let paused = command == Command::Pause;
                if shared.motion.paused == paused {
                    return Applied::Ignored;
                }
                shared.motion.paused = paused;
            }
            Command::IncreaseTimeStep | Command::DecreaseTimeStep => {
                let delta = if command == Command::IncreaseTimeStep {
                    TIME_STEP_INCREMENT
                } else {
                    -TIME_STEP_INCREMENT
                };
                let before = shared.time_step;
                if shared.adjust_time_step(delta) == before {
                    return Applied::Ignored;
                }
                log::debug!("Time step {:.2}s", shared.time_step);
            }
            Command::Reset => {
                self.drag.cancel(&mut shared.motion);
                shared.reset();
                log::info!("Reset to {:.2} m", shared.initial_height);
            }
            Command::SpawnAt { pointer } => {
                self.drag.cancel(&mut shared.motion);
                let height = self.viewport.height_at(pointer.y);
                shared.spawn_at(height, pointer.x);
                log::info!(
                    "Spawned at x={:.0}, {:.2} m",
                    shared.motion.x,
                    shared.motion.height
                );
            }
            Command::DragStart { pointer, at } => {
                if !self.drag.begin(&mut shared.motion, pointer, at) {
                    return Applied::Ignored;
                }
            }
            Command::DragMove { pointer, at } => {
                if !self.drag.update(&mut shared.motion, pointer, at) {
                    return Applied::Ignored;
                }
            }
            Command::DragEnd { pointer, at } => {
                if self.drag.release(&mut shared.motion, pointer, at).is_none() {
                    return Applied::Ignored;
                }
            }
            // Handled without the lock
            Command::Quit | Command::ToggleInfo => return Applied::Ignored,
        }
        Applied::Changed
    }

    /// Apply a frame's worth of queued commands
    ///
    /// Stops at `Quit` and returns true; later commands are dropped.
    pub fn drain(&mut self, queue: impl IntoIterator<Item = Command>) -> bool {
        for command in queue {
            if self.apply(command) == Applied::Quit {
                return true;
            }
        }
        false
    }

    /// Copy out what the next frame draws
    pub fn snapshot(&self) -> Snapshot {
        let (motion, time_step) = {
            let shared = self.shared.lock();
            (shared.motion, shared.time_step)
        };
        Snapshot {
            height: motion.height,
            speed: motion.vertical_speed,
            phase: motion.phase,
            horizontal_velocity: motion.horizontal_velocity,
            elapsed: motion.elapsed,
            rebound_count: motion.rebound_count,
            time_step,
            paused: motion.paused,
            dragging: motion.is_dragged(),
            show_info: self.show_info,
            ball: Vec2::new(motion.x, self.viewport.ball_y(motion.height)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SharedState;
    use crate::sim::{InteractionMode, Integrator};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn controller() -> (Controller, Shared, Settings) {
        let settings = Settings::default();
        let shared = SharedState::new(&settings).into_shared();
        (Controller::new(shared.clone(), &settings), shared, settings)
    }

    #[test]
    fn test_pause_commands() {
        let (mut ctl, shared, _) = controller();
        assert_eq!(ctl.apply(Command::TogglePause), Applied::Changed);
        assert!(shared.lock().motion.paused);
        assert_eq!(ctl.apply(Command::Pause), Applied::Ignored);
        assert_eq!(ctl.apply(Command::Resume), Applied::Changed);
        assert!(!ctl.snapshot().paused);
    }

    #[test]
    fn test_info_toggle_is_local() {
        let (mut ctl, _, _) = controller();
        assert!(ctl.show_info());
        ctl.apply(Command::ToggleInfo);
        assert!(!ctl.snapshot().show_info);
    }

    #[test]
    fn test_time_step_clamps() {
        let (mut ctl, _, _) = controller();
        assert_eq!(ctl.apply(Command::IncreaseTimeStep), Applied::Changed);
        assert!((ctl.snapshot().time_step - 0.11).abs() < 1e-6);

        for _ in 0..20 {
            ctl.apply(Command::DecreaseTimeStep);
        }
        assert!((ctl.snapshot().time_step - 0.01).abs() < 1e-6);
        assert_eq!(ctl.apply(Command::DecreaseTimeStep), Applied::Ignored);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let (mut ctl, shared, settings) = controller();
        let integrator = Integrator::new(settings.physics);
        for _ in 0..100 {
            integrator.step(&mut shared.lock().motion, 0.1);
        }
        assert!(ctl.snapshot().elapsed > 0.0);

        ctl.apply(Command::Reset);
        let snap = ctl.snapshot();
        assert_eq!(snap.height, 100.0);
        assert_eq!(snap.speed, 0.0);
        assert_eq!(snap.rebound_count, 0);
        assert_eq!(snap.elapsed, 0.0);
    }

    #[test]
    fn test_spawn_at_pointer_rebases_reset() {
        let (mut ctl, _, settings) = controller();
        let pointer = Vec2::new(250.0, settings.viewport.ball_y(30.0));
        ctl.apply(Command::SpawnAt { pointer });
        let snap = ctl.snapshot();
        assert!((snap.height - 30.0).abs() < 1e-3);
        assert_eq!(snap.ball.x, 250.0);

        ctl.apply(Command::Reset);
        assert!((ctl.snapshot().height - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_drag_and_throw() {
        let (mut ctl, shared, _) = controller();
        let ball = ctl.snapshot().ball;

        assert_eq!(
            ctl.apply(Command::DragStart { pointer: ball + Vec2::new(100.0, 0.0), at: ms(0) }),
            Applied::Ignored
        );
        assert_eq!(
            ctl.apply(Command::DragStart { pointer: ball, at: ms(0) }),
            Applied::Changed
        );
        assert!(ctl.snapshot().dragging);

        ctl.apply(Command::DragMove { pointer: ball + Vec2::new(10.0, 0.0), at: ms(20) });
        ctl.apply(Command::DragEnd { pointer: ball + Vec2::new(20.0, 0.0), at: ms(40) });

        let motion = shared.lock().motion;
        assert_eq!(motion.mode, InteractionMode::Free);
        // 10 px over 20 ms = 0.5 px/ms * 500 * 1.5, capped at 30
        assert_eq!(motion.horizontal_velocity, 30.0);
        assert!(!ctl.is_dragging());
    }

    #[test]
    fn test_reset_cancels_drag() {
        let (mut ctl, _, _) = controller();
        let ball = ctl.snapshot().ball;
        ctl.apply(Command::DragStart { pointer: ball, at: ms(0) });
        ctl.apply(Command::Reset);
        assert!(!ctl.is_dragging());
        assert!(!ctl.snapshot().dragging);
        assert_eq!(
            ctl.apply(Command::DragMove { pointer: ball, at: ms(5) }),
            Applied::Ignored
        );
    }

    #[test]
    fn test_drain_stops_at_quit() {
        let (mut ctl, shared, _) = controller();
        let quit = ctl.drain([Command::TogglePause, Command::Quit, Command::TogglePause]);
        assert!(quit);
        assert!(shared.lock().motion.paused);
        assert!(!ctl.drain(Vec::new()));
    }
}
