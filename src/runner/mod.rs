//! Background timed loops
//!
//! The motion state lives in one [`SharedState`] behind a single
//! `parking_lot::Mutex`. Loops take the lock for one short critical section
//! per tick and never hold it while sleeping or sending events. Shutdown is
//! cooperative: an atomic flag checked at the top of every iteration.

pub mod monitor;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_TIME_STEP, MIN_TIME_STEP};
use crate::settings::{Settings, Termination};
use crate::sim::{Integrator, MotionState, SimEvent};

pub use monitor::{MonitorSample, MonitorStats, PrecisionMonitor};

/// Longest single sleep; bounds how long a shutdown request can go unseen
const NAP_SLICE: Duration = Duration::from_millis(20);

/// Everything guarded by the simulation lock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedState {
    pub motion: MotionState,
    /// Simulated seconds per primary tick
    pub time_step: f32,
    /// Height restored by a reset
    pub initial_height: f32,
    /// Horizontal velocity given on reset and spawn
    pub launch_velocity: f32,
}

/// Handle to the shared state used by every task
pub type Shared = Arc<Mutex<SharedState>>;

impl SharedState {
    pub fn new(settings: &Settings) -> Self {
        let mut motion = MotionState::new(
            settings.initial_height,
            settings.viewport.min_x(),
            settings.viewport.max_x(),
        );
        motion.horizontal_velocity = settings.physics.initial_horizontal_velocity;
        Self {
            motion,
            time_step: clamp_time_step(settings.timing.time_step),
            initial_height: motion.height,
            launch_velocity: settings.physics.initial_horizontal_velocity,
        }
    }

    /// Wrap in the lock shared by the loops and the presentation side
    pub fn into_shared(self) -> Shared {
        Arc::new(Mutex::new(self))
    }

    /// Change the time step by `delta`, clamped; returns the new step
    pub fn adjust_time_step(&mut self, delta: f32) -> f32 {
        self.time_step = clamp_time_step(self.time_step + delta);
        self.time_step
    }

    /// Back to the initial height with zeroed velocity, rebounds and time
    pub fn reset(&mut self) {
        self.motion.restart(self.initial_height, self.launch_velocity);
    }

    /// Relocate the ball and make that the new reset height
    pub fn spawn_at(&mut self, height: f32, x: f32) {
        self.motion.set_x(x);
        self.motion.restart(height, self.launch_velocity);
        self.initial_height = self.motion.height;
    }
}

/// Clamp into the adjustable range, snapped to hundredths to avoid drift
pub fn clamp_time_step(step: f32) -> f32 {
    if !step.is_finite() {
        return MIN_TIME_STEP;
    }
    let snapped = (step * 100.0).round() / 100.0;
    crate::clamp_range(snapped, MIN_TIME_STEP, MAX_TIME_STEP)
}

/// Observable state of the simulation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Stopped,
    Running,
    Paused,
}

/// Why a loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopExit {
    /// Shutdown was requested
    Shutdown,
    /// The termination policy was met
    Completed { rebound_count: u32 },
}

/// Messages published by the background loops
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopEvent {
    Sim(SimEvent),
    Sample(MonitorSample),
    Finished(LoopExit),
}

/// Sleep for `total`, waking early once `shutdown` is set
pub(crate) fn nap(total: Duration, shutdown: &AtomicBool) {
    if total.is_zero() {
        thread::yield_now();
        return;
    }
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::Acquire) {
        let slice = remaining.min(NAP_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
}

/// Wall-clock duration of `sim_seconds` at `pace`
pub(crate) fn wall_time(sim_seconds: f32, pace: f32) -> Duration {
    Duration::try_from_secs_f32(sim_seconds * pace).unwrap_or(Duration::ZERO)
}

/// A background thread with a cooperative stop flag
#[derive(Debug)]
pub(crate) struct Worker<T> {
    shutdown: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> Worker<T> {
    /// Spawn `body`, which must return once the flag it is given is set
    pub(crate) fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(&AtomicBool) -> T + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let finished = Arc::clone(&finished);
            thread::Builder::new().name(name.to_string()).spawn(move || {
                let result = body(&shutdown);
                finished.store(true, Ordering::Release);
                result
            })?
        };
        Ok(Self {
            shutdown,
            finished,
            handle: Some(handle),
        })
    }

    pub(crate) fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_none() || self.finished.load(Ordering::Acquire)
    }

    /// Wait for the thread; `None` if it panicked or was already joined
    pub(crate) fn join(&mut self) -> Option<T> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                log::error!("Background loop panicked");
                None
            }
        }
    }
}

impl<T> Drop for Worker<T> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Fixed-cadence physics thread
///
/// Calls the integrator once per `time_step` of simulated time, sleeping
/// `time_step * pace` wall-clock seconds between ticks. The integrator itself
/// skips ticks while the state is paused or dragged.
#[derive(Debug)]
pub struct SimulationLoop {
    shared: Shared,
    worker: Worker<LoopExit>,
    /// The integrator has a rebound limit, so the loop can end without help
    self_terminating: bool,
}

impl SimulationLoop {
    pub fn spawn(
        shared: Shared,
        integrator: Integrator,
        pace: f32,
        events: Sender<LoopEvent>,
    ) -> std::io::Result<Self> {
        let self_terminating = integrator.config().termination != Termination::Never;
        let state = Arc::clone(&shared);
        let worker = Worker::spawn("simulation", move |shutdown| {
            run_primary(&state, &integrator, pace, &events, shutdown)
        })?;
        log::info!("Simulation loop started");
        Ok(Self {
            shared,
            worker,
            self_terminating,
        })
    }

    pub fn state(&self) -> LoopState {
        if self.worker.is_finished() {
            LoopState::Stopped
        } else if self.shared.lock().motion.paused {
            LoopState::Paused
        } else {
            LoopState::Running
        }
    }

    pub fn resume(&self) {
        self.shared.lock().motion.paused = false;
    }

    /// Ask the loop to stop after its current tick
    pub fn request_shutdown(&self) {
        self.worker.request_stop();
    }

    /// Wait for the loop to end on its own (termination policy)
    ///
    /// A loop with [`Termination::Never`] has no end of its own, so it is asked
    /// to stop first and this returns [`LoopExit::Shutdown`].
    pub fn join(mut self) -> LoopExit {
        if !self.self_terminating {
            log::debug!("Joining a loop without a rebound limit; stopping it");
            self.worker.request_stop();
        }
        self.worker.join().unwrap_or(LoopExit::Shutdown)
    }

    /// Stop the loop and wait for it
    pub fn shutdown(mut self) -> LoopExit {
        self.worker.request_stop();
        let exit = self.worker.join().unwrap_or(LoopExit::Shutdown);
        log::info!("Simulation loop stopped: {exit:?}");
        exit
    }
}

fn run_primary(
    shared: &Shared,
    integrator: &Integrator,
    pace: f32,
    events: &Sender<LoopEvent>,
    shutdown: &AtomicBool,
) -> LoopExit {
    let exit = loop {
        if shutdown.load(Ordering::Acquire) {
            break LoopExit::Shutdown;
        }

        let (report, dt, rebound_count) = {
            let mut shared = shared.lock();
            let dt = shared.time_step;
            let report = integrator.step(&mut shared.motion, dt);
            (report, dt, shared.motion.rebound_count)
        };

        for event in report.events {
            if let SimEvent::GroundContact { rebound_count, .. } = event {
                log::debug!("Rebound {rebound_count}");
            }
            // Nobody listening is fine; the loop keeps running
            let _ = events.send(LoopEvent::Sim(event));
        }

        if report.terminated {
            break LoopExit::Completed { rebound_count };
        }

        nap(wall_time(dt, pace), shutdown);
    };

    let _ = events.send(LoopEvent::Finished(exit));
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Variant;
    use std::sync::mpsc;

    #[test]
    fn test_clamp_time_step() {
        assert_eq!(clamp_time_step(0.0), 0.01);
        assert_eq!(clamp_time_step(5.0), 1.0);
        assert_eq!(clamp_time_step(0.123), 0.12);
        assert_eq!(clamp_time_step(f32::NAN), 0.01);
    }

    #[test]
    fn test_adjust_time_step_walks_in_hundredths() {
        let mut shared = SharedState::new(&Settings::default());
        assert_eq!(shared.time_step, 0.1);
        for _ in 0..5 {
            shared.adjust_time_step(0.01);
        }
        assert_eq!(shared.time_step, 0.15);
        for _ in 0..200 {
            shared.adjust_time_step(-0.01);
        }
        assert_eq!(shared.time_step, 0.01);
        for _ in 0..200 {
            shared.adjust_time_step(0.01);
        }
        assert_eq!(shared.time_step, 1.0);
    }

    #[test]
    fn test_reset_and_spawn() {
        let mut settings = Settings::default();
        settings.physics.initial_horizontal_velocity = 5.0;
        let mut shared = SharedState::new(&settings);
        shared.motion.height = 3.0;
        shared.motion.rebound_count = 4;
        shared.motion.elapsed = 9.0;

        shared.reset();
        assert_eq!(shared.motion.height, 100.0);
        assert_eq!(shared.motion.rebound_count, 0);
        assert_eq!(shared.motion.elapsed, 0.0);
        assert_eq!(shared.motion.horizontal_velocity, 5.0);

        shared.spawn_at(40.0, 123.0);
        assert_eq!(shared.motion.height, 40.0);
        assert_eq!(shared.motion.x, 123.0);
        shared.motion.height = 1.0;
        shared.reset();
        assert_eq!(shared.motion.height, 40.0);
    }

    #[test]
    fn test_loop_completes_after_rebound_limit() {
        let mut settings = Settings::for_variant(Variant::Console);
        settings.physics.termination = Termination::AfterRebounds(2);
        let shared = SharedState::new(&settings).into_shared();
        let (tx, rx) = mpsc::channel();

        let sim = SimulationLoop::spawn(
            Arc::clone(&shared),
            Integrator::new(settings.physics),
            0.0,
            tx,
        )
        .unwrap();
        let exit = sim.join();
        assert_eq!(exit, LoopExit::Completed { rebound_count: 2 });

        let events: Vec<LoopEvent> = rx.try_iter().collect();
        let contacts = events
            .iter()
            .filter(|e| matches!(e, LoopEvent::Sim(SimEvent::GroundContact { .. })))
            .count();
        assert_eq!(contacts, 2);
        assert_eq!(events.last(), Some(&LoopEvent::Finished(exit)));
    }

    #[test]
    fn test_join_without_rebound_limit_returns() {
        let settings = Settings::for_variant(Variant::Interactive);
        assert_eq!(settings.physics.termination, Termination::Never);
        let shared = SharedState::new(&settings).into_shared();
        let (tx, _rx) = mpsc::channel();
        let sim = SimulationLoop::spawn(shared, Integrator::new(settings.physics), 1.0, tx).unwrap();

        let started = std::time::Instant::now();
        assert_eq!(sim.join(), LoopExit::Shutdown);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_paused_loop_does_not_advance() {
        let settings = Settings::default();
        let shared = SharedState::new(&settings).into_shared();
        shared.lock().motion.paused = true;
        let (tx, _rx) = mpsc::channel();

        let sim = SimulationLoop::spawn(
            Arc::clone(&shared),
            Integrator::new(settings.physics),
            0.01,
            tx,
        )
        .unwrap();
        assert_eq!(sim.state(), LoopState::Paused);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(shared.lock().motion.elapsed, 0.0);
        assert_eq!(shared.lock().motion.height, 100.0);

        sim.resume();
        assert_eq!(sim.state(), LoopState::Running);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while shared.lock().motion.elapsed == 0.0 {
            assert!(std::time::Instant::now() < deadline, "loop never ticked");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(sim.shutdown(), LoopExit::Shutdown);
    }

    #[test]
    fn test_shutdown_interrupts_long_sleep() {
        let settings = Settings::for_variant(Variant::Console);
        let shared = SharedState::new(&settings).into_shared();
        let (tx, _rx) = mpsc::channel();
        // One simulated second per tick at real-time pace
        let sim = SimulationLoop::spawn(shared, Integrator::new(settings.physics), 1.0, tx).unwrap();

        let started = std::time::Instant::now();
        assert_eq!(sim.shutdown(), LoopExit::Shutdown);
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
