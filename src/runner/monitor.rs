//! High-resolution precision monitor
//!
//! Runs its own copy of the physics at a finer step than the primary loop and
//! periodically checks it against the primary state. When the heights drift
//! apart by more than the tolerance, or the phases disagree, the monitor
//! adopts the primary's vertical motion. This is a periodic consistency
//! check, not lockstep: between checks the two evolve independently.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;

use super::{LoopEvent, Shared, Worker, nap, wall_time};
use crate::settings::{LoopConfig, PhysicsConfig, Termination};
use crate::sim::{Integrator, MotionState};

/// One monitor tick's report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSample {
    /// Height of the primary loop's state
    pub primary_height: f32,
    /// Monitor's own height estimate (after any resync)
    pub estimate: f32,
    /// This tick resynchronised to the primary
    pub resynced: bool,
}

/// Totals returned when the monitor stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub ticks: u64,
    pub resyncs: u64,
}

/// Fine-step physics shadowing the primary loop
#[derive(Debug)]
pub struct PrecisionMonitor {
    worker: Worker<MonitorStats>,
}

impl PrecisionMonitor {
    pub fn spawn(
        shared: Shared,
        physics: PhysicsConfig,
        timing: LoopConfig,
        events: Sender<LoopEvent>,
    ) -> std::io::Result<Self> {
        // The monitor never ends the run on its own
        let integrator = Integrator::new(PhysicsConfig {
            termination: Termination::Never,
            ..physics
        });
        let state = Arc::clone(&shared);
        let worker = Worker::spawn("precision-monitor", move |shutdown| {
            let mut tracker = Tracker::new(state.lock().motion, integrator, timing);
            while !shutdown.load(Ordering::Acquire) {
                nap(wall_time(timing.monitor_time_step, timing.pace), shutdown);
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                let sample = tracker.tick(&state);
                let _ = events.send(LoopEvent::Sample(sample));
            }
            tracker.stats
        })?;
        log::info!(
            "Precision monitor started (step {}s, reconcile every {} ticks)",
            timing.monitor_time_step,
            timing.reconcile_every
        );
        Ok(Self { worker })
    }

    /// Stop the monitor and collect its totals
    pub fn shutdown(mut self) -> MonitorStats {
        self.worker.request_stop();
        let stats = self.worker.join().unwrap_or_default();
        log::info!(
            "Precision monitor stopped after {} ticks ({} resyncs)",
            stats.ticks,
            stats.resyncs
        );
        stats
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

/// The monitor's private state, stepped without holding the lock
#[derive(Debug, Clone)]
pub struct Tracker {
    local: MotionState,
    integrator: Integrator,
    timing: LoopConfig,
    stats: MonitorStats,
}

impl Tracker {
    pub fn new(initial: MotionState, integrator: Integrator, timing: LoopConfig) -> Self {
        Self {
            local: initial,
            integrator,
            timing,
            stats: MonitorStats::default(),
        }
    }

    pub fn estimate(&self) -> &MotionState {
        &self.local
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Advance one fine step, then compare against the primary if due
    ///
    /// The lock is taken once, after the step, for a copy of the primary.
    pub fn tick(&mut self, shared: &Shared) -> MonitorSample {
        self.integrator
            .step(&mut self.local, self.timing.monitor_time_step);
        self.stats.ticks += 1;

        let primary = shared.lock().motion;
        // Follow the primary's pause and drag flags from here on
        self.local.paused = primary.paused;
        self.local.mode = primary.mode;

        let due = self.stats.ticks % u64::from(self.timing.reconcile_every.max(1)) == 0;
        let resynced = due && self.reconcile(&primary);

        MonitorSample {
            primary_height: primary.height,
            estimate: self.local.height,
            resynced,
        }
    }

    /// Adopt the primary's vertical motion if it has diverged
    pub fn reconcile(&mut self, primary: &MotionState) -> bool {
        let drift = (self.local.height - primary.height).abs();
        if drift > self.timing.monitor_tolerance || self.local.phase != primary.phase {
            log::debug!(
                "Monitor resync: drift {drift:.4} m, phase {:?} -> {:?}",
                self.local.phase,
                primary.phase
            );
            self.local.sync_vertical_from(primary);
            self.stats.resyncs += 1;
            true
        } else {
            false
        }
    }
}
