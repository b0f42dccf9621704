//! Console variant
//!
//! Prompts for a starting height, then runs the primary loop (1 s steps) next
//! to the precision monitor (0.1 s steps), printing both heights, a `Boom` per
//! floor contact and `End` once the rebound limit is reached.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use thiserror::Error;

use crate::consts::DEFAULT_HEIGHT;
use crate::runner::{LoopEvent, LoopExit, PrecisionMonitor, SharedState, SimulationLoop};
use crate::settings::Settings;
use crate::sim::{Integrator, SimEvent};

/// How often the reporter re-checks the stop flag while idle
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a typed height was rejected
#[derive(Debug, Error, PartialEq)]
pub enum HeightError {
    #[error("`{0}` is not a number")]
    NotANumber(String),
    #[error("height must be positive, got {0}")]
    NotPositive(f32),
}

/// Parse a starting height in metres
pub fn parse_initial_height(input: &str) -> Result<f32, HeightError> {
    let trimmed = input.trim();
    let height: f32 = trimmed
        .parse()
        .map_err(|_| HeightError::NotANumber(trimmed.to_string()))?;
    if !height.is_finite() {
        return Err(HeightError::NotANumber(trimmed.to_string()));
    }
    if height <= 0.0 {
        return Err(HeightError::NotPositive(height));
    }
    Ok(height)
}

/// Prompt on `out`, read one line from `input`, fall back to 100 m
pub fn prompt_initial_height<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<f32> {
    write!(out, "Enter initial height (m): ")?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    match parse_initial_height(&line) {
        Ok(height) => Ok(height),
        Err(e) => {
            log::warn!("Rejected initial height: {e}");
            match e {
                HeightError::NotPositive(_) => writeln!(
                    out,
                    "Initial height must be positive, using default {DEFAULT_HEIGHT} m"
                )?,
                HeightError::NotANumber(_) => {
                    writeln!(out, "Invalid input, using default {DEFAULT_HEIGHT} m")?
                }
            }
            Ok(DEFAULT_HEIGHT)
        }
    }
}

/// How a console run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Rebound limit reached
    Completed { rebound_count: u32 },
    /// Stopped by the user
    Interrupted,
}

/// Run the dual-rate simulation until it completes or `stop` is set
///
/// All output goes to `out` from the calling thread; the two loops only
/// publish events.
pub fn run<W: Write>(
    settings: &Settings,
    initial_height: f32,
    out: &mut W,
    stop: &AtomicBool,
) -> io::Result<Outcome> {
    let settings = Settings {
        initial_height,
        ..settings.clone()
    };
    let state = SharedState::new(&settings);
    writeln!(out, "Initial height: {:.2} m", state.motion.height)?;
    let shared = state.into_shared();

    let (tx, rx) = mpsc::channel();
    let monitor = PrecisionMonitor::spawn(
        Arc::clone(&shared),
        settings.physics,
        settings.timing,
        tx.clone(),
    )?;
    let sim = SimulationLoop::spawn(
        Arc::clone(&shared),
        Integrator::new(settings.physics),
        settings.timing.pace,
        tx,
    )?;

    let outcome = loop {
        if stop.load(Ordering::Acquire) {
            break Outcome::Interrupted;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(LoopEvent::Sample(sample)) => writeln!(
                out,
                "[primary] {:.2} m | [0.1s estimate] {:.4} m",
                sample.primary_height, sample.estimate
            )?,
            Ok(LoopEvent::Sim(SimEvent::GroundContact { .. })) => writeln!(out, "Boom")?,
            Ok(LoopEvent::Sim(_)) => {}
            Ok(LoopEvent::Finished(LoopExit::Completed { rebound_count })) => {
                break Outcome::Completed { rebound_count };
            }
            Ok(LoopEvent::Finished(LoopExit::Shutdown)) => break Outcome::Interrupted,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Outcome::Interrupted,
        }
    };

    sim.shutdown();
    monitor.shutdown();

    match outcome {
        Outcome::Completed { rebound_count } => {
            log::info!("Run completed after {rebound_count} rebounds");
            writeln!(out, "End")?;
        }
        Outcome::Interrupted => {
            log::info!("Run interrupted");
            writeln!(out, "Interrupted")?;
        }
    }
    out.flush()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Variant;

    #[test]
    fn test_parse_initial_height() {
        assert_eq!(parse_initial_height(" 42.5\n"), Ok(42.5));
        assert_eq!(
            parse_initial_height("abc"),
            Err(HeightError::NotANumber("abc".to_string()))
        );
        assert_eq!(parse_initial_height("-3"), Err(HeightError::NotPositive(-3.0)));
        assert_eq!(parse_initial_height("0"), Err(HeightError::NotPositive(0.0)));
        assert!(matches!(parse_initial_height("inf"), Err(HeightError::NotANumber(_))));
        assert!(matches!(parse_initial_height("NaN"), Err(HeightError::NotANumber(_))));
    }

    #[test]
    fn test_prompt_falls_back_to_default() {
        let mut out = Vec::new();
        let height = prompt_initial_height(&mut "oops\n".as_bytes(), &mut out).unwrap();
        assert_eq!(height, DEFAULT_HEIGHT);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Enter initial height (m): "));
        assert!(text.contains("Invalid input"));

        let mut out = Vec::new();
        let height = prompt_initial_height(&mut "-1\n".as_bytes(), &mut out).unwrap();
        assert_eq!(height, DEFAULT_HEIGHT);
        assert!(String::from_utf8(out).unwrap().contains("must be positive"));

        // Empty stdin behaves like bad input
        let mut out = Vec::new();
        let height = prompt_initial_height(&mut "".as_bytes(), &mut out).unwrap();
        assert_eq!(height, DEFAULT_HEIGHT);
    }

    #[test]
    fn test_prompt_accepts_valid_height() {
        let mut out = Vec::new();
        let height = prompt_initial_height(&mut "25\n".as_bytes(), &mut out).unwrap();
        assert_eq!(height, 25.0);
    }

    #[test]
    fn test_stop_flag_interrupts_run() {
        let settings = Settings::for_variant(Variant::Console);
        let stop = AtomicBool::new(true);
        let mut out = Vec::new();
        let outcome = run(&settings, 10.0, &mut out, &stop).unwrap();
        assert_eq!(outcome, Outcome::Interrupted);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Initial height: 10.00 m"));
        assert!(text.trim_end().ends_with("Interrupted"));
    }
}
