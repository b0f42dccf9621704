//! Bounce Sim entry point
//!
//! Runs the console variant: asks for a height, then drops the ball. Type `q`
//! and Enter to stop early.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use bounce_sim::console;
use bounce_sim::settings::{Settings, Variant};

fn main() {
    env_logger::init();
    log::info!("Bounce Sim (console) starting...");

    let settings = Settings::load(Variant::Console);

    let stdout = io::stdout();
    let height = {
        let mut out = stdout.lock();
        match console::prompt_initial_height(&mut io::stdin().lock(), &mut out) {
            Ok(height) => height,
            Err(e) => {
                log::error!("Failed to read initial height: {e}");
                std::process::exit(1);
            }
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    spawn_quit_listener(Arc::clone(&stop));

    let mut out = stdout.lock();
    let _ = writeln!(out, "(type q and Enter to stop)");
    if let Err(e) = console::run(&settings, height, &mut out, &stop) {
        log::error!("Console run failed: {e}");
        std::process::exit(1);
    }
}

/// Watch stdin for a quit line; closing stdin does not stop the run
fn spawn_quit_listener(stop: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("quit-listener".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if matches!(line.trim(), "q" | "quit") {
                    stop.store(true, Ordering::Release);
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("No quit listener, run will stop only at the rebound limit: {e}");
    }
}
