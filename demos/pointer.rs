//! Drive the pointer from the first paired remote, printing the commands
//! instead of moving a real cursor.
//!
//! Usage: cargo run --example pointer
//! Press Ctrl+C to stop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use wiimouse::{
    MemoryConfig, MouseDriver, PointerSink, Settings, SinkAction, Wiimote, WiimoteError,
};

/// Prints each command; stands in for a real OS-input sink.
struct PrintSink;

impl PointerSink for PrintSink {
    fn move_to(&mut self, x: f64, y: f64) -> wiimouse::Result<()> {
        println!("move_to   ({:.3}, {:.3})", x, y);
        Ok(())
    }

    fn move_by(&mut self, dx: f64, dy: f64) -> wiimouse::Result<()> {
        println!("move_by   ({:+.1}, {:+.1}) px", dx, dy);
        Ok(())
    }

    fn press(&mut self, action: &SinkAction) -> wiimouse::Result<()> {
        println!("action    {:?}", action);
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let config = Arc::new(MemoryConfig::new());
    let settings = Settings::load(config.as_ref());

    let wiimote = match Wiimote::open(settings) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Failed to open remote: {}", e);
            eprintln!("Press 1+2 on the remote to make it discoverable, then pair it.");
            std::process::exit(1);
        }
    };

    let states = wiimote.subscribe();
    println!("Connected. Extension: {:?}", wiimote.extension());

    let mut driver = MouseDriver::new(wiimote, Box::new(PrintSink), config);

    let start = Instant::now();
    let mut last_report = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        while let Ok(state) = states.try_recv() {
            println!(
                "--- connected={} reconnecting={} profile='{}' ---",
                state.connected, state.reconnecting, state.active_profile
            );
        }

        match driver.tick() {
            Ok(()) => ticks += 1,
            Err(WiimoteError::StreamStopped) => {
                println!("Stream stopped.");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }

        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(5) {
            let snap = driver.wiimote().snapshot();
            println!(
                "--- {} ticks in {:.0}s, mode={:?}, battery={}% ---",
                ticks,
                start.elapsed().as_secs_f64(),
                snap.effective_mode,
                snap.battery_percent
            );
            last_report = now;
        }
    }
}
