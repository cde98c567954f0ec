//! Callgate traffic light demo
//!
//! Runs one animation for a few seconds, then cancels it:
//! - `normal`: right, left, center in turn
//! - `blink`: center lamp blinks
//! - `random`: three lamps animate independently (fan-out over nested coroutines)
//!
//! Usage: `traffic-light [normal|blink|random] [seconds]`. Set `RUST_LOG` to
//! `debug` to see the driver's spans.

mod light;
mod timer;

use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use light::TrafficLight;
use timer::Timer;

/// Real seconds per animation second
const TIME_SCALE: f64 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Normal,
    Blink,
    Random,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Mode::Normal),
            "blink" => Ok(Mode::Blink),
            "random" => Ok(Mode::Random),
            other => Err(format!(
                "unknown animation '{other}': expected normal, blink or random"
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let mode_arg = args.next().unwrap_or_else(|| "normal".to_string());
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(3);

    let mode: Mode = match mode_arg.parse() {
        Ok(mode) => mode,
        Err(err) => {
            error!(mode = %mode_arg, "{err}");
            return Err(err.into());
        }
    };

    let mut light = TrafficLight::new(Timer::new(Handle::current(), TIME_SCALE));
    match mode {
        Mode::Normal => light.anim_normal()?,
        Mode::Blink => light.anim_blink_center()?,
        Mode::Random => light.anim_random(rand::random())?,
    }
    info!(?mode, state = ?light.anim_state(), "animation started");

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    light.stop_anim();
    info!(panel = %light.panel(), "animation cancelled");
    Ok(())
}
