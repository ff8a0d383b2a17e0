//! Replays a scripted gesture scenario and prints the effects the HUD controller emits.
//!
//! ```text
//! hud-replay <scenario.toml> [config.toml]
//! ```
//!
//! Set `RUST_LOG=debug` to follow the state transitions.
mod scenario;

use std::env;

use anyhow::{Result, bail};
use log::info;

use hud_gesture::HudConfig;

use scenario::Scenario;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(scenario_path) = args.next() else {
        bail!("Usage: hud-replay <scenario.toml> [config.toml]");
    };
    let config = match args.next() {
        Some(path) => HudConfig::load(&path)?,
        None => HudConfig::default(),
    };

    let scenario = Scenario::load(&scenario_path)?;
    info!(
        "Replaying {} events on {} elements",
        scenario.events.len(),
        scenario.elements.len()
    );

    for recorded in scenario.run(config)? {
        println!(
            "{:>6} ms  {:<16} {:?}",
            recorded.at_ms, recorded.effect.element, recorded.effect.effect
        );
    }
    Ok(())
}
