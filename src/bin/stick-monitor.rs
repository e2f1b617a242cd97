//! Prints raw readings of both sticks without creating a virtual device.
//!
//! Useful for checking wiring, addresses and axis ranges before running the
//! bridge.

use std::io::{self, Write};
use std::process::ExitCode;

use color_eyre::{eyre::eyre, Result};
use joystick_bridge::config::BridgeConfig;
use joystick_bridge::sensor::{
    light_indicators, read_stick, set_indicator, IndicatorColor, RawStickSample, RppalBus,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn format_line(left: &RawStickSample, right: &RawStickSample) -> String {
    format!(
        "L: X {:+5} Y {:+5} B {}  R: X {:+5} Y {:+5} B {}",
        left.x,
        left.y,
        u8::from(left.pressed),
        right.x,
        right.y,
        u8::from(right.pressed)
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = BridgeConfig::load()
        .map_err(|e| eyre!("Failed to load configuration: {}", e))?;
    let mut bus = RppalBus::open(config.i2c_bus)
        .map_err(|e| eyre!("Failed to open I2C bus {}: {}", config.i2c_bus, e))?;

    let sticks = [
        (config.left_address, config.left_color),
        (config.right_address, config.right_color),
    ];
    light_indicators(&mut bus, &sticks)
        .map_err(|e| eyre!("Failed to set indicator: {}", e))?;

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut ticker = interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut stdout = io::stdout();
    loop {
        tokio::select! {
            biased;
            _ = interrupt.recv() => break,
            _ = terminate.recv() => break,
            _ = ticker.tick() => {
                let left = match read_stick(&mut bus, config.left_address) {
                    Ok(sample) => sample,
                    Err(e) => {
                        warn!("Couldn't read left joystick, skipping update: {}", e);
                        continue;
                    }
                };
                let right = match read_stick(&mut bus, config.right_address) {
                    Ok(sample) => sample,
                    Err(e) => {
                        warn!("Couldn't read right joystick, skipping update: {}", e);
                        continue;
                    }
                };
                write!(stdout, "\r{}", format_line(&left, &right))?;
                stdout.flush()?;
            }
        }
    }
    writeln!(stdout)?;

    let mut clean = true;
    for (address, _) in sticks {
        if let Err(e) = set_indicator(&mut bus, address, IndicatorColor::OFF) {
            warn!("Failed to clear indicator: {}", e);
            clean = false;
        }
    }

    info!("Exiting...");
    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
