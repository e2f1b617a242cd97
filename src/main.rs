use std::process::ExitCode;

use color_eyre::{eyre::eyre, Result};
use joystick_bridge::config::BridgeConfig;
use joystick_bridge::controller::{run_bridge, PollSettings};
use joystick_bridge::device::{UinputGamepad, VirtualGamepad};
use joystick_bridge::sensor::{I2cBus, RppalBus};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    setup()?;

    let config = BridgeConfig::load()
        .map_err(|e| eyre!("Failed to load configuration: {}", e))?;
    info!("Starting joystick bridge with config: {:?}", config);

    // Listen before touching hardware so an early signal is not lost
    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone())?;

    let bus_number = config.i2c_bus;
    let spec = config.gamepad_spec();

    let report = run_bridge(
        PollSettings::from_config(&config),
        shutdown,
        || Ok(Box::new(RppalBus::open(bus_number)?) as Box<dyn I2cBus>),
        || Ok(Box::new(UinputGamepad::create(&spec)?) as Box<dyn VirtualGamepad>),
    )
    .await?;

    if report.is_clean() {
        info!("Exiting...");
    } else {
        error!("Exiting with {} failed cleanup steps", report.failures.len());
    }
    Ok(ExitCode::from(report.exit_code()))
}

fn spawn_signal_listener(shutdown: CancellationToken) -> Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (signals, received) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            if signals.send(name).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        if watch_signals(received, shutdown).await {
            std::process::exit(1);
        }
    });
    Ok(())
}

/// Cancel `shutdown` on the first signal. Returns `true` when a second one
/// arrives, meaning the caller should stop waiting for a clean shutdown.
async fn watch_signals(
    mut received: mpsc::UnboundedReceiver<&'static str>,
    shutdown: CancellationToken,
) -> bool {
    let Some(name) = received.recv().await else {
        return false;
    };
    info!("Received {}", name);
    shutdown.cancel();

    match received.recv().await {
        Some(name) => {
            warn!("Received {} during shutdown, exiting immediately", name);
            true
        }
        None => false,
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
