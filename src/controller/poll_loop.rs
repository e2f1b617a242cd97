//! Poll loop - drives sampling, diffing and emission on a fixed period
//!
//! The loop is a typestate machine:
//!
//! ```text
//! Initializing ──► Running ──► Draining ──► Terminated
//!  open bus         tick        clear        release device,
//!  create device    every       indicators   then bus
//!  set indicators   period
//! ```
//!
//! Setup failures are fatal. Inside `Running` a failed read on either stick
//! skips the whole tick, and a failed write keeps the previously committed
//! state so the next tick retries the same diff.

use std::fmt;
use std::time::Duration;

use statum::{machine, state};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::controller::emitter;
use crate::controller::error::{BridgeError, CleanupFailure};
use crate::controller::scaler::AxisScaler;
use crate::controller::state::{ControllerState, StateDiffer};
use crate::device::{DeviceError, VirtualGamepad};
use crate::sensor::{
    light_indicators, read_stick, set_indicator, BusError, I2cBus, IndicatorColor,
};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

// Joystick type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoystickType {
    Left,
    Right,
}

impl fmt::Display for JoystickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoystickType::Left => f.write_str("left"),
            JoystickType::Right => f.write_str("right"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickSettings {
    pub stick: JoystickType,
    pub address: u16,
    pub color: IndicatorColor,
}

/// Settings for one bridge instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub left: StickSettings,
    pub right: StickSettings,
    pub poll_interval: Duration,
    pub scaler: AxisScaler,
}

impl PollSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            left: StickSettings {
                stick: JoystickType::Left,
                address: config.left_address,
                color: config.left_color,
            },
            right: StickSettings {
                stick: JoystickType::Right,
                address: config.right_address,
                color: config.right_color,
            },
            poll_interval: config.poll_interval(),
            scaler: config.scaler(),
        }
    }

    fn sticks(&self) -> [StickSettings; 2] {
        [self.left, self.right]
    }

    fn stick_at(&self, address: u16) -> JoystickType {
        if address == self.right.address {
            JoystickType::Right
        } else {
            JoystickType::Left
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sampled state matches the last emitted one
    Unchanged,
    Emitted { events: usize },
    /// A stick could not be read; nothing was emitted
    ReadSkipped,
    /// The device rejected the batch; state was kept
    EmitFailed,
}

/// Counters reported periodically while running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub batches: u64,
    pub events: u64,
    pub skipped_reads: u64,
    pub failed_writes: u64,
}

impl TickStats {
    fn record(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Unchanged => {}
            TickOutcome::Emitted { events } => {
                self.batches += 1;
                self.events += events as u64;
            }
            TickOutcome::ReadSkipped => self.skipped_reads += 1,
            TickOutcome::EmitFailed => self.failed_writes += 1,
        }
    }
}

/// Result of a complete shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub failures: Vec<CleanupFailure>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Process exit status: 0 after a clean shutdown, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }
}

// Define loop states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum LoopState {
    Initializing,
    Running,
    Draining,
    Terminated,
}

#[machine]
#[derive(Debug)]
pub struct PollLoop<S: LoopState> {
    // Declared before `bus` so it is always released first
    device: Box<dyn VirtualGamepad>,

    bus: Box<dyn I2cBus>,

    settings: PollSettings,

    // Last state the device accepted
    differ: StateDiffer,

    // Termination request, checked every tick
    shutdown: CancellationToken,

    stats: TickStats,

    cleanup_failures: Vec<CleanupFailure>,
}

// Implementation of methods available in all states
impl<S: LoopState> PollLoop<S> {
    pub fn controller_state(&self) -> &ControllerState {
        self.differ.current()
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl PollLoop<Initializing> {
    /// Acquire the bus, then the virtual device.
    pub fn open<B, D>(
        settings: PollSettings,
        shutdown: CancellationToken,
        open_bus: B,
        create_device: D,
    ) -> Result<Self, BridgeError>
    where
        B: FnOnce() -> Result<Box<dyn I2cBus>, BusError>,
        D: FnOnce() -> Result<Box<dyn VirtualGamepad>, DeviceError>,
    {
        info!("Initializing poll loop with settings: {:?}", settings);

        let bus = open_bus().map_err(|e| {
            error!("Failed to open I2C bus: {}", e);
            BridgeError::setup("opening the I2C bus", e)
        })?;

        let device = create_device().map_err(|e| {
            error!("Couldn't set up device: {}", e);
            BridgeError::setup("creating the virtual gamepad", e)
        })?;

        Ok(Self::new(
            device,
            bus,
            settings,
            StateDiffer::new(),
            shutdown,
            TickStats::default(),
            Vec::new(),
        ))
    }

    /// Light each stick's indicator so they can be told apart, then start.
    ///
    /// On failure the indicators already lit are switched back off.
    pub fn initialize(mut self) -> Result<PollLoop<Running>, BridgeError> {
        let indicators = self
            .settings
            .sticks()
            .map(|stick| (stick.address, stick.color));
        light_indicators(&mut *self.bus, &indicators).map_err(|e| {
            let stick = self.settings.stick_at(e.address());
            error!("Failed to set {} joystick indicator: {}", stick, e);
            BridgeError::setup(format!("setting the {} indicator", stick), e)
        })?;

        info!("Poll loop initialized, transitioning to Running state");
        Ok(self.transition())
    }
}

impl PollLoop<Running> {
    /// Tick until termination is requested.
    pub async fn run(mut self) -> PollLoop<Draining> {
        let shutdown = self.shutdown.clone();
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Starting poll loop every {:?}", self.settings.poll_interval);

        let mut window = TickStats::default();
        let mut last_report = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Termination requested, draining");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.tick();
                    window.record(outcome);

                    if last_report.elapsed() >= STATS_INTERVAL {
                        info!(
                            "Poll loop stats: {} ticks, {} batches ({} events), {} skipped reads, {} failed writes in last {} seconds",
                            window.ticks,
                            window.batches,
                            window.events,
                            window.skipped_reads,
                            window.failed_writes,
                            STATS_INTERVAL.as_secs()
                        );
                        window = TickStats::default();
                        last_report = Instant::now();
                    }
                }
            }
        }

        self.transition()
    }

    /// Sample both sticks and emit whatever changed.
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.poll_sticks();
        self.stats.record(outcome);
        outcome
    }

    fn poll_sticks(&mut self) -> TickOutcome {
        let left = match read_stick(&mut *self.bus, self.settings.left.address) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Couldn't read left joystick, skipping update: {}", e);
                return TickOutcome::ReadSkipped;
            }
        };
        let right = match read_stick(&mut *self.bus, self.settings.right.address) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Couldn't read right joystick, skipping update: {}", e);
                return TickOutcome::ReadSkipped;
            }
        };

        let incoming = ControllerState::from_samples(&self.settings.scaler, left, right);
        let changes = self.differ.diff(&incoming);

        match emitter::emit(&mut *self.device, changes, &incoming) {
            Ok(0) => TickOutcome::Unchanged,
            Ok(events) => {
                self.differ.commit(incoming);
                TickOutcome::Emitted { events }
            }
            Err(e) => {
                warn!("Couldn't update joystick state: {}", e);
                TickOutcome::EmitFailed
            }
        }
    }
}

impl PollLoop<Draining> {
    /// Switch both indicators off. Failures are recorded, not raised.
    pub fn drain(mut self) -> PollLoop<Terminated> {
        for stick in self.settings.sticks() {
            match set_indicator(&mut *self.bus, stick.address, IndicatorColor::OFF) {
                Ok(()) => debug!("Cleared {} joystick indicator", stick.stick),
                Err(e) => {
                    warn!("Failed to clear {} joystick indicator: {}", stick.stick, e);
                    self.cleanup_failures.push(CleanupFailure::new(
                        format!("clearing the {} indicator", stick.stick),
                        &e,
                    ));
                }
            }
        }

        self.transition()
    }
}

impl PollLoop<Terminated> {
    /// Release the device, then the bus.
    pub fn terminate(self) -> ShutdownReport {
        let PollLoop {
            device,
            bus,
            stats,
            cleanup_failures,
            ..
        } = self;

        drop(device);
        drop(bus);

        info!(
            "Poll loop terminated after {} ticks ({} batches emitted)",
            stats.ticks, stats.batches
        );
        for failure in &cleanup_failures {
            error!("Cleanup step failed: {}", failure);
        }

        ShutdownReport {
            failures: cleanup_failures,
        }
    }
}

/// Run the whole lifecycle until `shutdown` is cancelled.
pub async fn run_bridge<B, D>(
    settings: PollSettings,
    shutdown: CancellationToken,
    open_bus: B,
    create_device: D,
) -> Result<ShutdownReport, BridgeError>
where
    B: FnOnce() -> Result<Box<dyn I2cBus>, BusError>,
    D: FnOnce() -> Result<Box<dyn VirtualGamepad>, DeviceError>,
{
    let running = PollLoop::<Initializing>::open(settings, shutdown, open_bus, create_device)?
        .initialize()?;
    let report = running.run().await.drain().terminate();
    Ok(report)
}
