//! Proxy lifecycle and the forwarding loop
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Forwarding ──► (shutdown: actuator off, pad destroyed, grab released)
//!  source open      pad created
//!  actuator open    source grabbed
//! ```
//!
//! Everything runs on one task. Each loop iteration waits for the source or the
//! virtual pad to become readable, bounded by the tick interval, services both of
//! them and then ticks the rumble engine exactly once.

use std::future::Future;
use std::io;
use std::time::{Duration, Instant};
use statum::{machine, state};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{LoopConfig, ProxyConfig};
use crate::device::ff::FfRequestPort;
use crate::device::gpio::SysfsGpio;
use crate::device::source::SourceDevice;
use crate::device::stream::{next_event, ready_events, EventSink, EventSource, GrabbedSource};
use crate::device::virtual_pad::VirtualPad;
use crate::device::DeviceError;
use crate::proxy::control::handle_control_events;
use crate::rumble::actuator::Actuator;
use crate::rumble::effect_table::MAX_EFFECTS;
use crate::rumble::engine::RumbleEngine;

/// Events taken from one fd per iteration before the other gets its turn.
const MAX_EVENTS_PER_ITERATION: usize = 256;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Proxy reached Forwarding without a virtual pad")]
    MissingPad,

    #[error("Reading the source device failed: {0}")]
    Source(io::Error),

    #[error("Forwarding raw events failed: {0}")]
    Forward(io::Error),

    #[error("Reading force-feedback requests failed: {0}")]
    Control(io::Error),
}

/// Counters kept by the forwarding loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyStats {
    pub iterations: u64,
    pub events_forwarded: u64,
    pub control_messages: u64,
}

impl ProxyStats {
    fn since(&self, earlier: &ProxyStats) -> ProxyStats {
        ProxyStats {
            iterations: self.iterations - earlier.iterations,
            events_forwarded: self.events_forwarded - earlier.events_forwarded,
            control_messages: self.control_messages - earlier.control_messages,
        }
    }
}

// Proxy lifecycle states
#[state]
#[derive(Debug, Clone)]
pub enum ProxyState {
    Initializing,
    Forwarding,
}

#[machine]
#[derive(Debug)]
pub struct RumbleProxy<S: ProxyState> {
    config: ProxyConfig,

    // Physical pad, grabbed once initialized
    source: SourceDevice,

    // Created by initialize(); always Some in Forwarding
    pad: Option<VirtualPad>,

    engine: RumbleEngine<Box<dyn Actuator>>,
}

impl RumbleProxy<Initializing> {
    /// Opens the source device and the rumble actuator.
    ///
    /// A missing actuator only disables rumble; a missing source is fatal.
    pub fn create(config: ProxyConfig) -> Result<Self, ProxyError> {
        let source = SourceDevice::open(&config.source.path)?;
        let gpio = SysfsGpio::open(&config.actuator.path);
        if !gpio.is_connected() {
            warn!("Running without a rumble actuator");
        }
        Ok(Self::with_actuator(config, source, Box::new(gpio)))
    }

    pub fn with_actuator(
        config: ProxyConfig,
        source: SourceDevice,
        actuator: Box<dyn Actuator>,
    ) -> Self {
        debug!("Creating proxy with config: {:?}", config);
        let engine = RumbleEngine::new(config.rumble, actuator);
        Self::new(config, source, None, engine)
    }

    /// Grabs the source and creates the virtual pad.
    ///
    /// On failure the proxy is dropped, which releases any grab already taken.
    pub fn initialize(mut self) -> Result<RumbleProxy<Forwarding>, ProxyError> {
        info!(
            "Initializing proxy: {} -> '{}'",
            self.source.path().display(),
            self.config.virtual_device.name
        );

        self.source.grab()?;
        self.pad = Some(VirtualPad::create(
            &self.config.virtual_device,
            MAX_EFFECTS as u32,
        )?);

        info!("Proxy initialized, transitioning to Forwarding state");
        Ok(self.transition())
    }
}

impl RumbleProxy<Forwarding> {
    /// Runs the forwarding loop until `shutdown` is cancelled or an I/O error ends it.
    ///
    /// Cleanup runs on every exit path: the actuator is forced off, the virtual
    /// pad is destroyed and the source grab is released.
    pub async fn run(self, shutdown: CancellationToken) -> Result<ProxyStats, ProxyError> {
        let RumbleProxy {
            config,
            source,
            pad,
            mut engine,
            ..
        } = self;
        let pad = pad.ok_or(ProxyError::MissingPad)?;

        let result = serve(source, pad, &mut engine, &config.proxy, &shutdown).await;
        match &result {
            Ok(stats) => info!(
                "Proxy stopped after {} iterations ({} events forwarded, {} control messages)",
                stats.iterations, stats.events_forwarded, stats.control_messages
            ),
            Err(e) => error!("Proxy stopped with error: {}", e),
        }
        result
    }
}

/// Runs the loop, then tears down in order: actuator off, pad destroyed, grab released.
async fn serve<S, P, A>(
    mut source: S,
    mut pad: P,
    engine: &mut RumbleEngine<A>,
    settings: &LoopConfig,
    shutdown: &CancellationToken,
) -> Result<ProxyStats, ProxyError>
where
    S: GrabbedSource,
    P: EventSource + EventSink + FfRequestPort,
    A: Actuator,
{
    let result = forward_loop(&mut source, &mut pad, engine, settings, shutdown).await;

    engine.shutdown();
    drop(pad);
    source.release();
    result
}

async fn forward_loop<S, P, A>(
    source: &mut S,
    pad: &mut P,
    engine: &mut RumbleEngine<A>,
    settings: &LoopConfig,
    shutdown: &CancellationToken,
) -> Result<ProxyStats, ProxyError>
where
    S: EventSource,
    P: EventSource + EventSink + FfRequestPort,
    A: Actuator,
{
    let tick_interval = Duration::from_millis(settings.tick_interval_ms);
    let stats_interval = Duration::from_secs(settings.stats_interval_secs);
    info!(
        "Starting forwarding loop (tick {:?}, stats every {:?})",
        tick_interval, stats_interval
    );

    let mut stats = ProxyStats::default();
    let mut last_report = stats;
    let mut last_report_time = Instant::now();

    loop {
        let mut input = Vec::new();
        let mut requests = Vec::new();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {}

            event = next_event(&mut *source) => {
                input.push(event.map_err(ProxyError::Source)?);
            }

            event = next_event(&mut *pad) => {
                requests.push(event.map_err(ProxyError::Control)?);
            }

            _ = tokio::time::sleep(tick_interval) => {}
        }

        // whichever fd woke us, both are serviced before the tick
        input.extend(
            ready_events(&mut *source, MAX_EVENTS_PER_ITERATION)
                .await
                .map_err(ProxyError::Source)?,
        );
        if !input.is_empty() {
            pad.write_events(&input).map_err(ProxyError::Forward)?;
            stats.events_forwarded += input.len() as u64;
        }

        requests.extend(
            ready_events(&mut *pad, MAX_EVENTS_PER_ITERATION)
                .await
                .map_err(ProxyError::Control)?,
        );
        stats.control_messages += handle_control_events(&requests, &mut *pad, engine) as u64;

        engine.tick(Instant::now());
        stats.iterations += 1;

        if !stats_interval.is_zero() && last_report_time.elapsed() >= stats_interval {
            let window = stats.since(&last_report);
            info!(
                "Proxy stats: {} events forwarded, {} control messages in last {} seconds",
                window.events_forwarded,
                window.control_messages,
                stats_interval.as_secs()
            );
            if engine.actuator().failed_writes() > 0 {
                warn!(
                    "Actuator has failed {} writes so far",
                    engine.actuator().failed_writes()
                );
            }
            last_report = stats;
            last_report_time = Instant::now();
        }

        if shutdown.is_cancelled() {
            info!("Shutdown requested, leaving forwarding loop");
            break;
        }
    }

    Ok(stats)
}

/// Cancels `token` on SIGINT or SIGTERM.
pub fn spawn_shutdown_listener(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                None
            }
        };
        let terminated = async {
            match terminate.as_mut() {
                Some(stream) => stream.recv().await,
                None => None,
            }
        };

        wait_for_shutdown_signal(tokio::signal::ctrl_c(), terminated).await;
        token.cancel();
    })
}

/// Returns once either signal arrives.
///
/// A signal source that fails to register or closes never triggers a shutdown.
async fn wait_for_shutdown_signal<I, T>(interrupt: I, terminate: T)
where
    I: Future<Output = io::Result<()>>,
    T: Future<Output = Option<()>>,
{
    let interrupted = async move {
        match interrupt.await {
            Ok(()) => info!("Received SIGINT"),
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    let terminated = async move {
        match terminate.await {
            Some(()) => info!("Received SIGTERM"),
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = interrupted => {}
        _ = terminated => {}
    }
}
