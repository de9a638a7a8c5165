//! Startup sequencing, the cycle loop and the shutdown handshake.
//!
//! Startup connects the channels (fatal on failure), publishes safe output
//! defaults, reads the controller status once and adopts its echo serial as
//! the baseline. Shutdown waits for the last dispatched serial, then writes a
//! no-op carrying the baseline so the controller echoes what it echoed before
//! this process started. Other interface clients keep a consistent view.

use crate::bridge::{BridgeSettings, CycleReport, PinBridge};
use crate::channel::{ChannelManager, DiagnosticsGate, RetryPolicy};
use crate::dispatch::{CommandDispatcher, WaitSettings};
use crate::error::{BridgeError, BridgeResult};
use crate::pins::PinBus;
use crate::transport::Transport;
use hmi_common::command::Command;
use hmi_common::config::HmiConfig;
use hmi_common::pins::OutputPins;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Upper bound on the shutdown acknowledgment wait when dispatch waits are
/// unbounded.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(10);

/// Cycle timing and failure counters.
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub cycle_count: u64,
    pub max_cycle_us: u64,
    pub total_cycle_us: u64,
    /// Cycles that took longer than the configured cycle time.
    pub overruns: u64,
    pub dispatch_failures: u64,
    pub refresh_failures: u64,
}

impl CycleStats {
    pub fn record(&mut self, elapsed: Duration, budget: Duration, report: &CycleReport) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.cycle_count += 1;
        self.total_cycle_us = self.total_cycle_us.saturating_add(us);
        self.max_cycle_us = self.max_cycle_us.max(us);
        if elapsed > budget {
            self.overruns += 1;
        }
        self.dispatch_failures += u64::from(report.failed);
        if report.refresh_failed {
            self.refresh_failures += 1;
        }
    }

    pub fn avg_cycle_us(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.total_cycle_us / self.cycle_count
        }
    }
}

pub struct Lifecycle<B: PinBus> {
    dispatcher: CommandDispatcher,
    bridge: PinBridge,
    bus: B,
    running: Arc<AtomicBool>,
    baseline: Option<i32>,
    cycle_time: Duration,
    stats_interval: u64,
    stats: CycleStats,
    shut_down: bool,
}

impl<B: PinBus> Lifecycle<B> {
    /// Validate the configuration and assemble the bridge. Nothing is
    /// connected yet.
    ///
    /// # Errors
    ///
    /// `BridgeError::Config` or `BridgeError::InvalidArgument` on a bad
    /// configuration.
    pub fn new(
        config: &HmiConfig,
        transport: Box<dyn Transport>,
        gate: Arc<dyn DiagnosticsGate>,
        bus: B,
    ) -> BridgeResult<Self> {
        config.validate()?;

        let channels = ChannelManager::new(
            transport,
            RetryPolicy::from_config(&config.bridge),
            gate,
            !config.bridge.channel_debug(),
        );
        let dispatcher =
            CommandDispatcher::new(channels, WaitSettings::from_config(&config.bridge));
        let bridge = PinBridge::new(BridgeSettings::from_config(config)?);

        Ok(Self {
            dispatcher,
            bridge,
            bus,
            running: Arc::new(AtomicBool::new(false)),
            baseline: None,
            cycle_time: config.bridge.cycle_time(),
            stats_interval: config.bridge.stats_interval,
            stats: CycleStats::default(),
            shut_down: false,
        })
    }

    /// Flag that keeps [`run`](Self::run) looping; clear it to stop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Echo serial captured at startup.
    pub fn baseline(&self) -> Option<i32> {
        self.baseline
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut CommandDispatcher {
        &mut self.dispatcher
    }

    pub fn bridge(&self) -> &PinBridge {
        &self.bridge
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Connect, publish safe defaults and capture the baseline serial.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal; channels opened so far are closed again.
    pub fn startup(&mut self) -> BridgeResult<()> {
        info!(
            transport = self.dispatcher.channels().transport_name(),
            axes = self.bridge.settings().axis_count(),
            "starting bridge"
        );
        self.dispatcher.connect()?;

        if let Err(e) = self.capture_baseline() {
            error!(error = %e, "startup failed after connect");
            self.dispatcher.close();
            return Err(e);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn capture_baseline(&mut self) -> BridgeResult<()> {
        self.bus
            .publish(&OutputPins::safe_defaults(self.bridge.settings().axis_count()))?;
        self.dispatcher.refresh()?;

        let baseline = self.dispatcher.snapshot().echo_serial_number;
        self.dispatcher.set_serial(baseline);
        self.baseline = Some(baseline);
        info!(baseline, "controller status received");
        Ok(())
    }

    /// Run cycles until the running flag is cleared.
    ///
    /// # Errors
    ///
    /// `BridgeError::InvalidArgument` if called before a successful
    /// [`startup`](Self::startup).
    pub fn run(&mut self) -> BridgeResult<()> {
        if self.baseline.is_none() {
            return Err(BridgeError::InvalidArgument(
                "bridge loop started before startup".to_string(),
            ));
        }
        info!(cycle_time_ms = self.cycle_time.as_millis(), "bridge loop running");

        while self.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.run_cycle();
            let elapsed = started.elapsed();
            if elapsed < self.cycle_time {
                std::thread::sleep(self.cycle_time - elapsed);
            }
        }

        info!(
            cycles = self.stats.cycle_count,
            overruns = self.stats.overruns,
            dispatch_failures = self.stats.dispatch_failures,
            "bridge loop stopped"
        );
        Ok(())
    }

    /// One bridge cycle with statistics.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let report = self.bridge.cycle(&mut self.dispatcher, &mut self.bus);
        self.stats.record(started.elapsed(), self.cycle_time, &report);

        if self.stats_interval > 0 && self.stats.cycle_count % self.stats_interval == 0 {
            debug!(
                "cycle stats: {} cycles, avg={}us, max={}us, overruns={}, dispatch_failures={}, refresh_failures={}",
                self.stats.cycle_count,
                self.stats.avg_cycle_us(),
                self.stats.max_cycle_us,
                self.stats.overruns,
                self.stats.dispatch_failures,
                self.stats.refresh_failures
            );
        }
        report
    }

    /// Restore the baseline serial and release the channels.
    ///
    /// Safe to call more than once and before startup. Failures are logged
    /// and do not stop the handshake.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(baseline) = self.baseline {
            let last = self.dispatcher.serial();
            if last != baseline {
                let timeout = self
                    .dispatcher
                    .wait_settings()
                    .timeout
                    .unwrap_or(SHUTDOWN_WAIT);
                if let Err(e) = self.dispatcher.wait_received_for(last, Some(timeout)) {
                    warn!(serial = last, error = %e, "last command not acknowledged before shutdown");
                }
            }
            match self.dispatcher.write_raw(baseline, Command::Null) {
                Ok(()) => info!(baseline, "controller serial restored"),
                Err(e) => warn!(baseline, error = %e, "could not restore controller serial"),
            }
        }

        self.dispatcher.close();
        info!("bridge shut down");
    }
}

impl<B: PinBus> Drop for Lifecycle<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
