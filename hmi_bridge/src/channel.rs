//! Controller channel ownership and connection management.
//!
//! [`ChannelManager`] owns the Command, Status and Error channel handles.
//! `connect()` opens them in that order with a bounded retry budget and
//! `close()` releases them. Nothing reconnects automatically after startup.

use crate::error::{BridgeError, BridgeResult};
use crate::transport::{
    ChannelKind, CommandChannel, ErrorChannel, Peek, StatusChannel, Transport,
};
use hmi_common::command::CommandMessage;
use hmi_common::config::BridgeConfig;
use hmi_common::status::ErrorMessage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Lifecycle of the channel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Silences transport diagnostics while connect retries run.
pub trait DiagnosticsGate: Send + Sync {
    fn suppress(&self);
    fn restore(&self);
}

/// Gate that never silences anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGate;

impl DiagnosticsGate for NoopGate {
    fn suppress(&self) {}
    fn restore(&self) {}
}

/// Restores diagnostics when dropped.
struct Suppressed<'a> {
    gate: &'a dyn DiagnosticsGate,
}

impl<'a> Suppressed<'a> {
    fn new(gate: &'a dyn DiagnosticsGate) -> Self {
        gate.suppress();
        Self { gate }
    }
}

impl Drop for Suppressed<'_> {
    fn drop(&mut self) {
        self.gate.restore();
    }
}

/// Fixed-interval retry with a total budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub total: Duration,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            total: config.connect_retry_time(),
            interval: config.connect_retry_interval(),
        }
    }

    /// Single attempt, no sleeping.
    pub const fn once() -> Self {
        Self {
            total: Duration::ZERO,
            interval: Duration::ZERO,
        }
    }

    /// Whether another attempt fits after `waited` of sleeping.
    fn allows_retry(&self, waited: Duration) -> bool {
        !self.interval.is_zero() && waited + self.interval < self.total
    }
}

pub struct ChannelManager {
    transport: Box<dyn Transport>,
    retry: RetryPolicy,
    gate: Arc<dyn DiagnosticsGate>,
    /// False when the debug mask asks to keep diagnostics during connect.
    suppress_diagnostics: bool,
    command: Option<Box<dyn CommandChannel>>,
    status: Option<Box<dyn StatusChannel>>,
    error: Option<Box<dyn ErrorChannel>>,
    state: ChannelState,
}

impl ChannelManager {
    pub fn new(
        transport: Box<dyn Transport>,
        retry: RetryPolicy,
        gate: Arc<dyn DiagnosticsGate>,
        suppress_diagnostics: bool,
    ) -> Self {
        Self {
            transport,
            retry,
            gate,
            suppress_diagnostics,
            command: None,
            status: None,
            error: None,
            state: ChannelState::Disconnected,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Open all three channels, retrying within the configured budget.
    ///
    /// # Errors
    ///
    /// `BridgeError::Connection` if any channel is still missing when the
    /// budget runs out. Channels opened so far are released.
    pub fn connect(&mut self) -> BridgeResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.state = ChannelState::Connecting;

        let mut waited = Duration::ZERO;
        let mut attempts = 0u32;
        let gate = Arc::clone(&self.gate);
        let result = {
            let _quiet = self
                .suppress_diagnostics
                .then(|| Suppressed::new(gate.as_ref()));
            loop {
                attempts += 1;
                match self.open_missing() {
                    Ok(()) => break Ok(()),
                    Err(e) if self.retry.allows_retry(waited) => {
                        debug!(attempt = attempts, error = %e, "channel open failed, retrying");
                        std::thread::sleep(self.retry.interval);
                        waited += self.retry.interval;
                    }
                    Err(e) => break Err(e),
                }
            }
        };

        match result {
            Ok(()) => {
                self.state = ChannelState::Connected;
                info!(
                    transport = self.transport.name(),
                    attempts, "controller channels connected"
                );
                Ok(())
            }
            Err(e) => {
                self.release();
                self.state = ChannelState::Disconnected;
                error!(
                    transport = self.transport.name(),
                    attempts,
                    error = %e,
                    "controller channels not available"
                );
                Err(e)
            }
        }
    }

    fn open_missing(&mut self) -> BridgeResult<()> {
        for kind in ChannelKind::ALL {
            match kind {
                ChannelKind::Command if self.command.is_none() => {
                    self.command = Some(self.transport.open_command()?);
                }
                ChannelKind::Status if self.status.is_none() => {
                    self.status = Some(self.transport.open_status()?);
                }
                ChannelKind::Error if self.error.is_none() => {
                    self.error = Some(self.transport.open_error()?);
                }
                _ => continue,
            }
            debug!(channel = %kind, "channel open");
        }
        Ok(())
    }

    fn release(&mut self) {
        self.command = None;
        self.status = None;
        self.error = None;
    }

    /// Release every channel. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.release();
        self.state = ChannelState::Closed;
        info!(transport = self.transport.name(), "controller channels closed");
    }

    /// Write a serial-tagged command.
    ///
    /// # Errors
    ///
    /// `BridgeError::Connection` if the command channel is missing, invalid,
    /// or the write fails.
    pub fn write(&mut self, msg: &CommandMessage) -> BridgeResult<()> {
        let channel = self
            .command
            .as_mut()
            .filter(|c| c.is_valid())
            .ok_or_else(|| BridgeError::Connection("command channel is not valid".to_string()))?;
        channel
            .write(msg)
            .map_err(|e| BridgeError::Connection(e.to_string()))
    }

    pub fn peek_status(&mut self) -> Peek {
        match self.status.as_mut() {
            Some(channel) => channel.peek(),
            None => Peek::Error("status channel closed".to_string()),
        }
    }

    /// Next pending error-channel message; `None` when closed or empty.
    pub fn poll_error(&mut self) -> BridgeResult<Option<ErrorMessage>> {
        match self.error.as_mut() {
            Some(channel) => Ok(channel.poll()?),
            None => Ok(None),
        }
    }
}
