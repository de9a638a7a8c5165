//! Serial-numbered command dispatch with wait policies.
//!
//! Every command goes through [`CommandDispatcher::dispatch_with`]: the serial
//! counter is advanced, the tagged message is written to the command channel
//! and the caller optionally blocks until the controller echoes the serial
//! (`Received`) or finishes the command (`Done`).
//!
//! Only one serial is ever awaited at a time. Under `WaitPolicy::None` the
//! next dispatch may overtake the controller.

use crate::channel::ChannelManager;
use crate::error::{BridgeError, BridgeResult};
use crate::status::{Freshness, StatusPoller};
use hmi_common::command::{Command, CommandMessage};
use hmi_common::config::{BridgeConfig, WaitPolicy};
use hmi_common::status::{ErrorMessage, ExecState, StatusSnapshot};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Command serial numbers. Counts attempts, not acknowledgments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialCounter(i32);

impl SerialCounter {
    pub const fn new(start: i32) -> Self {
        Self(start)
    }

    /// Advance by one and return the new serial.
    pub fn next(&mut self) -> i32 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }

    /// Most recently issued serial.
    pub const fn current(&self) -> i32 {
        self.0
    }

    pub fn set(&mut self, serial: i32) {
        self.0 = serial;
    }
}

/// Wait-policy parameters, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub policy: WaitPolicy,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl WaitSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            policy: config.wait_policy,
            timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

fn expired(timeout: Option<Duration>, started: Instant) -> bool {
    timeout.is_some_and(|t| started.elapsed() >= t)
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

/// Owns the channels, the status poller and the serial counter.
pub struct CommandDispatcher {
    channels: ChannelManager,
    poller: StatusPoller,
    serial: SerialCounter,
    wait: WaitSettings,
}

impl CommandDispatcher {
    pub fn new(channels: ChannelManager, wait: WaitSettings) -> Self {
        Self {
            channels,
            poller: StatusPoller::new(),
            serial: SerialCounter::default(),
            wait,
        }
    }

    pub fn connect(&mut self) -> BridgeResult<()> {
        self.channels.connect()
    }

    pub fn close(&mut self) {
        self.channels.close();
    }

    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    pub fn wait_settings(&self) -> WaitSettings {
        self.wait
    }

    /// Most recently issued serial.
    pub fn serial(&self) -> i32 {
        self.serial.current()
    }

    /// Reset the counter; the next dispatch uses `serial + 1`.
    pub fn set_serial(&mut self, serial: i32) {
        self.serial.set(serial);
    }

    pub fn refresh(&mut self) -> BridgeResult<Freshness> {
        self.poller.refresh(&mut self.channels)
    }

    /// Last good status snapshot.
    pub fn snapshot(&self) -> &StatusSnapshot {
        self.poller.snapshot()
    }

    pub fn poll_error(&mut self) -> BridgeResult<Option<ErrorMessage>> {
        self.channels.poll_error()
    }

    /// Dispatch under the configured wait policy.
    pub fn dispatch(&mut self, command: Command) -> BridgeResult<i32> {
        self.dispatch_with(command, self.wait.policy)
    }

    /// Dispatch under an explicit wait policy and return the serial used.
    ///
    /// # Errors
    ///
    /// - `BridgeError::InvalidArgument` if the payload is out of range; no
    ///   serial is spent and nothing is sent
    /// - `BridgeError::Connection` if the write fails; the serial is spent
    /// - `BridgeError::Timeout` / `BridgeError::Remote` from the wait
    pub fn dispatch_with(&mut self, command: Command, policy: WaitPolicy) -> BridgeResult<i32> {
        command.validate().map_err(BridgeError::InvalidArgument)?;

        let serial = self.serial.next();
        debug!(serial, command = command.name(), ?policy, "dispatch");
        self.write_raw(serial, command)?;

        match policy {
            WaitPolicy::None => {}
            WaitPolicy::Received => self.wait_received(serial)?,
            WaitPolicy::Done => self.wait_done(serial)?,
        }
        Ok(serial)
    }

    /// Write a message with an explicit serial, bypassing the counter.
    pub fn write_raw(&mut self, serial: i32, command: Command) -> BridgeResult<()> {
        self.channels.write(&CommandMessage::new(serial, command))
    }

    /// Block until the controller echoes `serial`.
    ///
    /// Refresh failures inside the loop are not fatal; the wait keeps polling
    /// until the echo shows up or the timeout expires.
    ///
    /// # Errors
    ///
    /// `BridgeError::Timeout` with stage `"received"`.
    pub fn wait_received(&mut self, serial: i32) -> BridgeResult<()> {
        self.wait_received_for(serial, self.wait.timeout)
    }

    /// [`wait_received`](Self::wait_received) with an explicit timeout.
    pub fn wait_received_for(&mut self, serial: i32, timeout: Option<Duration>) -> BridgeResult<()> {
        let started = Instant::now();
        loop {
            self.poll_once(serial);
            if self.poller.snapshot().echo_serial_number == serial {
                return Ok(());
            }
            if expired(timeout, started) {
                return Err(Self::timeout(serial, "received", started));
            }
            std::thread::sleep(self.wait.poll_interval);
        }
    }

    /// Block until the controller finishes `serial`.
    ///
    /// The done phase gets its own timeout budget after the echo arrives.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Timeout` with stage `"received"` or `"done"`
    /// - `BridgeError::Remote` if the controller reports ERROR first
    pub fn wait_done(&mut self, serial: i32) -> BridgeResult<()> {
        self.wait_received(serial)?;

        let started = Instant::now();
        loop {
            match self.poller.snapshot().state {
                ExecState::Done => return Ok(()),
                ExecState::Error => return Err(BridgeError::Remote { serial }),
                _ => {}
            }
            if expired(self.wait.timeout, started) {
                return Err(Self::timeout(serial, "done", started));
            }
            std::thread::sleep(self.wait.poll_interval);
            self.poll_once(serial);
        }
    }

    /// Run the open program from `line`.
    ///
    /// # Errors
    ///
    /// `BridgeError::InvalidArgument` when the latest status shows no open
    /// program; nothing is sent in that case.
    pub fn run_program(&mut self, line: i32) -> BridgeResult<i32> {
        if let Err(e) = self.refresh() {
            debug!(error = %e, "status refresh before program run failed");
        }
        if !self.poller.snapshot().program_open() {
            return Err(BridgeError::InvalidArgument(
                "no program file is open".to_string(),
            ));
        }
        self.dispatch(Command::ProgramRun { line })
    }

    fn poll_once(&mut self, serial: i32) {
        if let Err(e) = self.poller.refresh(&mut self.channels) {
            trace!(serial, error = %e, "status refresh failed while waiting");
        }
    }

    fn timeout(serial: i32, stage: &'static str, started: Instant) -> BridgeError {
        BridgeError::Timeout {
            serial,
            stage,
            waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
