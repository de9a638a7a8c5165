//! In-process simulated controller.
//!
//! Applies every received command to its own status snapshot and echoes the
//! serial number, so the bridge can run without a real controller. Tests use
//! the [`SimController`] handle to script acknowledgments and faults.

use super::{
    ChannelError, ChannelKind, CommandChannel, ErrorChannel, Peek, StatusChannel, Transport,
};
use hmi_common::command::{Command, CommandMessage};
use hmi_common::status::{
    AxisFlags, ErrorMessage, ExecState, InterpState, SpindleDirection, StatusSnapshot, TaskMode,
    TrajMode,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// How the simulated controller acknowledges commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckBehavior {
    /// Echo the serial and report DONE immediately.
    #[default]
    Complete,
    /// Echo the serial, report EXEC, then DONE after `polls` status peeks.
    CompleteAfter { polls: u32 },
    /// Echo the serial and stay in EXEC.
    Receive,
    /// Echo the serial and report ERROR.
    Fail,
    /// Never echo.
    Ignore,
}

#[derive(Debug)]
struct SimState {
    status: StatusSnapshot,
    /// Bumped on every status change; peeks compare against it.
    version: u64,
    ack: AckBehavior,
    polls_until_done: Option<u32>,
    received: Vec<CommandMessage>,
    failing_opens: u32,
    open_attempts: u32,
    command_valid: bool,
    unexpected: Option<u32>,
    fault: Option<String>,
    errors: VecDeque<ErrorMessage>,
}

impl SimState {
    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    fn apply(&mut self, msg: &CommandMessage) {
        let s = &mut self.status;
        match &msg.command {
            Command::SetTaskState(state) => s.task_state = *state,
            Command::SetTaskMode(mode) => s.task_mode = *mode,
            Command::TaskAbort => s.interp_state = InterpState::Idle,
            Command::ProgramRun { .. } if s.program_open() => {
                s.task_mode = TaskMode::Auto;
                s.interp_state = InterpState::Reading;
            }
            Command::ProgramPause | Command::ProgramStep => s.interp_state = InterpState::Paused,
            Command::ProgramResume => s.interp_state = InterpState::Reading,
            Command::MdiExecute(_) => s.task_mode = TaskMode::Mdi,
            Command::SetTeleopEnable(on) => {
                s.traj_mode = if *on { TrajMode::Teleop } else { TrajMode::Free };
            }
            Command::Home { axis } => set_axis_flag(s, *axis, AxisFlags::HOMED, true),
            Command::AxisEnable { axis } => set_axis_flag(s, *axis, AxisFlags::ENABLED, true),
            Command::AxisDisable { axis } => set_axis_flag(s, *axis, AxisFlags::ENABLED, false),
            Command::SpindleOn { speed } => {
                s.spindle_speed = *speed;
                s.spindle_direction = if *speed < 0.0 {
                    SpindleDirection::Reverse
                } else {
                    SpindleDirection::Forward
                };
                s.spindle_brake = false;
            }
            Command::SpindleOff => {
                s.spindle_speed = 0.0;
                s.spindle_direction = SpindleDirection::Stopped;
            }
            Command::SpindleBrakeEngage => s.spindle_brake = true,
            Command::SpindleBrakeRelease => s.spindle_brake = false,
            Command::MistOn => s.mist = true,
            Command::MistOff => s.mist = false,
            Command::FloodOn => s.flood = true,
            Command::FloodOff => s.flood = false,
            Command::LubeOn => s.lube = true,
            Command::LubeOff => s.lube = false,
            Command::SetFeedScale(scale) => s.feed_scale = *scale,
            Command::SetSpindleScale(scale) => s.spindle_scale = *scale,
            Command::ToolSetOffset { tool, length, .. } if *tool == s.tool_number => {
                s.tool_length_offset = *length;
            }
            Command::Probe { z, .. } => {
                s.probe_tripped = true;
                s.probe_value = *z;
            }
            Command::ClearProbeTrippedFlag => s.probe_tripped = false,
            _ => {}
        }

        self.polls_until_done = None;
        match self.ack {
            AckBehavior::Complete => self.echo(msg.serial, ExecState::Done),
            AckBehavior::CompleteAfter { polls } => {
                self.echo(msg.serial, ExecState::Exec);
                self.polls_until_done = Some(polls);
            }
            AckBehavior::Receive => self.echo(msg.serial, ExecState::Exec),
            AckBehavior::Fail => self.echo(msg.serial, ExecState::Error),
            AckBehavior::Ignore => {}
        }
        self.touch();
    }

    fn echo(&mut self, serial: i32, state: ExecState) {
        self.status.echo_serial_number = serial;
        self.status.state = state;
    }

    fn open(&mut self, kind: ChannelKind) -> Result<(), ChannelError> {
        self.open_attempts += 1;
        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return Err(ChannelError::Unavailable {
                kind,
                reason: "simulated controller not reachable".to_string(),
            });
        }
        Ok(())
    }
}

fn set_axis_flag(status: &mut StatusSnapshot, axis: u8, flag: AxisFlags, on: bool) {
    if let Some(a) = status.axes.get_mut(usize::from(axis)) {
        a.flags.set(flag, on);
    }
}

/// Shared handle to the simulated controller.
#[derive(Debug, Clone)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    /// Idle controller with `axis_count` axes and echo serial 0.
    pub fn new(axis_count: usize) -> Self {
        Self::with_status(StatusSnapshot::idle(axis_count))
    }

    pub fn with_status(status: StatusSnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                status,
                version: 1,
                ack: AckBehavior::default(),
                polls_until_done: None,
                received: Vec::new(),
                failing_opens: 0,
                open_attempts: 0,
                command_valid: true,
                unexpected: None,
                fault: None,
                errors: VecDeque::new(),
            })),
        }
    }

    pub fn transport(&self) -> SimTransport {
        SimTransport {
            controller: self.clone(),
        }
    }

    pub fn set_ack(&self, ack: AckBehavior) {
        self.state.lock().ack = ack;
    }

    /// Fail the next `count` channel open calls.
    pub fn fail_next_opens(&self, count: u32) {
        self.state.lock().failing_opens = count;
    }

    pub fn open_attempts(&self) -> u32 {
        self.state.lock().open_attempts
    }

    /// Make command writes fail as if the channel had gone away.
    pub fn set_command_valid(&self, valid: bool) {
        self.state.lock().command_valid = valid;
    }

    /// Deliver a non-status frame on the next status peek.
    pub fn inject_unexpected(&self, msg_type: u32) {
        self.state.lock().unexpected = Some(msg_type);
    }

    /// Report a transport fault on every status peek until cleared.
    pub fn set_fault(&self, fault: Option<&str>) {
        self.state.lock().fault = fault.map(str::to_string);
    }

    pub fn push_error(&self, msg: ErrorMessage) {
        self.state.lock().errors.push_back(msg);
    }

    /// Modify the published status as the controller would.
    pub fn update_status(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        let mut state = self.state.lock();
        f(&mut state.status);
        state.touch();
    }

    pub fn status(&self) -> StatusSnapshot {
        self.state.lock().status.clone()
    }

    /// Every command message received so far, in arrival order.
    pub fn received(&self) -> Vec<CommandMessage> {
        self.state.lock().received.clone()
    }

    pub fn last_received(&self) -> Option<CommandMessage> {
        self.state.lock().received.last().cloned()
    }

    pub fn clear_received(&self) {
        self.state.lock().received.clear();
    }
}

/// [`Transport`] backed by a [`SimController`].
pub struct SimTransport {
    controller: SimController,
}

impl SimTransport {
    pub fn controller(&self) -> &SimController {
        &self.controller
    }
}

impl Transport for SimTransport {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn open_command(&mut self) -> Result<Box<dyn CommandChannel>, ChannelError> {
        self.controller.state.lock().open(ChannelKind::Command)?;
        Ok(Box::new(SimCommandChannel {
            state: Arc::clone(&self.controller.state),
        }))
    }

    fn open_status(&mut self) -> Result<Box<dyn StatusChannel>, ChannelError> {
        self.controller.state.lock().open(ChannelKind::Status)?;
        Ok(Box::new(SimStatusChannel {
            state: Arc::clone(&self.controller.state),
            seen_version: 0,
        }))
    }

    fn open_error(&mut self) -> Result<Box<dyn ErrorChannel>, ChannelError> {
        self.controller.state.lock().open(ChannelKind::Error)?;
        Ok(Box::new(SimErrorChannel {
            state: Arc::clone(&self.controller.state),
        }))
    }
}

struct SimCommandChannel {
    state: Arc<Mutex<SimState>>,
}

impl CommandChannel for SimCommandChannel {
    fn write(&mut self, msg: &CommandMessage) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if !state.command_valid {
            return Err(ChannelError::Invalid(ChannelKind::Command));
        }
        state.received.push(msg.clone());
        state.apply(msg);
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.state.lock().command_valid
    }
}

struct SimStatusChannel {
    state: Arc<Mutex<SimState>>,
    seen_version: u64,
}

impl StatusChannel for SimStatusChannel {
    fn peek(&mut self) -> Peek {
        let mut state = self.state.lock();
        if let Some(fault) = &state.fault {
            return Peek::Error(fault.clone());
        }
        if let Some(msg_type) = state.unexpected.take() {
            return Peek::Other(msg_type);
        }
        if let Some(polls) = state.polls_until_done {
            if polls == 0 {
                state.polls_until_done = None;
                state.status.state = ExecState::Done;
                state.touch();
            } else {
                state.polls_until_done = Some(polls - 1);
            }
        }
        if state.version == self.seen_version {
            return Peek::NoData;
        }
        self.seen_version = state.version;
        Peek::Status(Box::new(state.status.clone()))
    }
}

struct SimErrorChannel {
    state: Arc<Mutex<SimState>>,
}

impl ErrorChannel for SimErrorChannel {
    fn poll(&mut self) -> Result<Option<ErrorMessage>, ChannelError> {
        Ok(self.state.lock().errors.pop_front())
    }
}
