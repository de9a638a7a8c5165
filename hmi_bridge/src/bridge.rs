//! Pin bridge cycle.
//!
//! One call to [`PinBridge::cycle`] runs four phases in order:
//!
//! 1. Input scan: momentary pins fire on a rising edge, jog pins are
//!    level-triggered, proportional pins fire when they move by more than
//!    the configured epsilon.
//! 2. Status refresh, keeping the last good snapshot on failure.
//! 3. Output mirroring as a pure function of that snapshot.
//! 4. Previous-value cache update for the next cycle's edge detection.
//!
//! Command failures are logged and counted; the cycle never stops on them.

use crate::dispatch::CommandDispatcher;
use crate::error::{BridgeError, BridgeResult};
use crate::pins::PinBus;
use crate::status::Freshness;
use hmi_common::command::{Command, TeleopVector};
use hmi_common::config::{AxisConfig, DisplayConfig, HmiConfig};
use hmi_common::consts::{MDI_LINE_LEN, SECONDS_PER_MINUTE};
use hmi_common::pins::{InputKind, InputPin, InputSample, JointPins, OutputPins, PinValue, input_pins};
use hmi_common::status::{AxisFlags, InterpState, StatusSnapshot, TaskMode, TaskState, TrajMode};
use hmi_common::units::convert_linear;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Error-channel messages surfaced per cycle at most.
pub const MAX_ERRORS_PER_CYCLE: usize = 8;

/// Bridge behaviour derived from the configuration file.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub axes: Vec<AxisConfig>,
    pub mdi_commands: Vec<heapless::String<MDI_LINE_LEN>>,
    pub probe_target: [f64; 3],
    pub display: DisplayConfig,
    pub override_epsilon: f64,
    pub default_spindle_speed: f64,
}

impl BridgeSettings {
    /// # Errors
    ///
    /// `BridgeError::InvalidArgument` if an MDI line does not fit a command.
    pub fn from_config(config: &HmiConfig) -> BridgeResult<Self> {
        let mdi_commands = config
            .mdi_commands
            .iter()
            .map(|line| {
                heapless::String::try_from(line.as_str()).map_err(|_| {
                    BridgeError::InvalidArgument(format!(
                        "mdi command longer than {MDI_LINE_LEN} bytes"
                    ))
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        Ok(Self {
            axes: config.axes.clone(),
            mdi_commands,
            probe_target: config.probe.target,
            display: config.display,
            override_epsilon: config.bridge.override_epsilon,
            default_spindle_speed: config.bridge.default_spindle_speed,
        })
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    fn inverted(&self, axis: u8) -> bool {
        self.axes
            .get(usize::from(axis))
            .is_some_and(AxisConfig::inverted)
    }
}

/// Input values as seen at the end of the previous cycle.
#[derive(Debug, Default)]
pub struct PinCache {
    values: HashMap<InputPin, PinValue>,
}

impl PinCache {
    fn previous_bit(&self, pin: InputPin) -> bool {
        self.values.get(&pin).is_some_and(PinValue::as_bit)
    }

    pub fn rising(&self, pin: InputPin, sample: &InputSample) -> bool {
        sample.bit(pin) && !self.previous_bit(pin)
    }

    pub fn falling(&self, pin: InputPin, sample: &InputSample) -> bool {
        !sample.bit(pin) && self.previous_bit(pin)
    }

    /// Record this cycle's values. Pins missing from the sample read as inactive.
    pub fn update(&mut self, pins: &[InputPin], sample: &InputSample) {
        for &pin in pins {
            let value = sample.get(pin).unwrap_or(match pin.kind() {
                InputKind::Float => PinValue::Float(0.0),
                InputKind::Momentary | InputKind::Level => PinValue::Bit(false),
            });
            self.values.insert(pin, value);
        }
    }

    pub fn get(&self, pin: InputPin) -> Option<PinValue> {
        self.values.get(&pin).copied()
    }
}

/// Axis currently under continuous jog.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JogTracker {
    pub active: Option<u8>,
}

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: u32,
    pub failed: u32,
    pub errors_surfaced: u32,
    pub status: Option<Freshness>,
    pub refresh_failed: bool,
    pub publish_failed: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Send(Command),
    /// Continuous jog start; the tracker follows only a successful dispatch.
    StartJog { axis: u8, command: Command },
    /// Needs the open-program check.
    RunProgram,
}

pub struct PinBridge {
    settings: BridgeSettings,
    registered: Vec<InputPin>,
    previous: PinCache,
    jog: JogTracker,
    last_feed_override: f64,
    last_spindle_override: f64,
    refresh_failing: bool,
}

impl PinBridge {
    pub fn new(settings: BridgeSettings) -> Self {
        let registered = input_pins(settings.axis_count(), settings.mdi_commands.len());
        debug!(pins = registered.len(), "input pins registered");
        Self {
            settings,
            registered,
            previous: PinCache::default(),
            jog: JogTracker::default(),
            last_feed_override: 0.0,
            last_spindle_override: 0.0,
            refresh_failing: false,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn registered_pins(&self) -> &[InputPin] {
        &self.registered
    }

    pub fn jog_tracker(&self) -> JogTracker {
        self.jog
    }

    pub fn previous(&self) -> &PinCache {
        &self.previous
    }

    /// Run one bridge cycle.
    pub fn cycle(
        &mut self,
        dispatcher: &mut CommandDispatcher,
        bus: &mut dyn PinBus,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        let sample = bus.sample();

        let actions = self.scan_inputs(&sample, dispatcher.snapshot());
        for (pin, action) in actions {
            let started = match action {
                Action::StartJog { axis, .. } => Some(axis),
                _ => None,
            };
            if execute(dispatcher, pin, action, &mut report) && started.is_some() {
                self.jog.active = started;
            }
        }

        surface_errors(dispatcher, &mut report);
        self.refresh_status(dispatcher, &mut report);

        let outputs = mirror_outputs(
            dispatcher.snapshot(),
            &self.settings.display,
            self.settings.axis_count(),
        );
        if let Err(e) = bus.publish(&outputs) {
            warn!(error = %e, "output pin publish failed");
            report.publish_failed = true;
        }

        self.previous.update(&self.registered, &sample);
        report
    }

    fn scan_inputs(
        &mut self,
        sample: &InputSample,
        snapshot: &StatusSnapshot,
    ) -> Vec<(InputPin, Action)> {
        let mut actions = Vec::new();
        for i in 0..self.registered.len() {
            let pin = self.registered[i];
            let action = match pin.kind() {
                InputKind::Momentary if self.previous.rising(pin, sample) => {
                    self.momentary_action(pin, sample, snapshot)
                }
                InputKind::Momentary => None,
                InputKind::Level => self.jog_action(pin, sample, snapshot),
                InputKind::Float => self.proportional_action(pin, sample),
            };
            if let Some(action) = action {
                actions.push((pin, action));
            }
        }
        actions
    }

    fn momentary_action(
        &self,
        pin: InputPin,
        sample: &InputSample,
        snapshot: &StatusSnapshot,
    ) -> Option<Action> {
        let spindle_speed = || {
            let active = snapshot.active_spindle_setting.abs();
            if active == 0.0 {
                self.settings.default_spindle_speed
            } else {
                active
            }
        };
        let [x, y, z] = self.settings.probe_target;

        let command = match pin {
            InputPin::MachineOn => Command::SetTaskState(TaskState::On),
            InputPin::MachineOff => Command::SetTaskState(TaskState::Off),
            InputPin::EstopActivate => Command::SetTaskState(TaskState::Estop),
            InputPin::EstopReset => Command::SetTaskState(TaskState::EstopReset),
            InputPin::ModeManual => Command::SetTaskMode(TaskMode::Manual),
            InputPin::ModeAuto => Command::SetTaskMode(TaskMode::Auto),
            InputPin::ModeMdi => Command::SetTaskMode(TaskMode::Mdi),
            InputPin::ModeTeleop => Command::SetTeleopEnable(true),
            InputPin::ModeJoint => Command::SetTeleopEnable(false),
            InputPin::MistOn => Command::MistOn,
            InputPin::MistOff => Command::MistOff,
            InputPin::FloodOn => Command::FloodOn,
            InputPin::FloodOff => Command::FloodOff,
            InputPin::LubeOn => Command::LubeOn,
            InputPin::LubeOff => Command::LubeOff,
            InputPin::ProgramRun => return Some(Action::RunProgram),
            InputPin::ProgramPause => Command::ProgramPause,
            InputPin::ProgramResume => Command::ProgramResume,
            InputPin::ProgramStep => Command::ProgramStep,
            InputPin::SpindleStart | InputPin::SpindleForward => Command::SpindleOn {
                speed: spindle_speed(),
            },
            InputPin::SpindleReverse => Command::SpindleOn {
                speed: -spindle_speed(),
            },
            InputPin::SpindleStop => Command::SpindleOff,
            InputPin::SpindleIncrease => Command::SpindleIncrease,
            InputPin::SpindleDecrease => Command::SpindleDecrease,
            InputPin::SpindleBrakeOn => Command::SpindleBrakeEngage,
            InputPin::SpindleBrakeOff => Command::SpindleBrakeRelease,
            InputPin::ProbeStart => Command::Probe { x, y, z },
            InputPin::ProbeClear => Command::ClearProbeTrippedFlag,
            InputPin::Abort => Command::TaskAbort,
            InputPin::JointHome(axis) => Command::Home { axis },
            InputPin::JogIncrementPlus(axis) => self.jog_increment(axis, 1.0, sample),
            InputPin::JogIncrementMinus(axis) => self.jog_increment(axis, -1.0, sample),
            InputPin::MdiCommand(n) => {
                let line = self.settings.mdi_commands.get(usize::from(n))?;
                Command::MdiExecute(line.clone())
            }
            InputPin::JogPlus(_)
            | InputPin::JogMinus(_)
            | InputPin::JogIncrement(_)
            | InputPin::JogSpeed
            | InputPin::FeedOverride
            | InputPin::SpindleOverride => return None,
        };
        Some(Action::Send(command))
    }

    fn jog_increment(&self, axis: u8, direction: f64, sample: &InputSample) -> Command {
        let mut velocity = direction * jog_speed(sample);
        if self.settings.inverted(axis) {
            velocity = -velocity;
        }
        Command::JogIncrement {
            axis,
            velocity,
            increment: sample.float(InputPin::JogIncrement(axis)),
        }
    }

    /// Continuous jog: start on entering 1, stop on leaving 1.
    ///
    /// Teleop jogs are a velocity vector without polarity. Releasing any jog
    /// pin in teleop sends the zero vector, since other axes may be moving.
    fn jog_action(
        &mut self,
        pin: InputPin,
        sample: &InputSample,
        snapshot: &StatusSnapshot,
    ) -> Option<Action> {
        let (axis, direction) = match pin {
            InputPin::JogPlus(axis) => (axis, 1.0),
            InputPin::JogMinus(axis) => (axis, -1.0),
            _ => return None,
        };

        if self.previous.rising(pin, sample) {
            let speed = direction * jog_speed(sample);
            let command = if snapshot.teleop() {
                Command::TeleopVector(TeleopVector::single_axis(axis, speed))
            } else {
                let velocity = if self.settings.inverted(axis) { -speed } else { speed };
                Command::JogContinuous { axis, velocity }
            };
            return Some(Action::StartJog { axis, command });
        }

        if self.previous.falling(pin, sample) {
            if self.jog.active == Some(axis) {
                self.jog.active = None;
            }
            let command = if snapshot.teleop() {
                Command::TeleopVector(TeleopVector::zero())
            } else {
                Command::JogStop { axis }
            };
            return Some(Action::Send(command));
        }
        None
    }

    /// Override pins. Negative values clamp to 0; jog speed only feeds jogs.
    fn proportional_action(&mut self, pin: InputPin, sample: &InputSample) -> Option<Action> {
        let last = match pin {
            InputPin::FeedOverride => &mut self.last_feed_override,
            InputPin::SpindleOverride => &mut self.last_spindle_override,
            _ => return None,
        };
        let value = sample.float(pin).max(0.0);
        if (value - *last).abs() <= self.settings.override_epsilon {
            return None;
        }
        *last = value;
        let command = match pin {
            InputPin::FeedOverride => Command::SetFeedScale(value),
            _ => Command::SetSpindleScale(value),
        };
        Some(Action::Send(command))
    }

    fn refresh_status(&mut self, dispatcher: &mut CommandDispatcher, report: &mut CycleReport) {
        match dispatcher.refresh() {
            Ok(freshness) => {
                if self.refresh_failing {
                    info!("status channel recovered");
                }
                self.refresh_failing = false;
                report.status = Some(freshness);
            }
            Err(e) => {
                if self.refresh_failing {
                    debug!(error = %e, "status refresh still failing");
                } else {
                    warn!(error = %e, "status refresh failed, keeping last snapshot");
                }
                self.refresh_failing = true;
                report.refresh_failed = true;
            }
        }
    }
}

/// Jog speed pin in units per second. Negative values clamp to 0.
fn jog_speed(sample: &InputSample) -> f64 {
    sample.float(InputPin::JogSpeed).max(0.0) / SECONDS_PER_MINUTE
}

/// Dispatch one action. Returns whether the controller accepted it.
fn execute(
    dispatcher: &mut CommandDispatcher,
    pin: InputPin,
    action: Action,
    report: &mut CycleReport,
) -> bool {
    let result = match action {
        Action::Send(command) | Action::StartJog { command, .. } => dispatcher.dispatch(command),
        Action::RunProgram => dispatcher.run_program(0),
    };
    match result {
        Ok(serial) => {
            report.dispatched += 1;
            debug!(pin = %pin, serial, "pin command dispatched");
            true
        }
        Err(e) => {
            report.failed += 1;
            warn!(pin = %pin, error = %e, "pin command failed");
            false
        }
    }
}

/// Log pending error-channel messages. They never drive control decisions.
fn surface_errors(dispatcher: &mut CommandDispatcher, report: &mut CycleReport) {
    for _ in 0..MAX_ERRORS_PER_CYCLE {
        match dispatcher.poll_error() {
            Ok(Some(msg)) => {
                warn!(kind = ?msg.kind, "controller: {}", msg.text);
                report.errors_surfaced += 1;
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "error channel read failed");
                break;
            }
        }
    }
}

/// Output pins for `snapshot`.
pub fn mirror_outputs(
    snapshot: &StatusSnapshot,
    display: &DisplayConfig,
    axis_count: usize,
) -> OutputPins {
    let linear = |value| {
        convert_linear(
            value,
            snapshot.native_linear_scale(),
            snapshot.program_units,
            display.linear_units,
        )
    };

    let mut outputs = OutputPins::safe_defaults(axis_count);
    for (n, joint) in outputs.joints.iter_mut().enumerate() {
        let flags = snapshot.axis(n).flags;
        *joint = JointPins {
            is_homed: flags.contains(AxisFlags::HOMED),
            has_fault: flags.contains(AxisFlags::FAULT),
            on_soft_min_limit: flags.contains(AxisFlags::MIN_SOFT_LIMIT),
            on_soft_max_limit: flags.contains(AxisFlags::MAX_SOFT_LIMIT),
            on_hard_min_limit: flags.contains(AxisFlags::MIN_HARD_LIMIT),
            on_hard_max_limit: flags.contains(AxisFlags::MAX_HARD_LIMIT),
        };
    }

    OutputPins {
        machine_is_on: snapshot.machine_on(),
        estop_is_reset: snapshot.estop_reset(),
        mode_is_manual: snapshot.task_mode == TaskMode::Manual,
        mode_is_auto: snapshot.task_mode == TaskMode::Auto,
        mode_is_mdi: snapshot.task_mode == TaskMode::Mdi,
        mode_is_teleop: snapshot.traj_mode == TrajMode::Teleop,
        mode_is_joint: snapshot.traj_mode == TrajMode::Free,
        mist_is_on: snapshot.mist,
        flood_is_on: snapshot.flood,
        lube_is_on: snapshot.lube,
        spindle_is_on: snapshot.spindle_on(),
        spindle_brake_is_on: snapshot.spindle_brake,
        program_is_idle: snapshot.interp_state == InterpState::Idle,
        program_is_running: snapshot.interp_state.is_running(),
        program_is_paused: snapshot.interp_state == InterpState::Paused,
        tool_number: snapshot.tool_number,
        tool_length_offset: linear(snapshot.tool_length_offset),
        probe_is_tripped: snapshot.probe_tripped,
        probe_has_value: linear(snapshot.probe_value),
        ..outputs
    }
}
