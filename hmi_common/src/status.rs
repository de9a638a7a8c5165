//! Controller status snapshot and error-channel messages.
//!
//! A [`StatusSnapshot`] is an owned copy of everything the controller
//! reports. Nothing in the bridge aliases controller memory; each refresh
//! replaces the whole value.

use crate::consts::{ERROR_TEXT_LEN, MAX_AXES};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Task execution state of the most recently echoed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExecState {
    #[default]
    Uninitialized,
    Done,
    Exec,
    Error,
}

/// Machine task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskState {
    #[default]
    Estop,
    EstopReset,
    Off,
    On,
}

/// Task run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskMode {
    #[default]
    Manual,
    Auto,
    Mdi,
}

/// Interpreter (program) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InterpState {
    #[default]
    Idle,
    Reading,
    Paused,
    Waiting,
}

impl InterpState {
    /// Reading and waiting both count as a running program.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Reading | Self::Waiting)
    }
}

/// Trajectory mode: independent axes, coordinated, or teleop vector jogging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TrajMode {
    #[default]
    Free,
    Coord,
    Teleop,
}

/// Linear units of the active program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProgramUnits {
    Inches,
    #[default]
    Mm,
    Cm,
    /// Anything the controller reports that has no display mapping.
    Unknown,
}

/// Angular units of the active program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AngularProgramUnits {
    #[default]
    Deg,
    Rad,
    Grad,
    Unknown,
}

bitflags! {
    /// Per-axis status flags reported by the controller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AxisFlags: u16 {
        const HOMED          = 0x0001;
        const HOMING         = 0x0002;
        const FAULT          = 0x0004;
        const MIN_SOFT_LIMIT = 0x0008;
        const MAX_SOFT_LIMIT = 0x0010;
        const MIN_HARD_LIMIT = 0x0020;
        const MAX_HARD_LIMIT = 0x0040;
        const ENABLED        = 0x0080;
    }
}

impl Default for AxisFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Status of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisStatus {
    pub flags: AxisFlags,
}

impl AxisStatus {
    pub const fn new(flags: AxisFlags) -> Self {
        Self { flags }
    }

    pub fn homed(&self) -> bool {
        self.flags.contains(AxisFlags::HOMED)
    }
}

/// Spindle rotation direction, sign of the commanded speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SpindleDirection {
    Reverse,
    #[default]
    Stopped,
    Forward,
}

/// Point-in-time copy of controller-reported state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatusSnapshot {
    /// Serial number of the most recent command the controller accepted.
    pub echo_serial_number: i32,
    pub state: ExecState,
    pub task_state: TaskState,
    pub task_mode: TaskMode,
    pub interp_state: InterpState,
    /// Open program file; empty when none is loaded.
    pub program_file: String,
    pub axes: heapless::Vec<AxisStatus, MAX_AXES>,
    pub tool_number: u16,
    /// Tool length offset in native units.
    pub tool_length_offset: f64,
    pub feed_scale: f64,
    pub spindle_scale: f64,
    pub spindle_speed: f64,
    pub spindle_direction: SpindleDirection,
    pub spindle_brake: bool,
    /// Active S word; sign ignored.
    pub active_spindle_setting: f64,
    pub mist: bool,
    pub flood: bool,
    pub lube: bool,
    pub probe_tripped: bool,
    /// Last probe position in native units.
    pub probe_value: f64,
    pub traj_mode: TrajMode,
    /// Native linear units per millimeter.
    pub linear_units: f64,
    pub program_units: ProgramUnits,
    pub program_angular_units: AngularProgramUnits,
}

impl StatusSnapshot {
    /// Idle controller with `axis_count` enabled axes.
    pub fn idle(axis_count: usize) -> Self {
        let mut axes = heapless::Vec::new();
        for _ in 0..axis_count.min(MAX_AXES) {
            // capacity checked by min()
            let _ = axes.push(AxisStatus::new(AxisFlags::ENABLED));
        }
        Self {
            state: ExecState::Done,
            axes,
            feed_scale: 1.0,
            spindle_scale: 1.0,
            linear_units: 1.0,
            ..Self::default()
        }
    }

    pub fn machine_on(&self) -> bool {
        self.task_state == TaskState::On
    }

    pub fn estop_reset(&self) -> bool {
        self.task_state != TaskState::Estop
    }

    pub fn program_open(&self) -> bool {
        !self.program_file.is_empty()
    }

    pub fn teleop(&self) -> bool {
        self.traj_mode == TrajMode::Teleop
    }

    pub fn spindle_on(&self) -> bool {
        self.spindle_speed != 0.0
    }

    pub fn axis(&self, index: usize) -> AxisStatus {
        self.axes.get(index).copied().unwrap_or_default()
    }

    /// Native linear units per millimeter, 1.0 when the controller has not
    /// reported a usable value.
    pub fn native_linear_scale(&self) -> f64 {
        if self.linear_units.is_finite() && self.linear_units > 0.0 {
            self.linear_units
        } else {
            1.0
        }
    }
}

/// Origin of an error-channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Operator,
    Text,
    Display,
    Nml,
}

/// Diagnostic message published on the error channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub kind: ErrorKind,
    pub text: heapless::String<ERROR_TEXT_LEN>,
}

impl ErrorMessage {
    /// Build a message, truncating `text` at a char boundary if it is too long.
    pub fn new(kind: ErrorKind, text: &str) -> Self {
        let mut out = heapless::String::new();
        for ch in text.chars() {
            if out.push(ch).is_err() {
                break;
            }
        }
        Self { kind, text: out }
    }
}
