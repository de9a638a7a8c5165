//! Controller command vocabulary.
//!
//! Every controller operation is one [`Command`] variant carrying only its
//! own payload. The serial number is attached at dispatch time by wrapping
//! the command in a [`CommandMessage`].

use crate::consts::{MAX_AXES, MDI_LINE_LEN, TELEOP_AXES};
use crate::status::{TaskMode, TaskState};
use serde::{Deserialize, Serialize};

/// Six-component velocity vector used for teleop jogging.
///
/// Axis indices 0..6 map onto X, Y, Z, A, B, C.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TeleopVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl TeleopVector {
    pub const fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            a: 0.0,
            b: 0.0,
            c: 0.0,
        }
    }

    /// Vector with `velocity` on the component mapped to `axis`.
    ///
    /// Axes without a teleop component yield the zero vector.
    pub fn single_axis(axis: u8, velocity: f64) -> Self {
        let mut v = Self::zero();
        match axis {
            0 => v.x = velocity,
            1 => v.y = velocity,
            2 => v.z = velocity,
            3 => v.a = velocity,
            4 => v.b = velocity,
            5 => v.c = velocity,
            _ => {}
        }
        v
    }

    pub fn components(&self) -> [f64; TELEOP_AXES] {
        [self.x, self.y, self.z, self.a, self.b, self.c]
    }

    pub fn is_zero(&self) -> bool {
        self.components().iter().all(|c| *c == 0.0)
    }
}

/// One controller operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// No-op; used to restore the echoed serial on shutdown.
    Null,
    SetTaskState(TaskState),
    SetTaskMode(TaskMode),
    TaskAbort,
    TaskPlanInit,
    ProgramRun {
        line: i32,
    },
    ProgramPause,
    ProgramResume,
    ProgramStep,
    MdiExecute(heapless::String<MDI_LINE_LEN>),
    JogContinuous {
        axis: u8,
        velocity: f64,
    },
    JogIncrement {
        axis: u8,
        velocity: f64,
        increment: f64,
    },
    JogStop {
        axis: u8,
    },
    TeleopVector(TeleopVector),
    SetTeleopEnable(bool),
    Home {
        axis: u8,
    },
    AxisEnable {
        axis: u8,
    },
    AxisDisable {
        axis: u8,
    },
    AxisOverrideLimits {
        axis: u8,
    },
    SpindleOn {
        speed: f64,
    },
    SpindleOff,
    SpindleIncrease,
    SpindleDecrease,
    SpindleConstant,
    SpindleBrakeEngage,
    SpindleBrakeRelease,
    MistOn,
    MistOff,
    FloodOn,
    FloodOff,
    LubeOn,
    LubeOff,
    SetFeedScale(f64),
    SetSpindleScale(f64),
    ToolSetOffset {
        tool: u16,
        length: f64,
        diameter: f64,
    },
    Probe {
        x: f64,
        y: f64,
        z: f64,
    },
    ClearProbeTrippedFlag,
}

impl Command {
    /// Stable operation name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::SetTaskState(_) => "set_task_state",
            Self::SetTaskMode(_) => "set_task_mode",
            Self::TaskAbort => "task_abort",
            Self::TaskPlanInit => "task_plan_init",
            Self::ProgramRun { .. } => "program_run",
            Self::ProgramPause => "program_pause",
            Self::ProgramResume => "program_resume",
            Self::ProgramStep => "program_step",
            Self::MdiExecute(_) => "mdi_execute",
            Self::JogContinuous { .. } => "jog_continuous",
            Self::JogIncrement { .. } => "jog_increment",
            Self::JogStop { .. } => "jog_stop",
            Self::TeleopVector(_) => "teleop_vector",
            Self::SetTeleopEnable(_) => "set_teleop_enable",
            Self::Home { .. } => "home",
            Self::AxisEnable { .. } => "axis_enable",
            Self::AxisDisable { .. } => "axis_disable",
            Self::AxisOverrideLimits { .. } => "axis_override_limits",
            Self::SpindleOn { .. } => "spindle_on",
            Self::SpindleOff => "spindle_off",
            Self::SpindleIncrease => "spindle_increase",
            Self::SpindleDecrease => "spindle_decrease",
            Self::SpindleConstant => "spindle_constant",
            Self::SpindleBrakeEngage => "spindle_brake_engage",
            Self::SpindleBrakeRelease => "spindle_brake_release",
            Self::MistOn => "mist_on",
            Self::MistOff => "mist_off",
            Self::FloodOn => "flood_on",
            Self::FloodOff => "flood_off",
            Self::LubeOn => "lube_on",
            Self::LubeOff => "lube_off",
            Self::SetFeedScale(_) => "set_feed_scale",
            Self::SetSpindleScale(_) => "set_spindle_scale",
            Self::ToolSetOffset { .. } => "tool_set_offset",
            Self::Probe { .. } => "probe",
            Self::ClearProbeTrippedFlag => "clear_probe_tripped_flag",
        }
    }

    /// Axis index addressed by this command, if any.
    pub const fn axis(&self) -> Option<u8> {
        match self {
            Self::JogContinuous { axis, .. }
            | Self::JogIncrement { axis, .. }
            | Self::JogStop { axis }
            | Self::Home { axis }
            | Self::AxisEnable { axis }
            | Self::AxisDisable { axis }
            | Self::AxisOverrideLimits { axis } => Some(*axis),
            _ => None,
        }
    }

    /// Check payload ranges before a serial number is spent on the command.
    ///
    /// # Errors
    ///
    /// Returns a description of the first out-of-range field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(axis) = self.axis() {
            if usize::from(axis) >= MAX_AXES {
                return Err(format!("axis {axis} out of range (max {})", MAX_AXES - 1));
            }
        }
        match self {
            Self::SetFeedScale(scale) | Self::SetSpindleScale(scale)
                if !scale.is_finite() || *scale < 0.0 =>
            {
                Err(format!("{} scale must be finite and >= 0, got {scale}", self.name()))
            }
            Self::JogContinuous { velocity, .. } | Self::JogIncrement { velocity, .. }
                if !velocity.is_finite() =>
            {
                Err(format!("jog velocity must be finite, got {velocity}"))
            }
            Self::MdiExecute(line) if line.is_empty() => Err("empty mdi command".to_string()),
            _ => Ok(()),
        }
    }
}

/// A command tagged with its dispatch serial number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub serial: i32,
    pub command: Command,
}

impl CommandMessage {
    pub fn new(serial: i32, command: Command) -> Self {
        Self { serial, command }
    }
}
