//! Prelude module for common re-exports.
//!
//! `use hmi_common::prelude::*;` brings in the types most bridge code needs.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    AngularUnits, ConfigError, ConfigLoader, HmiConfig, LinearUnits, LogLevel, SharedConfig,
    WaitPolicy,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_AXES, PIN_PREFIX};

// ─── Commands & Status ──────────────────────────────────────────────
pub use crate::command::{Command, CommandMessage, TeleopVector};
pub use crate::status::{
    AxisFlags, AxisStatus, ErrorKind, ErrorMessage, ExecState, InterpState, ProgramUnits,
    StatusSnapshot, TaskMode, TaskState, TrajMode,
};

// ─── Pins ───────────────────────────────────────────────────────────
pub use crate::pins::{InputPin, InputSample, OutputPins, PinValue};

// ─── Units ──────────────────────────────────────────────────────────
pub use crate::units::{convert_angular, convert_linear};
