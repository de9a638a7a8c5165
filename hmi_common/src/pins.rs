//! Pin namespace exported to control surfaces.
//!
//! Input pins are written by panels and read by the bridge. Output pins are
//! written by the bridge from the latest status snapshot. Names are a stable
//! external contract (`halui.<subsystem>.<signal>`).

use crate::consts::{MAX_AXES, MAX_MDI_COMMANDS, PIN_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How a pin's samples are turned into commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// One command on a 0→1 transition.
    Momentary,
    /// Active while held; release produces a stop.
    Level,
    /// Continuous value, dispatched on change.
    Float,
}

/// Every input pin the bridge reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputPin {
    MachineOn,
    MachineOff,
    EstopActivate,
    EstopReset,
    ModeManual,
    ModeAuto,
    ModeMdi,
    ModeTeleop,
    ModeJoint,
    MistOn,
    MistOff,
    FloodOn,
    FloodOff,
    LubeOn,
    LubeOff,
    ProgramRun,
    ProgramPause,
    ProgramResume,
    ProgramStep,
    SpindleStart,
    SpindleStop,
    SpindleForward,
    SpindleReverse,
    SpindleIncrease,
    SpindleDecrease,
    SpindleBrakeOn,
    SpindleBrakeOff,
    ProbeStart,
    ProbeClear,
    Abort,
    JogSpeed,
    FeedOverride,
    SpindleOverride,
    JointHome(u8),
    JogPlus(u8),
    JogMinus(u8),
    JogIncrement(u8),
    JogIncrementPlus(u8),
    JogIncrementMinus(u8),
    MdiCommand(u8),
}

const FIXED_INPUTS: &[(InputPin, &str)] = &[
    (InputPin::MachineOn, "machine.on"),
    (InputPin::MachineOff, "machine.off"),
    (InputPin::EstopActivate, "estop.activate"),
    (InputPin::EstopReset, "estop.reset"),
    (InputPin::ModeManual, "mode.manual"),
    (InputPin::ModeAuto, "mode.auto"),
    (InputPin::ModeMdi, "mode.mdi"),
    (InputPin::ModeTeleop, "mode.teleop"),
    (InputPin::ModeJoint, "mode.joint"),
    (InputPin::MistOn, "mist.on"),
    (InputPin::MistOff, "mist.off"),
    (InputPin::FloodOn, "flood.on"),
    (InputPin::FloodOff, "flood.off"),
    (InputPin::LubeOn, "lube.on"),
    (InputPin::LubeOff, "lube.off"),
    (InputPin::ProgramRun, "program.run"),
    (InputPin::ProgramPause, "program.pause"),
    (InputPin::ProgramResume, "program.resume"),
    (InputPin::ProgramStep, "program.step"),
    (InputPin::SpindleStart, "spindle.start"),
    (InputPin::SpindleStop, "spindle.stop"),
    (InputPin::SpindleForward, "spindle.forward"),
    (InputPin::SpindleReverse, "spindle.reverse"),
    (InputPin::SpindleIncrease, "spindle.increase"),
    (InputPin::SpindleDecrease, "spindle.decrease"),
    (InputPin::SpindleBrakeOn, "spindle.brake-on"),
    (InputPin::SpindleBrakeOff, "spindle.brake-off"),
    (InputPin::ProbeStart, "probe.start"),
    (InputPin::ProbeClear, "probe.clear"),
    (InputPin::Abort, "abort"),
    (InputPin::JogSpeed, "jog-speed"),
    (InputPin::FeedOverride, "feed-override"),
    (InputPin::SpindleOverride, "spindle.override"),
];

impl InputPin {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::JogPlus(_) | Self::JogMinus(_) => InputKind::Level,
            Self::JogSpeed | Self::FeedOverride | Self::SpindleOverride | Self::JogIncrement(_) => {
                InputKind::Float
            }
            _ => InputKind::Momentary,
        }
    }

    /// Full exported name, e.g. `halui.jog.2.plus`.
    pub fn name(&self) -> String {
        let suffix = match self {
            Self::JointHome(n) => format!("joint.{n}.home"),
            Self::JogPlus(n) => format!("jog.{n}.plus"),
            Self::JogMinus(n) => format!("jog.{n}.minus"),
            Self::JogIncrement(n) => format!("jog.{n}.increment"),
            Self::JogIncrementPlus(n) => format!("jog.{n}.increment-plus"),
            Self::JogIncrementMinus(n) => format!("jog.{n}.increment-minus"),
            Self::MdiCommand(n) => format!("mdi-command-{n:02}"),
            fixed => FIXED_INPUTS
                .iter()
                .find(|(pin, _)| pin == fixed)
                .map(|(_, name)| (*name).to_string())
                .unwrap_or_default(),
        };
        format!("{PIN_PREFIX}.{suffix}")
    }
}

impl fmt::Display for InputPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Unknown or out-of-range pin name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pin: {0}")]
pub struct UnknownPin(pub String);

fn parse_index(s: &str, limit: usize) -> Option<u8> {
    let n: u8 = s.parse().ok()?;
    (usize::from(n) < limit).then_some(n)
}

impl FromStr for InputPin {
    type Err = UnknownPin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownPin(s.to_string());
        let rest = s
            .strip_prefix(PIN_PREFIX)
            .and_then(|r| r.strip_prefix('.'))
            .ok_or_else(unknown)?;

        if let Some((pin, _)) = FIXED_INPUTS.iter().find(|(_, name)| *name == rest) {
            return Ok(*pin);
        }
        if let Some(n) = rest.strip_prefix("mdi-command-") {
            return parse_index(n, MAX_MDI_COMMANDS)
                .map(Self::MdiCommand)
                .ok_or_else(unknown);
        }

        let mut parts = rest.splitn(3, '.');
        let (group, index, signal) = match (parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(i), Some(sig)) => (g, i, sig),
            _ => return Err(unknown()),
        };
        let axis = parse_index(index, MAX_AXES).ok_or_else(unknown)?;
        match (group, signal) {
            ("joint", "home") => Ok(Self::JointHome(axis)),
            ("jog", "plus") => Ok(Self::JogPlus(axis)),
            ("jog", "minus") => Ok(Self::JogMinus(axis)),
            ("jog", "increment") => Ok(Self::JogIncrement(axis)),
            ("jog", "increment-plus") => Ok(Self::JogIncrementPlus(axis)),
            ("jog", "increment-minus") => Ok(Self::JogIncrementMinus(axis)),
            _ => Err(unknown()),
        }
    }
}

/// Every input pin registered for the given axis and MDI command counts.
pub fn input_pins(axis_count: usize, mdi_count: usize) -> Vec<InputPin> {
    let mut pins: Vec<InputPin> = FIXED_INPUTS.iter().map(|(pin, _)| *pin).collect();
    for n in 0..axis_count.min(MAX_AXES) as u8 {
        pins.extend([
            InputPin::JointHome(n),
            InputPin::JogPlus(n),
            InputPin::JogMinus(n),
            InputPin::JogIncrement(n),
            InputPin::JogIncrementPlus(n),
            InputPin::JogIncrementMinus(n),
        ]);
    }
    for n in 0..mdi_count.min(MAX_MDI_COMMANDS) as u8 {
        pins.push(InputPin::MdiCommand(n));
    }
    pins
}

/// A sampled pin value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PinValue {
    Bit(bool),
    U16(u16),
    Float(f64),
}

impl PinValue {
    pub fn as_bit(&self) -> bool {
        match *self {
            Self::Bit(b) => b,
            Self::U16(v) => v != 0,
            Self::Float(v) => v != 0.0,
        }
    }

    pub fn as_float(&self) -> f64 {
        match *self {
            Self::Bit(b) => f64::from(u8::from(b)),
            Self::U16(v) => f64::from(v),
            Self::Float(v) => v,
        }
    }
}

/// One cycle's worth of input values. Absent pins read as inactive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSample {
    values: BTreeMap<InputPin, PinValue>,
}

impl InputSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, pin: InputPin, value: PinValue) {
        self.values.insert(pin, value);
    }

    pub fn get(&self, pin: InputPin) -> Option<PinValue> {
        self.values.get(&pin).copied()
    }

    pub fn bit(&self, pin: InputPin) -> bool {
        self.get(pin).is_some_and(|v| v.as_bit())
    }

    pub fn float(&self, pin: InputPin) -> f64 {
        self.get(pin).map_or(0.0, |v| v.as_float())
    }

    pub fn iter(&self) -> impl Iterator<Item = (InputPin, PinValue)> + '_ {
        self.values.iter().map(|(pin, value)| (*pin, *value))
    }

    /// Build a sample from named values; unknown names are returned separately.
    pub fn from_named(pins: &[NamedPin]) -> (Self, Vec<String>) {
        let mut sample = Self::new();
        let mut unknown = Vec::new();
        for pin in pins {
            match pin.name.parse::<InputPin>() {
                Ok(id) => sample.set(id, pin.value),
                Err(UnknownPin(name)) => unknown.push(name),
            }
        }
        (sample, unknown)
    }
}

/// Output pins of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JointPins {
    pub is_homed: bool,
    pub has_fault: bool,
    pub on_soft_min_limit: bool,
    pub on_soft_max_limit: bool,
    pub on_hard_min_limit: bool,
    pub on_hard_max_limit: bool,
}

/// Every output pin the bridge writes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputPins {
    pub machine_is_on: bool,
    pub estop_is_reset: bool,
    pub mode_is_manual: bool,
    pub mode_is_auto: bool,
    pub mode_is_mdi: bool,
    pub mode_is_teleop: bool,
    pub mode_is_joint: bool,
    pub mist_is_on: bool,
    pub flood_is_on: bool,
    pub lube_is_on: bool,
    pub spindle_is_on: bool,
    pub spindle_brake_is_on: bool,
    pub program_is_idle: bool,
    pub program_is_running: bool,
    pub program_is_paused: bool,
    pub joints: Vec<JointPins>,
    pub tool_number: u16,
    pub tool_length_offset: f64,
    pub probe_is_tripped: bool,
    pub probe_has_value: f64,
}

impl OutputPins {
    /// All outputs inactive, before any status has been mirrored.
    pub fn safe_defaults(axis_count: usize) -> Self {
        Self {
            joints: vec![JointPins::default(); axis_count.min(MAX_AXES)],
            ..Self::default()
        }
    }

    /// Flatten into exported names and values.
    pub fn to_named(&self) -> Vec<NamedPin> {
        let bit = |name: &str, v: bool| NamedPin::new(format!("{PIN_PREFIX}.{name}"), PinValue::Bit(v));
        let mut out = vec![
            bit("machine.is-on", self.machine_is_on),
            bit("estop.is-reset", self.estop_is_reset),
            bit("mode.is-manual", self.mode_is_manual),
            bit("mode.is-auto", self.mode_is_auto),
            bit("mode.is-mdi", self.mode_is_mdi),
            bit("mode.is-teleop", self.mode_is_teleop),
            bit("mode.is-joint", self.mode_is_joint),
            bit("mist.is-on", self.mist_is_on),
            bit("flood.is-on", self.flood_is_on),
            bit("lube.is-on", self.lube_is_on),
            bit("spindle.is-on", self.spindle_is_on),
            bit("spindle.brake-is-on", self.spindle_brake_is_on),
            bit("program.is-idle", self.program_is_idle),
            bit("program.is-running", self.program_is_running),
            bit("program.is-paused", self.program_is_paused),
            bit("probe.is-tripped", self.probe_is_tripped),
            NamedPin::new(
                format!("{PIN_PREFIX}.tool.number"),
                PinValue::U16(self.tool_number),
            ),
            NamedPin::new(
                format!("{PIN_PREFIX}.tool.length-offset"),
                PinValue::Float(self.tool_length_offset),
            ),
            NamedPin::new(
                format!("{PIN_PREFIX}.probe.has-value"),
                PinValue::Float(self.probe_has_value),
            ),
        ];
        for (n, joint) in self.joints.iter().enumerate() {
            out.extend([
                bit(&format!("joint.{n}.is-homed"), joint.is_homed),
                bit(&format!("joint.{n}.has-fault"), joint.has_fault),
                bit(&format!("joint.{n}.on-soft-min-limit"), joint.on_soft_min_limit),
                bit(&format!("joint.{n}.on-soft-max-limit"), joint.on_soft_max_limit),
                bit(&format!("joint.{n}.on-hard-min-limit"), joint.on_hard_min_limit),
                bit(&format!("joint.{n}.on-hard-max-limit"), joint.on_hard_max_limit),
            ]);
        }
        out
    }
}

/// Name/value pair as published in a pin frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPin {
    pub name: String,
    pub value: PinValue,
}

impl NamedPin {
    pub fn new(name: impl Into<String>, value: PinValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Body of a pin segment frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinFrame {
    pub pins: Vec<NamedPin>,
}
