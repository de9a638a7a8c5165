//! Display unit conversion.
//!
//! Pure, total functions. Combinations without a mapping pass the value
//! through unchanged.

use crate::config::{AngularUnits, LinearUnits};
use crate::status::{AngularProgramUnits, ProgramUnits};

pub const INCH_PER_MM: f64 = 1.0 / 25.4;
pub const CM_PER_MM: f64 = 0.1;
pub const RAD_PER_DEG: f64 = std::f64::consts::PI / 180.0;
pub const GRAD_PER_DEG: f64 = 100.0 / 90.0;

/// Convert a native linear value for display.
///
/// The value is first normalized to millimeters with `native_scale`
/// (native units per millimeter). `Custom` returns the raw value.
pub fn convert_linear(
    value: f64,
    native_scale: f64,
    program_units: ProgramUnits,
    mode: LinearUnits,
) -> f64 {
    let mm = value / native_scale;
    match mode {
        LinearUnits::Mm => mm,
        LinearUnits::Inch => mm * INCH_PER_MM,
        LinearUnits::Cm => mm * CM_PER_MM,
        LinearUnits::Auto => match program_units {
            ProgramUnits::Mm => mm,
            ProgramUnits::Inches => mm * INCH_PER_MM,
            ProgramUnits::Cm => mm * CM_PER_MM,
            ProgramUnits::Unknown => value,
        },
        LinearUnits::Custom => value,
    }
}

/// Convert a native angular value (degrees) for display.
pub fn convert_angular(value: f64, program_units: AngularProgramUnits, mode: AngularUnits) -> f64 {
    match mode {
        AngularUnits::Deg => value,
        AngularUnits::Rad => value * RAD_PER_DEG,
        AngularUnits::Grad => value * GRAD_PER_DEG,
        AngularUnits::Auto => match program_units {
            AngularProgramUnits::Deg => value,
            AngularProgramUnits::Rad => value * RAD_PER_DEG,
            AngularProgramUnits::Grad => value * GRAD_PER_DEG,
            AngularProgramUnits::Unknown => value,
        },
        AngularUnits::Custom => value,
    }
}
