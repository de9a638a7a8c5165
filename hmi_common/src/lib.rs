//! HMI Common Library
//!
//! Shared vocabulary for the HMI bridge workspace: everything that crosses
//! a process boundary (controller channels, pin segments) or is shared
//! between the transport and bridge crates lives here.
//!
//! # Module Structure
//!
//! - [`command`] - Controller command vocabulary and serial-tagged messages
//! - [`status`] - Controller status snapshot and error-channel messages
//! - [`pins`] - Pin namespace (input pins, output pins, pin frames)
//! - [`units`] - Display unit conversion
//! - [`wire`] - Frame codec used on every channel
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Workspace-wide limits and default names
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use hmi_common::prelude::*;
//!
//! let speed = convert_linear(25.4, 1.0, ProgramUnits::Mm, LinearUnits::Inch);
//! assert!((speed - 1.0).abs() < 1e-12);
//! ```

pub mod command;
pub mod config;
pub mod consts;
pub mod pins;
pub mod prelude;
pub mod status;
pub mod units;
pub mod wire;
