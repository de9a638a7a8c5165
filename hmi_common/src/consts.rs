//! System-wide constants for the HMI workspace.
//!
//! Single source of truth for numeric limits and default names.

/// Maximum number of axes addressable through the pin namespace.
pub const MAX_AXES: usize = 9;

/// Number of axes mapped onto a teleop velocity vector (X, Y, Z, A, B, C).
pub const TELEOP_AXES: usize = 6;

/// Maximum number of configured MDI command pins.
pub const MAX_MDI_COMMANDS: usize = 64;

/// Maximum length of an MDI command line.
pub const MDI_LINE_LEN: usize = 255;

/// Maximum length of an error-channel message.
pub const ERROR_TEXT_LEN: usize = 255;

/// Prefix of every exported pin name.
pub const PIN_PREFIX: &str = "halui";

/// Default channel identifier shared by the controller and its clients.
pub const DEFAULT_CHANNEL_ID: &str = "emc";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hmi/hmi_bridge.toml";

/// Default service name.
pub const DEFAULT_SERVICE_NAME: &str = "hmi_bridge";

/// Debug mask bit that keeps channel diagnostics visible during connect.
pub const DEBUG_CHANNEL: u32 = 0x0000_0040;

/// Jog speeds on pins are per minute, controller velocities per second.
pub const SECONDS_PER_MINUTE: f64 = 60.0;
