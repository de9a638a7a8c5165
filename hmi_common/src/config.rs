//! Configuration loading traits and types.
//!
//! The bridge reads one TOML file at startup. It is validated once and never
//! hot-reloaded.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hmi_common::config::{ConfigLoader, ConfigError, HmiConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = HmiConfig::load(Path::new("hmi_bridge.toml"))?;
//!     config.validate()?;
//!     println!("Channel: {}", config.bridge.channel_id);
//!     Ok(())
//! }
//! ```

use crate::consts::{DEFAULT_CHANNEL_ID, DEFAULT_SERVICE_NAME, MAX_AXES, MAX_MDI_COMMANDS};
use crate::consts::{DEBUG_CHANNEL, MDI_LINE_LEN};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common fields shared by every process in the workspace.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "hmi_bridge-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// How long a dispatch blocks after writing its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WaitPolicy {
    /// Fire and forget.
    None,
    /// Until the controller echoes the serial number.
    Received,
    /// Until the echoed command finishes (DONE) or fails (ERROR).
    #[default]
    Done,
}

/// Linear display unit selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinearUnits {
    /// Follow the active program units.
    #[default]
    Auto,
    Mm,
    Inch,
    Cm,
    /// Raw controller value, not normalized.
    Custom,
}

/// Angular display unit selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AngularUnits {
    /// Follow the active program angular units.
    #[default]
    Auto,
    Deg,
    Rad,
    Grad,
    /// Raw controller value.
    Custom,
}

/// `[bridge]` section: channel addressing, timing and dispatch behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Debug mask. Bit `DEBUG_CHANNEL` keeps transport diagnostics during connect.
    pub debug: u32,
    /// Shared identifier the controller channels are named after.
    pub channel_id: String,
    /// Sleep between bridge cycles.
    pub cycle_time_ms: u64,
    pub wait_policy: WaitPolicy,
    /// Seconds; 0 waits indefinitely.
    pub wait_timeout_s: f64,
    pub poll_interval_ms: u64,
    pub connect_retry_time_s: f64,
    pub connect_retry_interval_s: f64,
    /// Minimum change before a proportional pin is re-dispatched.
    pub override_epsilon: f64,
    /// Spindle speed used by forward/reverse when no speed is active.
    pub default_spindle_speed: f64,
    /// Cycles between statistics records; 0 disables them.
    pub stats_interval: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            debug: 0,
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            cycle_time_ms: 20,
            wait_policy: WaitPolicy::Done,
            wait_timeout_s: 0.0,
            poll_interval_ms: 100,
            connect_retry_time_s: 10.0,
            connect_retry_interval_s: 1.0,
            override_epsilon: 0.0001,
            default_spindle_speed: 500.0,
            stats_interval: 1000,
        }
    }
}

impl BridgeConfig {
    pub fn cycle_time(&self) -> Duration {
        Duration::from_millis(self.cycle_time_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Wait-policy timeout, `None` when waiting indefinitely.
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_s > 0.0).then(|| seconds(self.wait_timeout_s))
    }

    pub fn connect_retry_time(&self) -> Duration {
        seconds(self.connect_retry_time_s)
    }

    pub fn connect_retry_interval(&self) -> Duration {
        seconds(self.connect_retry_interval_s)
    }

    /// Whether channel diagnostics stay visible while connecting.
    pub fn channel_debug(&self) -> bool {
        self.debug & DEBUG_CHANNEL != 0
    }

    /// Validate ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` on an empty channel id, a zero
    /// period, a negative or non-finite value, or a duration too long for
    /// `Duration`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "bridge.channel_id cannot be empty".to_string(),
            ));
        }
        if self.cycle_time_ms == 0 {
            return Err(ConfigError::ValidationError(
                "bridge.cycle_time_ms must be > 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "bridge.poll_interval_ms must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("wait_timeout_s", self.wait_timeout_s),
            ("connect_retry_time_s", self.connect_retry_time_s),
            ("connect_retry_interval_s", self.connect_retry_interval_s),
            ("override_epsilon", self.override_epsilon),
            ("default_spindle_speed", self.default_spindle_speed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "bridge.{name} must be a finite value >= 0, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("wait_timeout_s", self.wait_timeout_s),
            ("connect_retry_time_s", self.connect_retry_time_s),
            ("connect_retry_interval_s", self.connect_retry_interval_s),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "bridge.{name} is out of range, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Seconds as a `Duration`, saturating instead of panicking on overflow.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// `[display]` section.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub linear_units: LinearUnits,
    pub angular_units: AngularUnits,
}

/// One `[[axes]]` entry. The axis index is its position in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// 0 inverts the jog direction.
    #[serde(default = "default_polarity")]
    pub jogging_polarity: u8,
}

fn default_polarity() -> u8 {
    1
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            jogging_polarity: default_polarity(),
        }
    }
}

impl AxisConfig {
    pub fn inverted(&self) -> bool {
        self.jogging_polarity == 0
    }
}

fn default_axes() -> Vec<AxisConfig> {
    vec![AxisConfig::default(); 6]
}

/// `[probe]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe move target used by `halui.probe.start`.
    pub target: [f64; 3],
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target: [0.0, 0.0, -10.0],
        }
    }
}

/// Complete bridge configuration file.
///
/// # TOML Example
///
/// ```toml
/// mdi_commands = ["G0 X0 Y0"]
///
/// [shared]
/// service_name = "hmi_bridge"
///
/// [bridge]
/// channel_id = "emc"
/// wait_policy = "received"
///
/// [[axes]]
/// jogging_polarity = 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmiConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default = "default_axes")]
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub mdi_commands: Vec<String>,
}

impl Default for HmiConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            bridge: BridgeConfig::default(),
            display: DisplayConfig::default(),
            axes: default_axes(),
            probe: ProbeConfig::default(),
            mdi_commands: Vec::new(),
        }
    }
}

impl HmiConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError::ValidationError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.bridge.validate()?;
        if self.axes.len() > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "at most {MAX_AXES} axes supported, got {}",
                self.axes.len()
            )));
        }
        if self.mdi_commands.len() > MAX_MDI_COMMANDS {
            return Err(ConfigError::ValidationError(format!(
                "at most {MAX_MDI_COMMANDS} mdi_commands supported, got {}",
                self.mdi_commands.len()
            )));
        }
        if let Some(line) = self.mdi_commands.iter().find(|l| l.len() > MDI_LINE_LEN) {
            return Err(ConfigError::ValidationError(format!(
                "mdi command longer than {MDI_LINE_LEN} bytes: {line:.32}..."
            )));
        }
        if self.probe.target.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::ValidationError(
                "probe.target must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of axes exposed through the pin namespace.
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from an in-memory TOML document.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
