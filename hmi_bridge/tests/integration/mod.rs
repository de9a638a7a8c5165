mod jogging;
mod pin_edges;
mod shm_transport;
mod shutdown;
mod startup;
mod wait_policy;

use hmi_bridge::channel::NoopGate;
use hmi_bridge::lifecycle::Lifecycle;
use hmi_bridge::pins::MemoryPinBus;
use hmi_bridge::transport::sim::SimController;
use hmi_common::command::Command;
use hmi_common::config::{ConfigLoader, HmiConfig};
use std::sync::Arc;

// ── Minimal config TOML ─────────────────────────────────────────────

/// Fast timing, three axes, axis 2 jogs inverted.
pub const BRIDGE_TOML: &str = r#"
mdi_commands = ["G0 X0 Y0", "G28"]

[shared]
service_name = "hmi_bridge-test"

[bridge]
channel_id = "itest"
cycle_time_ms = 1
wait_policy = "done"
wait_timeout_s = 0.05
poll_interval_ms = 1
connect_retry_time_s = 0.0
default_spindle_speed = 800.0

[display]
linear_units = "MM"

[[axes]]
jogging_polarity = 1

[[axes]]
jogging_polarity = 1

[[axes]]
jogging_polarity = 0

[probe]
target = [1.0, 2.0, -5.0]
"#;

pub struct Harness {
    pub sim: SimController,
    pub pins: MemoryPinBus,
    pub lifecycle: Lifecycle<MemoryPinBus>,
}

impl Harness {
    /// Started bridge against `sim` using [`BRIDGE_TOML`].
    pub fn start(sim: SimController) -> Self {
        Self::start_with(sim, HmiConfig::from_toml(BRIDGE_TOML).unwrap())
    }

    pub fn start_with(sim: SimController, config: HmiConfig) -> Self {
        let pins = MemoryPinBus::new();
        let mut lifecycle = Lifecycle::new(
            &config,
            Box::new(sim.transport()),
            Arc::new(NoopGate),
            pins.clone(),
        )
        .unwrap();
        lifecycle.startup().unwrap();
        sim.clear_received();
        Self {
            sim,
            pins,
            lifecycle,
        }
    }

    pub fn cycle(&mut self) -> hmi_bridge::bridge::CycleReport {
        self.lifecycle.run_cycle()
    }

    /// Commands the controller received, without serials.
    pub fn commands(&self) -> Vec<Command> {
        self.sim.received().into_iter().map(|m| m.command).collect()
    }
}
