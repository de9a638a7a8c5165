//! Integration test: startup sequence and status mirroring.
//!
//! Validates: connect with retry → safe defaults published → baseline serial
//! adopted → outputs follow the controller status and keep the last good
//! snapshot while the status channel fails.

use super::{BRIDGE_TOML, Harness};
use hmi_bridge::BridgeError;
use hmi_bridge::channel::NoopGate;
use hmi_bridge::lifecycle::Lifecycle;
use hmi_bridge::pins::MemoryPinBus;
use hmi_bridge::transport::sim::SimController;
use hmi_common::command::Command;
use hmi_common::config::{ConfigLoader, HmiConfig};
use hmi_common::pins::{InputPin, OutputPins};
use hmi_common::status::{AxisFlags, AxisStatus, InterpState, StatusSnapshot, TaskState};
use std::sync::Arc;

fn config() -> HmiConfig {
    HmiConfig::from_toml(BRIDGE_TOML).unwrap()
}

#[test]
fn config_loads_and_validates() {
    let cfg = config();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.axis_count(), 3);
    assert!(cfg.axes[2].inverted());
    assert_eq!(cfg.mdi_commands.len(), 2);
    assert_eq!(cfg.bridge.channel_id, "itest");
}

#[test]
fn baseline_serial_is_adopted() {
    let mut status = StatusSnapshot::idle(3);
    status.echo_serial_number = 1200;
    let mut h = Harness::start(SimController::with_status(status));

    assert_eq!(h.lifecycle.baseline(), Some(1200));
    assert_eq!(h.pins.outputs(), OutputPins::safe_defaults(3));

    h.pins.set_bit(InputPin::MistOn, true);
    h.cycle();
    let received = h.sim.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].serial, 1201);
    assert_eq!(received[0].command, Command::MistOn);
}

#[test]
fn connect_retries_until_controller_appears() {
    let mut cfg = config();
    cfg.bridge.connect_retry_time_s = 2.0;
    cfg.bridge.connect_retry_interval_s = 0.001;

    let sim = SimController::new(3);
    sim.fail_next_opens(4);
    let h = Harness::start_with(sim, cfg);
    assert!(h.lifecycle.is_running());
    // four failed opens, then command, status and error
    assert_eq!(h.sim.open_attempts(), 7);
}

#[test]
fn unreachable_controller_aborts_startup() {
    let sim = SimController::new(3);
    sim.fail_next_opens(u32::MAX);
    let pins = MemoryPinBus::new();
    let mut lc = Lifecycle::new(
        &config(),
        Box::new(sim.transport()),
        Arc::new(NoopGate),
        pins.clone(),
    )
    .unwrap();

    let err = lc.startup().unwrap_err();
    assert!(err.is_connection(), "unexpected error {err}");
    assert_eq!(pins.publish_count(), 0);
    assert!(matches!(lc.run(), Err(BridgeError::InvalidArgument(_))));
}

#[test]
fn invalid_config_is_rejected() {
    let mut cfg = config();
    cfg.bridge.channel_id.clear();
    let result = Lifecycle::new(
        &cfg,
        Box::new(SimController::new(1).transport()),
        Arc::new(NoopGate),
        MemoryPinBus::new(),
    );
    assert!(matches!(result, Err(BridgeError::Config(_))));
}

#[test]
fn outputs_follow_status() {
    let mut h = Harness::start(SimController::new(3));
    h.sim.update_status(|s| {
        s.task_state = TaskState::On;
        s.interp_state = InterpState::Reading;
        s.flood = true;
        s.tool_number = 3;
        s.tool_length_offset = 12.5;
        s.axes[0] = AxisStatus::new(AxisFlags::HOMED | AxisFlags::ENABLED);
        s.axes[2] = AxisStatus::new(AxisFlags::FAULT);
    });

    let report = h.cycle();
    assert!(!report.refresh_failed);
    let out = h.pins.outputs();
    assert!(out.machine_is_on && out.estop_is_reset);
    assert!(out.program_is_running && !out.program_is_idle);
    assert!(out.flood_is_on && !out.mist_is_on);
    assert_eq!(out.tool_number, 3);
    assert_eq!(out.tool_length_offset, 12.5);
    assert!(out.joints[0].is_homed);
    assert!(out.joints[2].has_fault && !out.joints[2].is_homed);
}

#[test]
fn failed_refresh_keeps_last_good_outputs() {
    let mut h = Harness::start(SimController::new(3));
    h.sim.update_status(|s| s.task_state = TaskState::On);
    h.cycle();
    assert!(h.pins.outputs().machine_is_on);

    h.sim.set_fault(Some("status segment gone"));
    h.sim.update_status(|s| s.task_state = TaskState::Off);
    let report = h.cycle();
    assert!(report.refresh_failed);
    assert!(h.pins.outputs().machine_is_on);

    h.sim.inject_unexpected(0x1234);
    h.sim.set_fault(None);
    let report = h.cycle();
    assert!(report.refresh_failed);
    assert!(h.pins.outputs().machine_is_on);

    let report = h.cycle();
    assert!(!report.refresh_failed);
    assert!(!h.pins.outputs().machine_is_on);
    assert_eq!(h.lifecycle.stats().refresh_failures, 2);
}
