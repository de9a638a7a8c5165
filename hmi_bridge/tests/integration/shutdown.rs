//! Integration test: shutdown handshake.
//!
//! The final message on the command channel is always a no-op carrying the
//! serial the controller echoed before the bridge started.

use super::Harness;
use hmi_bridge::transport::sim::{AckBehavior, SimController};
use hmi_common::command::{Command, CommandMessage};
use hmi_common::config::WaitPolicy;
use hmi_common::pins::InputPin;
use hmi_common::status::StatusSnapshot;
use std::time::{Duration, Instant};

const BASELINE: i32 = 500;

fn harness() -> Harness {
    let mut status = StatusSnapshot::idle(3);
    status.echo_serial_number = BASELINE;
    Harness::start(SimController::with_status(status))
}

#[test]
fn baseline_is_restored_after_commands() {
    let mut h = harness();
    h.pins.set_bit(InputPin::MachineOn, true);
    h.pins.set_bit(InputPin::FloodOn, true);
    h.cycle();
    assert_eq!(h.lifecycle.dispatcher().serial(), BASELINE + 2);

    h.lifecycle.shutdown();
    let received = h.sim.received();
    assert_eq!(
        received.iter().map(|m| m.serial).collect::<Vec<_>>(),
        vec![BASELINE + 1, BASELINE + 2, BASELINE]
    );
    assert_eq!(
        received.last(),
        Some(&CommandMessage::new(BASELINE, Command::Null))
    );
    assert_eq!(h.sim.status().echo_serial_number, BASELINE);
    assert!(!h.lifecycle.is_running());
}

#[test]
fn idle_bridge_still_restores_baseline() {
    let mut h = harness();
    h.cycle();
    h.lifecycle.shutdown();
    assert_eq!(
        h.sim.received(),
        vec![CommandMessage::new(BASELINE, Command::Null)]
    );
}

#[test]
fn unacknowledged_command_delays_but_does_not_block_restore() {
    let mut h = harness();
    h.sim.set_ack(AckBehavior::Ignore);
    h.lifecycle
        .dispatcher_mut()
        .dispatch_with(Command::MistOn, WaitPolicy::None)
        .unwrap();

    let started = Instant::now();
    h.lifecycle.shutdown();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(
        h.sim.last_received(),
        Some(CommandMessage::new(BASELINE, Command::Null))
    );
}

#[test]
fn shutdown_is_idempotent() {
    let mut h = harness();
    h.lifecycle.shutdown();
    h.lifecycle.shutdown();
    drop(h.lifecycle);
    assert_eq!(h.sim.received().len(), 1);
}

#[test]
fn lost_command_channel_is_tolerated() {
    let mut h = harness();
    h.pins.set_bit(InputPin::MistOn, true);
    h.cycle();
    h.sim.set_command_valid(false);
    h.lifecycle.shutdown();
    assert_eq!(
        h.sim.last_received().map(|m| m.serial),
        Some(BASELINE + 1)
    );
    assert!(!h.lifecycle.dispatcher().channels().is_connected());
}
