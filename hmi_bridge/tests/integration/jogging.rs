//! Integration test: continuous and incremental jogging.
//!
//! Jog speed is in units per minute on the pin and per second on the wire.
//! Axis 2 is configured with jogging polarity 0.

use super::Harness;
use hmi_bridge::transport::sim::SimController;
use hmi_common::command::{Command, TeleopVector};
use hmi_common::pins::InputPin;
use hmi_common::status::TrajMode;

const JOG_SPEED: f64 = 600.0;
const JOG_VELOCITY: f64 = 10.0;

fn teleop_harness() -> Harness {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_bit(InputPin::ModeTeleop, true);
    h.cycle();
    assert_eq!(h.sim.status().traj_mode, TrajMode::Teleop);
    h.sim.clear_received();
    h
}

#[test]
fn teleop_jog_sends_single_axis_vector() {
    let mut h = teleop_harness();
    h.pins.set_float(InputPin::JogSpeed, JOG_SPEED);
    h.pins.set_bit(InputPin::JogPlus(2), true);
    h.cycle();
    h.cycle();

    match h.commands().as_slice() {
        [Command::TeleopVector(v)] => {
            assert_eq!(v.z, JOG_VELOCITY);
            assert_eq!([v.x, v.y, v.a, v.b, v.c], [0.0; 5]);
        }
        other => panic!("unexpected commands {other:?}"),
    }
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, Some(2));

    h.pins.set_bit(InputPin::JogPlus(2), false);
    h.cycle();
    assert_eq!(
        h.sim.last_received().map(|m| m.command),
        Some(Command::TeleopVector(TeleopVector::zero()))
    );
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, None);
}

#[test]
fn teleop_release_of_any_axis_sends_zero_vector() {
    let mut h = teleop_harness();
    h.pins.set_float(InputPin::JogSpeed, JOG_SPEED);
    h.pins.set_bit(InputPin::JogPlus(0), true);
    h.pins.set_bit(InputPin::JogPlus(1), true);
    h.cycle();
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, Some(1));

    h.pins.set_bit(InputPin::JogPlus(0), false);
    h.cycle();
    assert_eq!(
        h.sim.last_received().map(|m| m.command),
        Some(Command::TeleopVector(TeleopVector::zero()))
    );
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, Some(1));

    h.pins.set_bit(InputPin::JogPlus(1), false);
    h.cycle();
    assert_eq!(
        h.sim.last_received().map(|m| m.command),
        Some(Command::TeleopVector(TeleopVector::zero()))
    );
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, None);
    assert!(
        !h.commands()
            .iter()
            .any(|c| matches!(c, Command::JogStop { .. }))
    );
}

#[test]
fn failed_jog_start_is_not_tracked() {
    let mut h = teleop_harness();
    h.pins.set_float(InputPin::JogSpeed, JOG_SPEED);
    h.sim.set_command_valid(false);
    h.pins.set_bit(InputPin::JogPlus(2), true);
    let report = h.cycle();
    assert_eq!(report.failed, 1);
    assert_eq!(report.dispatched, 0);
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, None);

    h.sim.set_command_valid(true);
    h.pins.set_bit(InputPin::JogPlus(2), false);
    h.cycle();
    assert_eq!(
        h.commands(),
        vec![Command::TeleopVector(TeleopVector::zero())]
    );
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, None);
}

#[test]
fn negative_jog_speed_clamps_to_zero() {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_float(InputPin::JogSpeed, -JOG_SPEED);
    h.pins.set_bit(InputPin::JogPlus(1), true);
    h.cycle();

    match h.commands().as_slice() {
        [Command::JogContinuous { axis: 1, velocity }] => assert_eq!(*velocity, 0.0),
        other => panic!("unexpected commands {other:?}"),
    }
    assert_eq!(h.lifecycle.bridge().jog_tracker().active, Some(1));
}

#[test]
fn independent_jog_applies_polarity() {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_float(InputPin::JogSpeed, JOG_SPEED);

    h.pins.set_bit(InputPin::JogPlus(2), true);
    h.cycle();
    h.pins.set_bit(InputPin::JogPlus(2), false);
    h.cycle();

    h.pins.set_bit(InputPin::JogMinus(0), true);
    h.cycle();
    h.pins.set_bit(InputPin::JogMinus(0), false);
    h.cycle();

    assert_eq!(
        h.commands(),
        vec![
            Command::JogContinuous {
                axis: 2,
                velocity: -JOG_VELOCITY,
            },
            Command::JogStop { axis: 2 },
            Command::JogContinuous {
                axis: 0,
                velocity: -JOG_VELOCITY,
            },
            Command::JogStop { axis: 0 },
        ]
    );
}

#[test]
fn jog_speed_change_does_not_resend_active_jog() {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_float(InputPin::JogSpeed, JOG_SPEED);
    h.pins.set_bit(InputPin::JogPlus(1), true);
    h.cycle();
    h.pins.set_float(InputPin::JogSpeed, 1200.0);
    h.cycle();
    h.cycle();
    assert_eq!(
        h.commands(),
        vec![Command::JogContinuous {
            axis: 1,
            velocity: JOG_VELOCITY,
        }]
    );
}

#[test]
fn increment_jog_uses_axis_increment() {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_float(InputPin::JogSpeed, JOG_SPEED);
    h.pins.set_float(InputPin::JogIncrement(1), 0.5);
    h.pins.set_float(InputPin::JogIncrement(2), 0.1);
    h.pins.set_bit(InputPin::JogIncrementPlus(1), true);
    h.pins.set_bit(InputPin::JogIncrementPlus(2), true);
    h.cycle();
    h.cycle();

    assert_eq!(
        h.commands(),
        vec![
            Command::JogIncrement {
                axis: 1,
                velocity: JOG_VELOCITY,
                increment: 0.5,
            },
            Command::JogIncrement {
                axis: 2,
                velocity: -JOG_VELOCITY,
                increment: 0.1,
            },
        ]
    );
}
