//! Integration test: input pin translation.
//!
//! Momentary pins fire once per rising edge, proportional pins fire on
//! change, and failed commands never stop the cycle.

use super::Harness;
use hmi_bridge::transport::sim::{AckBehavior, SimController};
use hmi_common::command::Command;
use hmi_common::pins::InputPin;
use hmi_common::status::{ErrorKind, ErrorMessage, TaskMode, TaskState};

#[test]
fn held_button_dispatches_once() {
    let mut h = Harness::start(SimController::new(3));
    h.cycle();
    assert!(h.commands().is_empty());

    h.pins.set_bit(InputPin::MachineOn, true);
    for _ in 0..3 {
        h.cycle();
    }
    h.pins.set_bit(InputPin::MachineOn, false);
    h.cycle();
    h.cycle();

    assert_eq!(h.commands(), vec![Command::SetTaskState(TaskState::On)]);

    h.pins.set_bit(InputPin::MachineOn, true);
    h.cycle();
    assert_eq!(h.commands().len(), 2);
}

#[test]
fn momentary_pins_map_to_commands() {
    let cases = [
        (InputPin::MachineOff, Command::SetTaskState(TaskState::Off)),
        (InputPin::EstopActivate, Command::SetTaskState(TaskState::Estop)),
        (InputPin::EstopReset, Command::SetTaskState(TaskState::EstopReset)),
        (InputPin::ModeManual, Command::SetTaskMode(TaskMode::Manual)),
        (InputPin::ModeAuto, Command::SetTaskMode(TaskMode::Auto)),
        (InputPin::ModeMdi, Command::SetTaskMode(TaskMode::Mdi)),
        (InputPin::ModeTeleop, Command::SetTeleopEnable(true)),
        (InputPin::ModeJoint, Command::SetTeleopEnable(false)),
        (InputPin::FloodOn, Command::FloodOn),
        (InputPin::LubeOff, Command::LubeOff),
        (InputPin::ProgramPause, Command::ProgramPause),
        (InputPin::ProgramResume, Command::ProgramResume),
        (InputPin::ProgramStep, Command::ProgramStep),
        (InputPin::SpindleStart, Command::SpindleOn { speed: 800.0 }),
        (InputPin::SpindleReverse, Command::SpindleOn { speed: -800.0 }),
        (InputPin::SpindleStop, Command::SpindleOff),
        (InputPin::SpindleIncrease, Command::SpindleIncrease),
        (InputPin::SpindleBrakeOn, Command::SpindleBrakeEngage),
        (InputPin::SpindleBrakeOff, Command::SpindleBrakeRelease),
        (InputPin::ProbeStart, Command::Probe { x: 1.0, y: 2.0, z: -5.0 }),
        (InputPin::ProbeClear, Command::ClearProbeTrippedFlag),
        (InputPin::Abort, Command::TaskAbort),
        (InputPin::JointHome(1), Command::Home { axis: 1 }),
    ];

    for (pin, expected) in cases {
        let mut h = Harness::start(SimController::new(3));
        h.pins.set_bit(pin, true);
        h.cycle();
        assert_eq!(h.commands(), vec![expected], "pin {pin}");
    }
}

#[test]
fn mdi_pin_sends_configured_line() {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_bit(InputPin::MdiCommand(1), true);
    h.cycle();
    match h.commands().as_slice() {
        [Command::MdiExecute(line)] => assert_eq!(line.as_str(), "G28"),
        other => panic!("unexpected commands {other:?}"),
    }
}

#[test]
fn program_run_needs_open_program() {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_bit(InputPin::ProgramRun, true);
    let report = h.cycle();
    assert_eq!(report.failed, 1);
    assert!(h.commands().is_empty());

    h.pins.set_bit(InputPin::ProgramRun, false);
    h.sim.update_status(|s| s.program_file = "/nc/part.ngc".to_string());
    h.cycle();
    h.pins.set_bit(InputPin::ProgramRun, true);
    let report = h.cycle();
    assert_eq!(report.dispatched, 1);
    assert_eq!(h.commands(), vec![Command::ProgramRun { line: 0 }]);
    assert!(h.pins.outputs().program_is_running);
}

#[test]
fn overrides_dispatch_on_change_only() {
    let mut h = Harness::start(SimController::new(3));
    h.pins.set_float(InputPin::FeedOverride, 0.5);
    h.cycle();
    h.cycle();
    h.pins.set_float(InputPin::FeedOverride, 0.500_001);
    h.cycle();
    h.pins.set_float(InputPin::FeedOverride, -0.2);
    h.pins.set_float(InputPin::SpindleOverride, 1.1);
    h.cycle();

    assert_eq!(
        h.commands(),
        vec![
            Command::SetFeedScale(0.5),
            Command::SetFeedScale(0.0),
            Command::SetSpindleScale(1.1),
        ]
    );
}

#[test]
fn failed_command_does_not_stop_the_cycle() {
    let mut h = Harness::start(SimController::new(3));
    h.sim.set_ack(AckBehavior::Fail);
    h.pins.set_bit(InputPin::MistOn, true);
    let report = h.cycle();
    assert_eq!(report.failed, 1);
    assert_eq!(report.dispatched, 0);

    h.sim.set_ack(AckBehavior::Complete);
    h.pins.set_bit(InputPin::LubeOn, true);
    let report = h.cycle();
    assert_eq!(report.dispatched, 1);
    assert!(h.pins.outputs().lube_is_on);
    assert_eq!(h.lifecycle.stats().dispatch_failures, 1);
}

#[test]
fn write_failure_is_reported_not_fatal() {
    let mut h = Harness::start(SimController::new(3));
    h.sim.set_command_valid(false);
    h.pins.set_bit(InputPin::FloodOn, true);
    let report = h.cycle();
    assert_eq!(report.failed, 1);
    assert!(!report.refresh_failed);
}

#[test]
fn error_channel_messages_are_surfaced() {
    let mut h = Harness::start(SimController::new(3));
    h.sim
        .push_error(ErrorMessage::new(ErrorKind::Operator, "joint 0 following error"));
    h.sim.push_error(ErrorMessage::new(ErrorKind::Text, "tool change"));
    let report = h.cycle();
    assert_eq!(report.errors_surfaced, 2);
    assert!(h.commands().is_empty());
    assert_eq!(h.cycle().errors_surfaced, 0);
}
