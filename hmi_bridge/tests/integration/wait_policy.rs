//! Integration test: wait policies and serial numbering.

use super::Harness;
use hmi_bridge::BridgeError;
use hmi_bridge::transport::sim::{AckBehavior, SimController};
use hmi_common::command::Command;
use hmi_common::config::WaitPolicy;
use hmi_common::status::{ExecState, StatusSnapshot};
use proptest::prelude::*;

#[test]
fn none_returns_without_reading_status() {
    let mut h = Harness::start(SimController::new(3));
    let d = h.lifecycle.dispatcher_mut();
    let serial = d.dispatch_with(Command::MistOn, WaitPolicy::None).unwrap();
    assert_eq!(serial, 1);
    assert_eq!(d.snapshot().echo_serial_number, 0);
    assert!(!d.snapshot().mist);
}

#[test]
fn received_returns_while_command_executes() {
    let mut h = Harness::start(SimController::new(3));
    h.sim.set_ack(AckBehavior::Receive);
    let d = h.lifecycle.dispatcher_mut();
    let serial = d.dispatch_with(Command::FloodOn, WaitPolicy::Received).unwrap();
    assert_eq!(d.snapshot().echo_serial_number, serial);
    assert_eq!(d.snapshot().state, ExecState::Exec);
}

#[test]
fn done_waits_for_completion() {
    let mut h = Harness::start(SimController::new(3));
    h.sim.set_ack(AckBehavior::CompleteAfter { polls: 2 });
    let d = h.lifecycle.dispatcher_mut();
    let serial = d.dispatch_with(Command::LubeOn, WaitPolicy::Done).unwrap();
    assert_eq!(d.snapshot().echo_serial_number, serial);
    assert_eq!(d.snapshot().state, ExecState::Done);
    assert!(d.snapshot().lube);
}

#[test]
fn done_reports_controller_error() {
    let mut h = Harness::start(SimController::new(3));
    h.sim.set_ack(AckBehavior::Fail);
    let err = h
        .lifecycle
        .dispatcher_mut()
        .dispatch_with(Command::Home { axis: 0 }, WaitPolicy::Done)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Remote { serial: 1 }));
}

#[test]
fn timeouts_name_the_stage() {
    let mut h = Harness::start(SimController::new(3));

    h.sim.set_ack(AckBehavior::Receive);
    let err = h
        .lifecycle
        .dispatcher_mut()
        .dispatch_with(Command::ProgramStep, WaitPolicy::Done)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Timeout { serial: 1, stage: "done", .. }));

    h.sim.set_ack(AckBehavior::Ignore);
    let err = h
        .lifecycle
        .dispatcher_mut()
        .dispatch_with(Command::ProgramStep, WaitPolicy::Received)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Timeout { serial: 2, stage: "received", .. }));
}

#[test]
fn rejected_command_spends_no_serial() {
    let mut h = Harness::start(SimController::new(3));
    let d = h.lifecycle.dispatcher_mut();
    let err = d
        .dispatch_with(Command::JogStop { axis: 200 }, WaitPolicy::None)
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArgument(_)));
    assert_eq!(d.serial(), 0);
    assert!(h.sim.received().is_empty());
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Send(WaitPolicy),
    SendFailing(WaitPolicy),
    WriteFails,
}

fn step() -> impl Strategy<Value = Step> {
    let policy = prop_oneof![
        Just(WaitPolicy::None),
        Just(WaitPolicy::Received),
        Just(WaitPolicy::Done),
    ];
    prop_oneof![
        policy.clone().prop_map(Step::Send),
        policy.prop_map(Step::SendFailing),
        Just(Step::WriteFails),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_attempt_spends_exactly_one_serial(
        baseline in any::<i32>(),
        steps in prop::collection::vec(step(), 1..12),
    ) {
        let mut status = StatusSnapshot::idle(3);
        status.echo_serial_number = baseline;
        let mut h = Harness::start(SimController::with_status(status));

        let mut expected = baseline;
        let mut written = Vec::new();
        for step in &steps {
            expected = expected.wrapping_add(1);
            let policy = match *step {
                Step::Send(policy) => {
                    h.sim.set_ack(AckBehavior::Complete);
                    h.sim.set_command_valid(true);
                    written.push(expected);
                    policy
                }
                Step::SendFailing(policy) => {
                    h.sim.set_ack(AckBehavior::Fail);
                    h.sim.set_command_valid(true);
                    written.push(expected);
                    policy
                }
                Step::WriteFails => {
                    h.sim.set_command_valid(false);
                    WaitPolicy::None
                }
            };
            let result = h.lifecycle.dispatcher_mut().dispatch_with(Command::MistOn, policy);
            match (step, result) {
                (Step::Send(_), Ok(serial)) => prop_assert_eq!(serial, expected),
                (Step::SendFailing(WaitPolicy::Done), Err(BridgeError::Remote { serial })) => {
                    prop_assert_eq!(serial, expected)
                }
                (Step::SendFailing(_), Ok(serial)) => prop_assert_eq!(serial, expected),
                (Step::WriteFails, Err(e)) => prop_assert!(e.is_connection()),
                (step, other) => prop_assert!(false, "{:?} gave {:?}", step, other),
            }
        }

        prop_assert_eq!(h.lifecycle.dispatcher().serial(), expected);
        let serials: Vec<i32> = h.sim.received().iter().map(|m| m.serial).collect();
        prop_assert_eq!(serials, written);
    }
}
