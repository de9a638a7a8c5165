//! Integration test: the bridge against a controller thread over shared
//! memory segments in a temporary root.
//!
//! The fake controller publishes `<id>_stat`, echoes every command it reads
//! from `<id>_cmd` as DONE and exits once it sees the shutdown no-op.

use super::BRIDGE_TOML;
use hmi_bridge::channel::NoopGate;
use hmi_bridge::lifecycle::Lifecycle;
use hmi_bridge::pins::MemoryPinBus;
use hmi_bridge::transport::shm::{ShmTransport, segment_name};
use hmi_common::command::{Command, CommandMessage};
use hmi_common::config::{ConfigLoader, HmiConfig};
use hmi_common::pins::InputPin;
use hmi_common::status::{ErrorKind, ErrorMessage, ExecState, StatusSnapshot, TaskState};
use hmi_common::wire::{
    COMMAND_MSG_TYPE, ERROR_MSG_TYPE, STATUS_MSG_TYPE, decode_frame, encode_frame, frame_type,
};
use hmi_shm::{SHM_MIN_SIZE, SegmentReader, SegmentWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const CHANNEL_ID: &str = "shm_itest";
const BASELINE: i32 = 41;
const CONTROLLER_DEADLINE: Duration = Duration::from_secs(5);

fn publish_status(writer: &mut SegmentWriter, status: &StatusSnapshot) {
    writer
        .write(&encode_frame(STATUS_MSG_TYPE, status).unwrap())
        .unwrap();
}

fn run_controller(
    root: PathBuf,
    mut stat: SegmentWriter,
    mut status: StatusSnapshot,
) -> Vec<CommandMessage> {
    let deadline = Instant::now() + CONTROLLER_DEADLINE;
    let mut received = Vec::new();

    let mut cmd = loop {
        match SegmentReader::attach_in(&root, &segment_name(CHANNEL_ID, "cmd")) {
            Ok(reader) => break reader,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(1)),
            Err(_) => return received,
        }
    };

    while Instant::now() < deadline {
        if cmd.has_changed() {
            let bytes = cmd.read().unwrap();
            if frame_type(bytes) == COMMAND_MSG_TYPE {
                let msg: CommandMessage = decode_frame(COMMAND_MSG_TYPE, bytes).unwrap();
                if let Command::SetTaskState(state) = msg.command {
                    status.task_state = state;
                }
                status.echo_serial_number = msg.serial;
                status.state = ExecState::Done;
                publish_status(&mut stat, &status);

                let done = msg.command == Command::Null;
                received.push(msg);
                if done {
                    break;
                }
            }
        }
        thread::sleep(Duration::from_micros(200));
    }
    received
}

#[test]
fn bridge_round_trip_over_shared_memory() {
    let root = tempfile::tempdir().unwrap();
    let root_path = root.path().to_path_buf();

    let mut status = StatusSnapshot::idle(3);
    status.echo_serial_number = BASELINE;
    let mut stat = SegmentWriter::create_in(
        &root_path,
        &segment_name(CHANNEL_ID, "stat"),
        SHM_MIN_SIZE,
    )
    .unwrap();
    publish_status(&mut stat, &status);
    let mut err = SegmentWriter::create_in(
        &root_path,
        &segment_name(CHANNEL_ID, "err"),
        SHM_MIN_SIZE,
    )
    .unwrap();

    let controller = {
        let root = root_path.clone();
        thread::spawn(move || run_controller(root, stat, status))
    };

    let mut config = HmiConfig::from_toml(BRIDGE_TOML).unwrap();
    config.bridge.channel_id = CHANNEL_ID.to_string();
    config.bridge.wait_timeout_s = 2.0;

    let pins = MemoryPinBus::new();
    let mut lifecycle = Lifecycle::new(
        &config,
        Box::new(ShmTransport::new(&root_path, CHANNEL_ID)),
        Arc::new(NoopGate),
        pins.clone(),
    )
    .unwrap();
    lifecycle.startup().unwrap();
    assert_eq!(lifecycle.baseline(), Some(BASELINE));

    pins.set_bit(InputPin::MachineOn, true);
    let report = lifecycle.run_cycle();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(lifecycle.dispatcher().snapshot().task_state, TaskState::On);
    assert!(pins.outputs().machine_is_on);

    err.write(
        &encode_frame(
            ERROR_MSG_TYPE,
            &ErrorMessage::new(ErrorKind::Operator, "spindle fault"),
        )
        .unwrap(),
    )
    .unwrap();
    let report = lifecycle.run_cycle();
    assert_eq!(report.errors_surfaced, 1);

    lifecycle.shutdown();
    let received = controller.join().unwrap();
    assert_eq!(
        received,
        vec![
            CommandMessage::new(BASELINE + 1, Command::SetTaskState(TaskState::On)),
            CommandMessage::new(BASELINE, Command::Null),
        ]
    );
}

#[test]
fn missing_controller_segments_fail_startup() {
    let root = tempfile::tempdir().unwrap();
    let config = HmiConfig::from_toml(BRIDGE_TOML).unwrap();
    let mut lifecycle = Lifecycle::new(
        &config,
        Box::new(ShmTransport::new(root.path(), "absent")),
        Arc::new(NoopGate),
        MemoryPinBus::new(),
    )
    .unwrap();

    let err = lifecycle.startup().unwrap_err();
    assert!(err.is_connection(), "unexpected error {err}");
    // the command segment created before the failure is released again
    assert!(
        std::fs::read_dir(root.path())
            .unwrap()
            .filter_map(Result::ok)
            .all(|e| !e.file_name().to_string_lossy().starts_with("hmi_absent_cmd"))
    );
}
