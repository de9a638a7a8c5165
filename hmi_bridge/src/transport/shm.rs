//! Shared-memory transport to a controller running in another process.
//!
//! Segments are named after the shared channel identifier:
//! `<id>_cmd` (created here), `<id>_stat` and `<id>_err` (created by the
//! controller, attached here).

use super::{
    ChannelError, ChannelKind, CommandChannel, ErrorChannel, Peek, StatusChannel, Transport,
};
use hmi_common::command::CommandMessage;
use hmi_common::status::{ErrorMessage, StatusSnapshot};
use hmi_common::wire::{
    COMMAND_MSG_TYPE, EMPTY_MSG_TYPE, ERROR_MSG_TYPE, STATUS_MSG_TYPE, decode_frame, encode_frame,
    frame_type,
};
use hmi_shm::{SHM_MIN_SIZE, SegmentReader, SegmentWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const COMMAND_SUFFIX: &str = "cmd";
pub const STATUS_SUFFIX: &str = "stat";
pub const ERROR_SUFFIX: &str = "err";

/// Size of the command segment data section.
pub const COMMAND_SEGMENT_SIZE: usize = SHM_MIN_SIZE;

pub fn segment_name(channel_id: &str, suffix: &str) -> String {
    format!("{channel_id}_{suffix}")
}

pub struct ShmTransport {
    root: PathBuf,
    channel_id: String,
}

impl ShmTransport {
    pub fn new(root: impl Into<PathBuf>, channel_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            channel_id: channel_id.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn segment(&self, suffix: &str) -> String {
        segment_name(&self.channel_id, suffix)
    }

    fn unavailable(kind: ChannelKind, err: impl ToString) -> ChannelError {
        ChannelError::Unavailable {
            kind,
            reason: err.to_string(),
        }
    }
}

impl Transport for ShmTransport {
    fn name(&self) -> &'static str {
        "shm"
    }

    fn open_command(&mut self) -> Result<Box<dyn CommandChannel>, ChannelError> {
        let name = self.segment(COMMAND_SUFFIX);
        let writer = SegmentWriter::create_in(&self.root, &name, COMMAND_SEGMENT_SIZE)
            .map_err(|e| Self::unavailable(ChannelKind::Command, e))?;
        Ok(Box::new(ShmCommandChannel { writer }))
    }

    /// Attach and require the newest frame to be a status message.
    fn open_status(&mut self) -> Result<Box<dyn StatusChannel>, ChannelError> {
        let mut reader = SegmentReader::attach_in(&self.root, &self.segment(STATUS_SUFFIX))
            .map_err(|e| Self::unavailable(ChannelKind::Status, e))?;

        let bytes = reader
            .read()
            .map_err(|e| Self::unavailable(ChannelKind::Status, e))?;
        match frame_type(bytes) {
            STATUS_MSG_TYPE => {
                let snapshot: StatusSnapshot = decode_frame(STATUS_MSG_TYPE, bytes)?;
                Ok(Box::new(ShmStatusChannel {
                    reader,
                    pending: Some(Box::new(snapshot)),
                }))
            }
            EMPTY_MSG_TYPE => Err(Self::unavailable(
                ChannelKind::Status,
                "controller has not published status yet",
            )),
            other => Err(ChannelError::UnexpectedMessage(other)),
        }
    }

    fn open_error(&mut self) -> Result<Box<dyn ErrorChannel>, ChannelError> {
        let mut reader = SegmentReader::attach_in(&self.root, &self.segment(ERROR_SUFFIX))
            .map_err(|e| Self::unavailable(ChannelKind::Error, e))?;
        // messages older than this connection are not surfaced
        if reader.has_changed() {
            reader.read()?;
        }
        Ok(Box::new(ShmErrorChannel { reader }))
    }
}

struct ShmCommandChannel {
    writer: SegmentWriter,
}

impl CommandChannel for ShmCommandChannel {
    fn write(&mut self, msg: &CommandMessage) -> Result<(), ChannelError> {
        let frame = encode_frame(COMMAND_MSG_TYPE, msg)?;
        self.writer.write(&frame)?;
        Ok(())
    }

    fn is_valid(&self) -> bool {
        true
    }
}

struct ShmStatusChannel {
    reader: SegmentReader,
    /// Snapshot read while validating the channel, returned by the first peek.
    pending: Option<Box<StatusSnapshot>>,
}

impl StatusChannel for ShmStatusChannel {
    fn peek(&mut self) -> Peek {
        if let Some(snapshot) = self.pending.take() {
            return Peek::Status(snapshot);
        }
        if !self.reader.has_changed() {
            if !self.reader.writer_alive() {
                return Peek::Error(format!("{} writer exited", self.reader.name()));
            }
            return Peek::NoData;
        }

        let bytes = match self.reader.read() {
            Ok(bytes) => bytes,
            Err(e) => return Peek::Error(e.to_string()),
        };
        match frame_type(bytes) {
            STATUS_MSG_TYPE => match decode_frame::<StatusSnapshot>(STATUS_MSG_TYPE, bytes) {
                Ok(snapshot) => Peek::Status(Box::new(snapshot)),
                Err(e) => Peek::Error(e.to_string()),
            },
            EMPTY_MSG_TYPE => Peek::NoData,
            other => Peek::Other(other),
        }
    }
}

struct ShmErrorChannel {
    reader: SegmentReader,
}

impl ErrorChannel for ShmErrorChannel {
    fn poll(&mut self) -> Result<Option<ErrorMessage>, ChannelError> {
        if !self.reader.has_changed() {
            return Ok(None);
        }
        let bytes = self.reader.read()?;
        match frame_type(bytes) {
            ERROR_MSG_TYPE => {
                let msg: ErrorMessage = decode_frame(ERROR_MSG_TYPE, bytes)?;
                Ok(Some(msg))
            }
            EMPTY_MSG_TYPE => Ok(None),
            other => {
                debug!(
                    segment = self.reader.name(),
                    msg_type = other,
                    "ignoring frame on error channel"
                );
                Err(ChannelError::UnexpectedMessage(other))
            }
        }
    }
}
