//! Controller channel transports.
//!
//! A [`Transport`] opens the three channels to the controller. Each channel
//! is a single-slot, latest-value mailbox:
//!
//! - Command: written by the bridge, one framed [`CommandMessage`] at a time
//! - Status: read by the bridge, the newest [`StatusSnapshot`]
//! - Error: read by the bridge, diagnostic [`ErrorMessage`]s only
//!
//! Two implementations exist: [`shm::ShmTransport`] for a controller in
//! another process and [`sim::SimTransport`] for an in-process simulated
//! controller.

pub mod shm;
pub mod sim;

use hmi_common::command::CommandMessage;
use hmi_common::status::{ErrorMessage, StatusSnapshot};
use hmi_common::wire::CodecError;
use hmi_shm::ShmError;
use std::fmt;
use thiserror::Error;

/// The three controller channels, in connect order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Command,
    Status,
    Error,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [Self::Command, Self::Status, Self::Error];
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "command",
            Self::Status => "status",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{kind} channel unavailable: {reason}")]
    Unavailable { kind: ChannelKind, reason: String },

    #[error("{0} channel is not valid")]
    Invalid(ChannelKind),

    #[error("unexpected message type {0:#x}")]
    UnexpectedMessage(u32),

    #[error(transparent)]
    Shm(#[from] ShmError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result of a single non-blocking look at the status channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Peek {
    /// Transport fault.
    Error(String),
    /// Nothing new since the last peek.
    NoData,
    Status(Box<StatusSnapshot>),
    /// A frame that is not a status message.
    Other(u32),
}

pub trait CommandChannel: Send {
    fn write(&mut self, msg: &CommandMessage) -> Result<(), ChannelError>;

    fn is_valid(&self) -> bool;
}

pub trait StatusChannel: Send {
    fn peek(&mut self) -> Peek;
}

pub trait ErrorChannel: Send {
    /// Next unread diagnostic, if any.
    fn poll(&mut self) -> Result<Option<ErrorMessage>, ChannelError>;
}

/// Opens controller channels.
pub trait Transport: Send {
    fn name(&self) -> &'static str;

    fn open_command(&mut self) -> Result<Box<dyn CommandChannel>, ChannelError>;

    fn open_status(&mut self) -> Result<Box<dyn StatusChannel>, ChannelError>;

    fn open_error(&mut self) -> Result<Box<dyn ErrorChannel>, ChannelError>;
}
