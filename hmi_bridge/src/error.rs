//! Bridge error taxonomy.

use crate::transport::ChannelError;
use hmi_common::config::ConfigError;
use thiserror::Error;

/// Failure of a bridge operation.
///
/// Only `Connection` during startup is fatal; everything else is reported
/// to the caller and the cycle loop keeps running.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A channel is missing or its write failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The status channel produced something other than a status frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A wait policy ran out of time.
    #[error("timed out after {waited_ms} ms waiting for serial {serial} ({stage})")]
    Timeout {
        serial: i32,
        stage: &'static str,
        waited_ms: u64,
    },

    /// The controller reported the awaited command in the ERROR state.
    #[error("controller reported error for serial {serial}")]
    Remote { serial: i32 },

    /// Rejected locally, never sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ChannelError> for BridgeError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::UnexpectedMessage(t) => {
                Self::Protocol(format!("unexpected message type {t:#x}"))
            }
            other => Self::Connection(other.to_string()),
        }
    }
}

impl BridgeError {
    /// Startup and channel failures; the only errors that abort the process.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
