//! Status polling and classification.

use crate::channel::ChannelManager;
use crate::error::{BridgeError, BridgeResult};
use crate::transport::Peek;
use hmi_common::status::StatusSnapshot;
use std::time::Instant;

/// Outcome of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// A new snapshot replaced the previous one.
    New,
    /// Nothing arrived; the previous snapshot stands.
    Unchanged,
}

/// Holds the latest good status snapshot.
///
/// A failed refresh never touches the stored snapshot.
#[derive(Debug, Default)]
pub struct StatusPoller {
    snapshot: StatusSnapshot,
    updated_at: Option<Instant>,
    updates: u64,
}

impl StatusPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one non-blocking look at the status channel.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Connection` on a transport fault
    /// - `BridgeError::Protocol` when a non-status frame is found
    pub fn refresh(&mut self, channels: &mut ChannelManager) -> BridgeResult<Freshness> {
        match channels.peek_status() {
            Peek::Status(snapshot) => {
                self.snapshot = *snapshot;
                self.updated_at = Some(Instant::now());
                self.updates += 1;
                Ok(Freshness::New)
            }
            Peek::NoData => Ok(Freshness::Unchanged),
            Peek::Error(reason) => Err(BridgeError::Connection(format!(
                "status channel fault: {reason}"
            ))),
            Peek::Other(msg_type) => Err(BridgeError::Protocol(format!(
                "unexpected status message type {msg_type:#x}"
            ))),
        }
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    /// When the current snapshot arrived; `None` before the first one.
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}
