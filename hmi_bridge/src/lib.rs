//! # HMI Bridge
//!
//! Operator-interface bridge between panel pins and a machine controller.
//!
//! Input pins written by panels are turned into serial-numbered commands on
//! the controller's command channel; the controller's status snapshot is
//! mirrored back onto read-only output pins.
//!
//! # Module Structure
//!
//! - [`transport`] - Command/Status/Error channel transports (shared memory, simulated)
//! - [`channel`] - Channel ownership, connect with retry, close
//! - [`status`] - Status polling and classification
//! - [`dispatch`] - Serial counter, command dispatch, wait policies
//! - [`bridge`] - Per-cycle pin translation, jog shaping, output mirroring
//! - [`pins`] - Pin bus (shared memory or in-process)
//! - [`lifecycle`] - Startup, cycle loop, shutdown handshake
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  sample   ┌─────────────┐  dispatch  ┌───────────────────┐
//! │  PinBus    │──────────►│  PinBridge  │───────────►│ CommandDispatcher │
//! │ (panels)   │◄──────────│  (cycle)    │◄───────────│  + StatusPoller   │
//! └────────────┘  publish  └─────────────┘  snapshot  └─────────┬─────────┘
//!                                                               │
//!                                                     ┌─────────▼─────────┐
//!                                                     │  ChannelManager   │
//!                                                     │ cmd / stat / err  │
//!                                                     └───────────────────┘
//! ```

pub mod bridge;
pub mod channel;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod pins;
pub mod status;
pub mod transport;

pub use error::{BridgeError, BridgeResult};
