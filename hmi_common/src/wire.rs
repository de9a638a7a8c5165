//! Frame codec shared by every channel.
//!
//! ```text
//! +----------------+----------------+------------------+
//! | type (u32 LE)  | length (u32 LE)| body (bincode)   |
//! +----------------+----------------+------------------+
//! ```
//!
//! A zero type marks an empty slot.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Slot holds no message yet.
pub const EMPTY_MSG_TYPE: u32 = 0;
pub const COMMAND_MSG_TYPE: u32 = 0x434d_4401; // "CMD"
pub const STATUS_MSG_TYPE: u32 = 0x5354_4101; // "STA"
pub const ERROR_MSG_TYPE: u32 = 0x4552_5201; // "ERR"
pub const PIN_FRAME_MSG_TYPE: u32 = 0x5049_4e01; // "PIN"

/// Size of the frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("frame type mismatch: expected {expected:#x}, found {found:#x}")]
    TypeMismatch { expected: u32, found: u32 },

    #[error("frame body of {0} bytes exceeds u32 length field")]
    TooLarge(usize),

    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Encode `body` as a frame of type `msg_type`.
pub fn encode_frame<T: Serialize>(msg_type: u32, body: &T) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(body)?;
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::TooLarge(payload.len()))?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&msg_type.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Message type of a frame; `EMPTY_MSG_TYPE` if the buffer is too short.
pub fn frame_type(bytes: &[u8]) -> u32 {
    bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .unwrap_or(EMPTY_MSG_TYPE)
}

/// Decode a frame, checking its type.
pub fn decode_frame<T: DeserializeOwned>(expected: u32, bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(CodecError::Truncated {
            needed: FRAME_HEADER_LEN,
            available: bytes.len(),
        });
    }
    let found = frame_type(bytes);
    if found != expected {
        return Err(CodecError::TypeMismatch { expected, found });
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[4..FRAME_HEADER_LEN]);
    let len = u32::from_le_bytes(len_bytes) as usize;
    let end = FRAME_HEADER_LEN + len;
    let body = bytes.get(FRAME_HEADER_LEN..end).ok_or(CodecError::Truncated {
        needed: end,
        available: bytes.len(),
    })?;
    Ok(bincode::deserialize(body)?)
}
