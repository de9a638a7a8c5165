//! Pin bus: where input samples come from and output pins go to.
//!
//! [`ShmPinBus`] exchanges [`PinFrame`]s with panels over two shared-memory
//! segments. [`MemoryPinBus`] keeps everything in process for tests and
//! simulation.

use crate::error::{BridgeError, BridgeResult};
use hmi_common::pins::{InputPin, InputSample, OutputPins, PinFrame, PinValue};
use hmi_common::wire::{EMPTY_MSG_TYPE, PIN_FRAME_MSG_TYPE, decode_frame, encode_frame, frame_type};
use hmi_shm::{SegmentReader, SegmentWriter};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PINS_OUT_SUFFIX: &str = "pins_out";
pub const PINS_IN_SUFFIX: &str = "pins_in";

/// Data size of the output pin segment.
pub const PIN_SEGMENT_SIZE: usize = 16_384;

/// Source of input samples and sink for output pins.
pub trait PinBus: Send {
    /// Current input values. Pins without a value read as inactive.
    fn sample(&mut self) -> InputSample;

    /// Publish the mirrored output pins.
    fn publish(&mut self, outputs: &OutputPins) -> BridgeResult<()>;
}

#[derive(Debug, Default)]
struct MemoryPins {
    inputs: InputSample,
    outputs: OutputPins,
    publish_count: u64,
}

/// In-process pin bus. Clones share the same pins.
#[derive(Debug, Clone, Default)]
pub struct MemoryPinBus {
    inner: Arc<Mutex<MemoryPins>>,
}

impl MemoryPinBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, pin: InputPin, value: PinValue) {
        self.inner.lock().inputs.set(pin, value);
    }

    pub fn set_bit(&self, pin: InputPin, on: bool) {
        self.set(pin, PinValue::Bit(on));
    }

    pub fn set_float(&self, pin: InputPin, value: f64) {
        self.set(pin, PinValue::Float(value));
    }

    /// Last published outputs.
    pub fn outputs(&self) -> OutputPins {
        self.inner.lock().outputs.clone()
    }

    pub fn publish_count(&self) -> u64 {
        self.inner.lock().publish_count
    }
}

impl PinBus for MemoryPinBus {
    fn sample(&mut self) -> InputSample {
        self.inner.lock().inputs.clone()
    }

    fn publish(&mut self, outputs: &OutputPins) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        inner.outputs = outputs.clone();
        inner.publish_count += 1;
        Ok(())
    }
}

/// Shared-memory pin bus.
///
/// Outputs go to `<id>_pins_out`, owned by this process. Inputs come from
/// `<id>_pins_in`, written by a panel process; until that segment exists, or
/// after its writer exits, every input reads as inactive.
pub struct ShmPinBus {
    root: PathBuf,
    input_segment: String,
    writer: SegmentWriter,
    reader: Option<SegmentReader>,
    inputs: InputSample,
    last_published: Option<OutputPins>,
    warned: HashSet<String>,
}

impl ShmPinBus {
    /// Create the output segment under `root`.
    ///
    /// # Errors
    ///
    /// `BridgeError::Connection` if the output segment cannot be created,
    /// for example because another live bridge already owns it.
    pub fn new(root: impl Into<PathBuf>, channel_id: &str) -> BridgeResult<Self> {
        let root = root.into();
        let output_segment = format!("{channel_id}_{PINS_OUT_SUFFIX}");
        let writer = SegmentWriter::create_in(&root, &output_segment, PIN_SEGMENT_SIZE)
            .map_err(|e| {
                BridgeError::Connection(format!("pin segment {output_segment}: {e}"))
            })?;
        info!(segment = %output_segment, root = %root.display(), "pin bus ready");

        Ok(Self {
            root,
            input_segment: format!("{channel_id}_{PINS_IN_SUFFIX}"),
            writer,
            reader: None,
            inputs: InputSample::new(),
            last_published: None,
            warned: HashSet::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn attach_inputs(&mut self) {
        if self.reader.is_some() {
            return;
        }
        if let Ok(reader) = SegmentReader::attach_in(&self.root, &self.input_segment) {
            info!(segment = %self.input_segment, "panel inputs attached");
            self.reader = Some(reader);
        }
    }

    fn read_inputs(&mut self) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        if !reader.has_changed() {
            if !reader.writer_alive() {
                warn!(segment = %self.input_segment, "panel input writer exited");
                self.reader = None;
                self.inputs = InputSample::new();
            }
            return;
        }

        let bytes = match reader.read() {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(segment = %self.input_segment, error = %e, "pin read failed");
                return;
            }
        };
        let frame: PinFrame = match frame_type(bytes) {
            PIN_FRAME_MSG_TYPE => match decode_frame(PIN_FRAME_MSG_TYPE, bytes) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(segment = %self.input_segment, error = %e, "pin frame rejected");
                    return;
                }
            },
            EMPTY_MSG_TYPE => return,
            other => {
                debug!(segment = %self.input_segment, msg_type = other, "not a pin frame");
                return;
            }
        };

        let (sample, unknown) = InputSample::from_named(&frame.pins);
        for name in unknown {
            if self.warned.insert(name.clone()) {
                warn!(pin = %name, "ignoring unknown input pin");
            }
        }
        self.inputs = sample;
    }
}

impl PinBus for ShmPinBus {
    fn sample(&mut self) -> InputSample {
        self.attach_inputs();
        self.read_inputs();
        self.inputs.clone()
    }

    fn publish(&mut self, outputs: &OutputPins) -> BridgeResult<()> {
        if self.last_published.as_ref() == Some(outputs) {
            return Ok(());
        }
        let frame = PinFrame {
            pins: outputs.to_named(),
        };
        let bytes = encode_frame(PIN_FRAME_MSG_TYPE, &frame)
            .map_err(|e| BridgeError::Protocol(format!("pin frame: {e}")))?;
        self.writer
            .write(&bytes)
            .map_err(|e| BridgeError::Connection(format!("pin segment write: {e}")))?;
        self.last_published = Some(outputs.clone());
        Ok(())
    }
}
