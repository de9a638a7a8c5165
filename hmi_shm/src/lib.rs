//! # HMI Shared Memory Segments
//!
//! Lock-free, single-writer multi-reader shared memory segments used as the
//! transport under the controller channels and the pin bus.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   Writer        │    │  Shared Memory  │    │   Reader 1..N   │
//! │ SegmentWriter   ├───►│ [Header|Data]   ├───►│ SegmentReader   │
//! │                 │    │ Version Counter │    │                 │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! Segments live as files named `hmi_{name}_{pid}` under a root directory
//! (`/dev/shm` by default). The writer bumps the header version to an odd
//! value before copying data and to the next even value afterwards; readers
//! retry while the version is odd or changes under them.
//!
//! ## Usage
//!
//! ```rust
//! use hmi_shm::{SegmentReader, SegmentWriter, SHM_MIN_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = tempfile::tempdir()?;
//! let mut writer = SegmentWriter::create_in(root.path(), "status", SHM_MIN_SIZE)?;
//! writer.write(b"state")?;
//!
//! let mut reader = SegmentReader::attach_in(root.path(), "status")?;
//! assert_eq!(&reader.read()?[..5], b"state");
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - **SegmentWriter**: single writer per segment name, enforced across processes
//! - **SegmentReader**: any number of readers per segment

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod platform;
pub mod reader;
pub mod segment;
pub mod version;
pub mod writer;

pub use error::{ShmError, ShmResult};
pub use reader::SegmentReader;
pub use segment::{
    CACHE_LINE_SIZE, DEFAULT_SHM_ROOT, HMI_SHM_MAGIC, SHM_MAX_SIZE, SHM_MIN_SIZE, SegmentHeader,
    SharedMemorySegment,
};
pub use version::VersionCounter;
pub use writer::SegmentWriter;
