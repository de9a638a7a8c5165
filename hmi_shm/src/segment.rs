//! Shared memory segment structures and operations

use crate::error::{ShmError, ShmResult};
use memmap2::MmapMut;
use static_assertions::const_assert_eq;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Minimum data size (one page)
pub const SHM_MIN_SIZE: usize = 4096;

/// Maximum data size
pub const SHM_MAX_SIZE: usize = 1_073_741_824;

/// Header alignment
pub const CACHE_LINE_SIZE: usize = 64;

/// Magic number identifying an HMI segment ("HMISHM01")
pub const HMI_SHM_MAGIC: u64 = 0x484D_4953_484D_3031;

/// Default directory holding segment files
pub const DEFAULT_SHM_ROOT: &str = "/dev/shm";

/// File name prefix of every segment
pub(crate) const FILE_PREFIX: &str = "hmi_";

/// Path of the segment `name` owned by `pid` under `root`
pub fn segment_path(root: &Path, name: &str, pid: u32) -> PathBuf {
    root.join(format!("{FILE_PREFIX}{name}_{pid}"))
}

/// Nanoseconds since the epoch, 0 if the clock is before it
pub(crate) fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Segment header with cache-line alignment
#[repr(C, align(64))]
pub struct SegmentHeader {
    /// Magic number for validation
    pub magic: u64,
    /// Version counter for optimistic concurrency
    pub version: AtomicU64,
    /// Writer process ID
    pub writer_pid: AtomicU32,
    /// Active reader count
    pub reader_count: AtomicU32,
    /// Data section size
    pub size: u64,
    /// Creation timestamp
    pub created_ts: u64,
    /// Last write timestamp
    pub last_write_ts: AtomicU64,
    _padding: [u8; 64],
}

const_assert_eq!(core::mem::size_of::<SegmentHeader>(), 128);
const_assert_eq!(core::mem::align_of::<SegmentHeader>(), CACHE_LINE_SIZE);

impl SegmentHeader {
    /// Create new segment header
    pub fn new(size: usize, writer_pid: u32) -> Self {
        let now = now_nanos();
        Self {
            magic: HMI_SHM_MAGIC,
            version: AtomicU64::new(0),
            writer_pid: AtomicU32::new(writer_pid),
            reader_count: AtomicU32::new(0),
            size: size as u64,
            created_ts: now,
            last_write_ts: AtomicU64::new(now),
            _padding: [0; 64],
        }
    }

    /// Validate header magic
    pub fn validate(&self, name: &str) -> ShmResult<()> {
        if self.magic != HMI_SHM_MAGIC {
            return Err(ShmError::Corrupted {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Increment reader count
    pub fn add_reader(&self) -> u32 {
        self.reader_count.fetch_add(1, Ordering::AcqRel)
    }

    /// Decrement reader count
    pub fn remove_reader(&self) -> u32 {
        self.reader_count.fetch_sub(1, Ordering::AcqRel)
    }

    /// Get current reader count
    pub fn get_reader_count(&self) -> u32 {
        self.reader_count.load(Ordering::Acquire)
    }
}

/// Core shared memory segment representation
pub struct SharedMemorySegment {
    /// Segment name
    pub name: String,
    /// Backing file path
    pub path: PathBuf,
    /// Data section size
    pub data_size: usize,
    mmap: MmapMut,
}

impl SharedMemorySegment {
    /// Wrap a mapping whose header is already initialized
    pub fn new(name: String, path: PathBuf, data_size: usize, mmap: MmapMut) -> ShmResult<Self> {
        validate_segment_size(data_size)?;
        validate_memory_alignment(mmap.as_ptr() as usize)?;
        if mmap.len() < header_size() + data_size {
            return Err(ShmError::Corrupted { name });
        }

        Ok(Self {
            name,
            path,
            data_size,
            mmap,
        })
    }

    /// Get header reference
    pub fn header(&self) -> &SegmentHeader {
        // SAFETY: length checked in `new`, mapping is page aligned
        unsafe { &*(self.mmap.as_ptr() as *const SegmentHeader) }
    }

    /// Get data section pointer
    pub fn data_ptr(&self) -> *const u8 {
        // SAFETY: header fits inside the mapping
        unsafe { self.mmap.as_ptr().add(header_size()) }
    }

    /// Get mutable data section pointer (writer only)
    pub fn data_ptr_mut(&mut self) -> *mut u8 {
        // SAFETY: header fits inside the mapping
        unsafe { self.mmap.as_mut_ptr().add(header_size()) }
    }
}

/// Size of the segment header in bytes
pub const fn header_size() -> usize {
    std::mem::size_of::<SegmentHeader>()
}

/// Validate segment size constraints
pub fn validate_segment_size(size: usize) -> ShmResult<()> {
    if !(SHM_MIN_SIZE..=SHM_MAX_SIZE).contains(&size) || size % SHM_MIN_SIZE != 0 {
        return Err(ShmError::InvalidSize { size });
    }
    Ok(())
}

/// Validate memory alignment
pub fn validate_memory_alignment(address: usize) -> ShmResult<()> {
    if address % CACHE_LINE_SIZE != 0 {
        return Err(ShmError::AlignmentError {
            address,
            alignment: CACHE_LINE_SIZE,
        });
    }
    Ok(())
}
