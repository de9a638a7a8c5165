//! Lock-free reader implementation

use crate::error::{ShmError, ShmResult};
use crate::platform::{attach_segment_mmap, find_segment_files, is_process_alive};
use crate::segment::{DEFAULT_SHM_ROOT, SegmentHeader, SharedMemorySegment, header_size};
use crate::version::VersionCounter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{Ordering, fence};

const MAX_READ_RETRIES: usize = 10;

/// Lock-free reader with conflict detection
pub struct SegmentReader {
    segment: SharedMemorySegment,
    last_seen_version: u64,
    read_buffer: Vec<u8>,
}

impl SegmentReader {
    /// Attach to a segment under the default root
    pub fn attach(name: &str) -> ShmResult<Self> {
        Self::attach_in(Path::new(DEFAULT_SHM_ROOT), name)
    }

    /// Attach to a segment under `root`
    ///
    /// When several files match, segments owned by a live writer win over
    /// stale ones, then the most recently modified.
    pub fn attach_in(root: &Path, name: &str) -> ShmResult<Self> {
        let path = Self::select_segment(root, name)?;
        let mmap = attach_segment_mmap(&path)?;

        if mmap.len() < header_size() {
            return Err(ShmError::Corrupted {
                name: name.to_string(),
            });
        }
        // SAFETY: mapping is page aligned and holds at least a header
        let header = unsafe { &*(mmap.as_ptr() as *const SegmentHeader) };
        header.validate(name)?;
        let data_size = usize::try_from(header.size).map_err(|_| ShmError::Corrupted {
            name: name.to_string(),
        })?;

        let segment = SharedMemorySegment::new(name.to_string(), path, data_size, mmap)?;
        segment.header().add_reader();

        Ok(Self {
            segment,
            last_seen_version: 0,
            read_buffer: vec![0; data_size],
        })
    }

    fn select_segment(root: &Path, name: &str) -> ShmResult<PathBuf> {
        let mut candidates: Vec<(PathBuf, bool, std::time::SystemTime)> =
            find_segment_files(root, name)?
                .into_iter()
                .map(|(path, pid)| {
                    let modified = std::fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                    (path, is_process_alive(pid), modified)
                })
                .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));
        candidates
            .into_iter()
            .next()
            .map(|(path, _, _)| path)
            .ok_or_else(|| ShmError::NotFound {
                name: name.to_string(),
            })
    }

    /// Read the whole data section with conflict detection
    pub fn read(&mut self) -> ShmResult<&[u8]> {
        self.read_range(0, self.segment.data_size)
    }

    /// Read data range with offset and length
    pub fn read_range(&mut self, offset: usize, len: usize) -> ShmResult<&[u8]> {
        let end = offset.checked_add(len).unwrap_or(usize::MAX);
        if end > self.segment.data_size {
            return Err(ShmError::InvalidSize { size: end });
        }

        let header = self.segment.header();
        for _attempt in 0..MAX_READ_RETRIES {
            let version_before = header.version.load(Ordering::Acquire);
            if !VersionCounter::is_stable(version_before) {
                std::thread::yield_now();
                continue;
            }

            fence(Ordering::Acquire);
            // SAFETY: range checked against the data section; buffer sized at attach
            unsafe {
                let src_ptr = self.segment.data_ptr().add(offset);
                std::ptr::copy_nonoverlapping(src_ptr, self.read_buffer.as_mut_ptr(), len);
            }
            fence(Ordering::Acquire);

            let version_after = header.version.load(Ordering::Acquire);
            if version_before == version_after {
                self.last_seen_version = version_after;
                return Ok(&self.read_buffer[..len]);
            }
            std::thread::yield_now();
        }

        Err(ShmError::VersionConflict)
    }

    /// Version observed by the last successful read
    pub fn version(&self) -> u64 {
        self.last_seen_version
    }

    /// Check if data has changed since last read
    pub fn has_changed(&self) -> bool {
        let current_version = self.segment.header().version.load(Ordering::Acquire);
        current_version != self.last_seen_version && VersionCounter::is_stable(current_version)
    }

    /// Whether the process that created the segment is still running
    pub fn writer_alive(&self) -> bool {
        is_process_alive(self.segment.header().writer_pid.load(Ordering::Acquire))
    }

    /// Get segment name
    pub fn name(&self) -> &str {
        &self.segment.name
    }

    /// Get data size
    pub fn data_size(&self) -> usize {
        self.segment.data_size
    }

    /// Get current reader count
    pub fn reader_count(&self) -> u32 {
        self.segment.header().get_reader_count()
    }
}

impl Drop for SegmentReader {
    fn drop(&mut self) {
        self.segment.header().remove_reader();
    }
}
