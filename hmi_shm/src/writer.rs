//! Single writer implementation with exclusive ownership

use crate::error::{ShmError, ShmResult};
use crate::platform::{create_segment_mmap, find_segment_files, get_current_pid, is_process_alive};
use crate::segment::{
    DEFAULT_SHM_ROOT, SegmentHeader, SharedMemorySegment, now_nanos, segment_path,
    validate_segment_size,
};
use crate::version::VersionCounter;
use std::path::Path;
use std::sync::atomic::{Ordering, fence};
use tracing::{debug, warn};

/// Single writer with exclusive segment ownership
pub struct SegmentWriter {
    segment: SharedMemorySegment,
    current_version: u64,
    writer_pid: u32,
}

impl SegmentWriter {
    /// Create a segment under the default root
    pub fn create(name: &str, size: usize) -> ShmResult<Self> {
        Self::create_in(Path::new(DEFAULT_SHM_ROOT), name, size)
    }

    /// Create a segment under `root`
    ///
    /// Fails with `AlreadyExists` while another live process owns `name`.
    /// Files left behind by dead writers are removed first.
    pub fn create_in(root: &Path, name: &str, size: usize) -> ShmResult<Self> {
        validate_segment_size(size)?;

        let writer_pid = get_current_pid();
        Self::claim_name(root, name, writer_pid)?;

        let path = segment_path(root, name, writer_pid);
        let total_size = size + std::mem::size_of::<SegmentHeader>();
        let mut mmap = create_segment_mmap(&path, total_size)?;

        {
            // SAFETY: freshly mapped, page aligned, large enough for the header
            let header = unsafe { &mut *(mmap.as_mut_ptr() as *mut SegmentHeader) };
            *header = SegmentHeader::new(size, writer_pid);
        }
        fence(Ordering::Release);

        let segment = match SharedMemorySegment::new(name.to_string(), path.clone(), size, mmap) {
            Ok(segment) => segment,
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
        };
        debug!(segment = name, path = %path.display(), size, "segment created");

        Ok(Self {
            segment,
            current_version: 0,
            writer_pid,
        })
    }

    fn claim_name(root: &Path, name: &str, writer_pid: u32) -> ShmResult<()> {
        for (path, pid) in find_segment_files(root, name)? {
            if pid == writer_pid || is_process_alive(pid) {
                return Err(ShmError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            warn!(segment = name, stale_pid = pid, "removing stale segment");
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Replace the segment contents starting at offset 0
    pub fn write(&mut self, data: &[u8]) -> ShmResult<()> {
        self.write_at(0, data)
    }

    /// Write data at specific offset
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> ShmResult<()> {
        let end = offset.checked_add(data.len()).unwrap_or(usize::MAX);
        if end > self.segment.data_size {
            return Err(ShmError::InvalidSize { size: end });
        }

        let header_ptr = self.segment.header() as *const SegmentHeader;
        // SAFETY: bounds checked above
        let data_ptr = unsafe { self.segment.data_ptr_mut().add(offset) };
        // SAFETY: header lives as long as the mapping owned by `self`
        let header = unsafe { &*header_ptr };

        VersionCounter::advance(&header.version);
        fence(Ordering::Release);

        // SAFETY: destination range lies inside the data section
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), data_ptr, data.len());
        }

        fence(Ordering::Release);
        self.current_version = VersionCounter::advance(&header.version);
        header.last_write_ts.store(now_nanos(), Ordering::Release);

        Ok(())
    }

    /// Get current version
    pub fn current_version(&self) -> u64 {
        self.current_version
    }

    /// Get writer process ID
    pub fn writer_pid(&self) -> u32 {
        self.writer_pid
    }

    /// Get segment name
    pub fn name(&self) -> &str {
        &self.segment.name
    }

    /// Get data size
    pub fn data_size(&self) -> usize {
        self.segment.data_size
    }

    /// Number of readers currently attached
    pub fn reader_count(&self) -> u32 {
        self.segment.header().get_reader_count()
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.segment.path);
    }
}
