//! Linux-specific shared memory operations

use crate::error::{ShmError, ShmResult};
use crate::segment::FILE_PREFIX;
use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Create the backing file and map it read-write
pub fn create_segment_mmap(path: &Path, size: usize) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600)
        .open(path)?;

    file.set_len(size as u64)?;

    // SAFETY: the file was just created by this process and is never truncated
    let mmap = unsafe { MmapOptions::new().populate().map_mut(&file)? };
    Ok(mmap)
}

/// Attach to an existing segment file
pub fn attach_segment_mmap(path: &Path) -> ShmResult<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;

    // SAFETY: writers never shrink a segment file while it exists
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(_) => true,
        Err(nix::Error::EPERM) => true,
        Err(_) => false,
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}

/// Segment files for `name` under `root`, with the writer pid parsed from the file name
pub fn find_segment_files(root: &Path, name: &str) -> ShmResult<Vec<(PathBuf, u32)>> {
    let entries = std::fs::read_dir(root).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ShmError::NotFound {
                name: root.display().to_string(),
            }
        } else {
            ShmError::Io { source: e }
        }
    })?;

    let pattern = format!("{FILE_PREFIX}{name}_");
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        // "<name>_<pid>": the remainder must be all digits, so "emc_cmd" never matches "emc_cmd_x_1"
        if let Some(pid) = file_name
            .strip_prefix(&pattern)
            .and_then(|rest| rest.parse::<u32>().ok())
        {
            found.push((entry.path(), pid));
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(get_current_pid()));
        assert!(!is_process_alive(u32::MAX));
    }

    #[test]
    fn finds_only_exact_names() {
        let root = tempfile::tempdir().unwrap();
        for file in ["hmi_emc_cmd_10", "hmi_emc_cmd_x_11", "hmi_emc_cmd_abc", "other_emc_cmd_12"] {
            std::fs::write(root.path().join(file), b"").unwrap();
        }
        let found = find_segment_files(root.path(), "emc_cmd").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, 10);
    }

    #[test]
    fn missing_root_is_not_found() {
        let result = find_segment_files(Path::new("/nonexistent/shm/root"), "emc_cmd");
        assert!(matches!(result, Err(ShmError::NotFound { .. })));
    }
}
