//! Linux-specific shared memory operations

use crate::error::ShmResult;
use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;

/// Create a memory-mapped, file-backed segment at `path` with the given size.
///
/// `exclusive` requests `O_EXCL` semantics so two creators racing on the same
/// name cannot both succeed; the caller maps `AlreadyExists` onto the I/O
/// error this produces.
pub fn create_segment_mmap(path: &str, size: usize, exclusive: bool) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create(true)
        .create_new(exclusive)
        .read(true)
        .write(true)
        .mode(0o600)
        .open(path)?;

    file.set_len(size as u64)?;

    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Attach to an existing segment at `path`.
pub fn attach_segment_mmap(path: &str) -> ShmResult<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Check if process is alive using `kill(pid, 0)`.
///
/// `pid` values that do not fit a real PID (`0`, or anything beyond
/// `i32::MAX`) are reported dead without calling `kill`: `0` and negative
/// values have process-group/broadcast semantics for `kill(2)`, not
/// per-process ones, and a stored `lock_owner_pid` of `0` already means "no
/// owner".
pub fn is_process_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    #[cfg(target_os = "linux")]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), None) {
            Ok(_) => true,
            Err(nix::Error::ESRCH) => false, // No such process
            Err(nix::Error::EPERM) => true,  // Process exists but no permission to signal
            Err(_) => false,
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(get_current_pid()));
    }

    #[test]
    fn implausible_pid_is_not_alive() {
        assert!(!is_process_alive(u32::MAX));
    }
}
