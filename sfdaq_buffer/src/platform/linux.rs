//! Linux-specific shared memory operations

use crate::error::{BufferError, BufferResult};
use memmap2::{MmapOptions, MmapRaw};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::getpid;
use std::fs::File;

/// POSIX shm object name for a ring buffer, e.g. `/sfdaq_JF07T32V01`.
pub fn shm_object_name(name: &str) -> String {
    format!("/sfdaq_{}", name)
}

fn map_errno(errno: Errno, name: &str) -> BufferError {
    match errno {
        Errno::EEXIST => BufferError::AlreadyExists {
            name: name.to_string(),
        },
        Errno::ENOENT => BufferError::NotFound {
            name: name.to_string(),
        },
        Errno::EACCES | Errno::EPERM => BufferError::PermissionDenied {
            name: name.to_string(),
        },
        other => BufferError::Nix { source: other },
    }
}

/// Create a new zero-filled region of `size` bytes. Fails if it exists.
pub fn create_region_mmap(name: &str, size: usize) -> BufferResult<MmapRaw> {
    let object = shm_object_name(name);

    // Owner and group read/write, so module receivers running as a
    // different user of the daq group can attach.
    let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP;
    let fd = shm_open(
        object.as_str(),
        OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
        mode,
    )
    .map_err(|e| map_errno(e, name))?;
    let file = File::from(fd);

    let mapped = file
        .set_len(size as u64)
        .map_err(BufferError::from)
        .and_then(|_| {
            MmapOptions::new()
                .len(size)
                .map_raw(&file)
                .map_err(BufferError::from)
        });

    if mapped.is_err() {
        let _ = shm_unlink(object.as_str());
    }
    mapped
}

/// Map an existing region in full.
pub fn attach_region_mmap(name: &str) -> BufferResult<MmapRaw> {
    let object = shm_object_name(name);
    let fd = shm_open(object.as_str(), OFlag::O_RDWR, Mode::empty())
        .map_err(|e| map_errno(e, name))?;
    let file = File::from(fd);

    let size = file.metadata()?.len() as usize;
    if size == 0 {
        return Err(BufferError::Corrupted {
            name: name.to_string(),
            reason: "region has zero length".to_string(),
        });
    }

    let mmap = MmapOptions::new().len(size).map_raw(&file)?;
    Ok(mmap)
}

/// Remove the named region. Existing mappings stay valid until unmapped.
pub fn unlink_region(name: &str) -> BufferResult<()> {
    shm_unlink(shm_object_name(name).as_str()).map_err(|e| map_errno(e, name))
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(Errno::ESRCH) => false,
        Err(Errno::EPERM) => true, // exists, but owned by another user
        Err(_) => false,
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}
