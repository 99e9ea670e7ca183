//! Recovery of regions left behind by a crashed owner

use crate::error::{BufferError, BufferResult};
use crate::layout::{BufferHeader, HEADER_N_BYTES};
use crate::platform::{attach_region_mmap, is_process_alive, unlink_region};
use crate::ram_buffer::RamBuffer;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

/// State of a named region as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    /// No region with this name exists
    Absent,
    /// Region exists and its owner process is running
    Owned {
        /// Owner process ID
        pid: u32,
    },
    /// Region exists but its owner is gone (or it was never initialised)
    Stale,
}

/// Inspect the named region without keeping it mapped.
pub fn region_state(name: &str) -> BufferResult<RegionState> {
    let mmap = match attach_region_mmap(name) {
        Ok(mmap) => mmap,
        Err(BufferError::NotFound { .. }) => return Ok(RegionState::Absent),
        Err(BufferError::Corrupted { .. }) => return Ok(RegionState::Stale),
        Err(e) => return Err(e),
    };

    if mmap.len() < HEADER_N_BYTES {
        return Ok(RegionState::Stale);
    }

    // SAFETY: length checked; the mapping is page aligned.
    let header = unsafe { &*(mmap.as_ptr() as *const BufferHeader) };
    if !header.is_initialized() {
        return Ok(RegionState::Stale);
    }

    let pid = header.owner_pid.load(Ordering::Acquire);
    if pid != 0 && is_process_alive(pid) {
        Ok(RegionState::Owned { pid })
    } else {
        Ok(RegionState::Stale)
    }
}

impl RamBuffer {
    /// Remove a region whose owner is no longer running.
    ///
    /// Returns `Ok(true)` if a stale region was unlinked and `Ok(false)` if
    /// there was nothing to remove. Refuses with [`BufferError::OwnerAlive`]
    /// while the recorded owner process still exists.
    pub fn release_stale(name: &str) -> BufferResult<bool> {
        match region_state(name)? {
            RegionState::Absent => Ok(false),
            RegionState::Owned { pid } => {
                warn!(name = %name, pid, "Refusing to release ring buffer with live owner");
                Err(BufferError::OwnerAlive {
                    name: name.to_string(),
                    pid,
                })
            }
            RegionState::Stale => {
                unlink_region(name)?;
                info!(name = %name, "Released stale ring buffer");
                Ok(true)
            }
        }
    }
}
