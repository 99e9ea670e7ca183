//! Per-module write capability

use crate::error::{BufferError, BufferResult};
use crate::ram_buffer::RamBuffer;
use sfdaq_common::formats::ModuleFrame;
use std::sync::atomic::{Ordering, fence};
use tracing::debug;

/// Exclusive right to write frames of one module into a [`RamBuffer`].
///
/// Obtained from [`RamBuffer::module_writer`]. Not clonable; at most one
/// exists per module across every process attached to the buffer, which is
/// what makes the unlocked writes race-free: distinct modules never share
/// bytes, and one module has exactly one writer.
pub struct ModuleWriter<'a> {
    buffer: &'a RamBuffer,
    module_id: u64,
    n_written: u64,
}

impl<'a> ModuleWriter<'a> {
    pub(crate) fn new(buffer: &'a RamBuffer, module_id: u64) -> Self {
        Self {
            buffer,
            module_id,
            n_written: 0,
        }
    }

    /// Module this writer owns
    pub fn module_id(&self) -> u64 {
        self.module_id
    }

    /// Frames written through this handle
    pub fn frames_written(&self) -> u64 {
        self.n_written
    }

    /// Store `meta` and `data` in slot `meta.pulse_id % n_slots`.
    ///
    /// Overwrites whatever frame previously occupied the cell. `meta` must
    /// name this writer's module and `data` must be exactly one module
    /// payload long.
    pub fn write_frame(&mut self, meta: &ModuleFrame, data: &[u8]) -> BufferResult<()> {
        if meta.module_id != self.module_id {
            return Err(BufferError::ModuleMismatch {
                expected: self.module_id,
                got: meta.module_id,
            });
        }

        let layout = self.buffer.layout();
        if data.len() != layout.module_n_bytes {
            return Err(BufferError::PayloadSize {
                expected: layout.module_n_bytes,
                got: data.len(),
            });
        }

        let slot = layout.slot_of(meta.pulse_id);
        let meta_range = layout.meta_range(slot, self.module_id)?;
        let data_range = layout.data_range(slot, self.module_id)?;

        // Payload before descriptor: a reader that sees the new descriptor
        // also sees its payload.
        // SAFETY: ranges come from the buffer layout and belong to our module.
        unsafe {
            self.buffer.write_bytes(data_range, data);
            fence(Ordering::Release);
            self.buffer.write_bytes(meta_range, meta.as_bytes());
        }
        fence(Ordering::Release);

        self.n_written += 1;
        Ok(())
    }
}

impl Drop for ModuleWriter<'_> {
    fn drop(&mut self) {
        self.buffer.release_module(self.module_id);
        debug!(
            name = %self.buffer.name(),
            module_id = self.module_id,
            frames = self.n_written,
            "Module writer released"
        );
    }
}
