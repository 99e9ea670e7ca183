//! Ring buffer memory layout and header
//!
//! ```text
//! ┌──────────────┬───────────────────────────────┬────────────────────────────────┐
//! │ BufferHeader │ descriptors                   │ payloads                       │
//! │ (1088 bytes) │ slot 0: M0 M1 .. Mn-1         │ slot 0: M0 M1 .. Mn-1          │
//! │              │ slot 1: M0 M1 .. Mn-1   ...   │ slot 1: M0 M1 .. Mn-1   ...    │
//! └──────────────┴───────────────────────────────┴────────────────────────────────┘
//! ```
//!
//! Descriptors of all slots sit together so metadata scans never touch
//! pixel data. The payload region starts on a cache line boundary. Every
//! offset handed out by [`BufferLayout`] is bounds-checked against the
//! geometry, so index arithmetic can never leave the mapped region.

use crate::error::{BufferError, BufferResult};
use crate::platform::is_process_alive;
use sfdaq_common::consts::{MAX_MODULES, MODULE_N_BYTES, N_PACKETS_PER_FRAME};
use sfdaq_common::formats::MODULE_FRAME_N_BYTES;
use static_assertions::const_assert_eq;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Magic number identifying an initialised ring buffer: `"SFDAQRB1"`.
pub const SFDAQ_BUFFER_MAGIC: u64 = u64::from_le_bytes(*b"SFDAQRB1");

/// CPU cache line size in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Header at offset 0 of every ring buffer region.
///
/// `magic` is stored last (release) by the creator, so an attacher that
/// observes it (acquire) also observes the geometry fields.
#[repr(C, align(64))]
pub struct BufferHeader {
    /// Magic number for validation
    pub magic: AtomicU64,
    /// Modules per slot
    pub n_modules: u64,
    /// Number of slots
    pub n_slots: u64,
    /// Payload bytes per module frame
    pub module_n_bytes: u64,
    /// Packets that make a module frame complete
    pub packets_per_frame: u64,
    /// Process that created the region and must release it
    pub owner_pid: AtomicU32,
    _reserved: u32,
    /// Process holding each module's `ModuleWriter`, 0 if unclaimed
    pub writer_pids: [AtomicU32; MAX_MODULES],
}

const_assert_eq!(core::mem::size_of::<BufferHeader>(), 1088);

/// Bytes reserved for the header.
pub const HEADER_N_BYTES: usize = core::mem::size_of::<BufferHeader>();

impl BufferHeader {
    /// Fill in a freshly zeroed header. Publishes the magic last.
    pub fn initialize(&mut self, layout: &BufferLayout, owner_pid: u32) {
        self.n_modules = layout.n_modules as u64;
        self.n_slots = layout.n_slots as u64;
        self.module_n_bytes = layout.module_n_bytes as u64;
        self.packets_per_frame = layout.packets_per_frame as u64;
        self.owner_pid.store(owner_pid, Ordering::Relaxed);
        for pid in &self.writer_pids {
            pid.store(0, Ordering::Relaxed);
        }
        self.magic.store(SFDAQ_BUFFER_MAGIC, Ordering::Release);
    }

    /// Check the magic number.
    pub fn is_initialized(&self) -> bool {
        self.magic.load(Ordering::Acquire) == SFDAQ_BUFFER_MAGIC
    }

    /// Geometry recorded in the header.
    pub fn layout(&self) -> BufferResult<BufferLayout> {
        BufferLayout::new(
            self.n_modules as usize,
            self.n_slots as usize,
            self.module_n_bytes as usize,
            self.packets_per_frame as usize,
        )
    }

    /// Record `pid` as the writer of `module`.
    ///
    /// A claim held by a process that no longer exists is taken over.
    /// Returns the live claimant's pid if the module is taken.
    pub fn claim_module(&self, module: usize, pid: u32) -> Result<(), u32> {
        let slot = &self.writer_pids[module];
        let mut current = 0;
        loop {
            match slot.compare_exchange(current, pid, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(()),
                Err(holder) if holder != 0 && is_process_alive(holder) => return Err(holder),
                // Unclaimed again, or the holder died: retry against what we saw.
                Err(holder) => current = holder,
            }
        }
    }

    /// Clear the claim of `module` if `pid` still holds it.
    pub fn release_module(&self, module: usize, pid: u32) {
        let _ = self.writer_pids[module].compare_exchange(pid, 0, Ordering::AcqRel, Ordering::Relaxed);
    }

    /// Process recorded as writer of `module`, if any.
    pub fn claimant(&self, module: usize) -> Option<u32> {
        match self.writer_pids[module].load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }
}

/// Geometry of a ring buffer and the byte ranges derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// Modules per slot
    pub n_modules: usize,
    /// Number of slots
    pub n_slots: usize,
    /// Payload bytes per module frame
    pub module_n_bytes: usize,
    /// Packets that make a module frame complete
    pub packets_per_frame: usize,
}

impl BufferLayout {
    /// Validate dimensions and build a layout.
    pub fn new(
        n_modules: usize,
        n_slots: usize,
        module_n_bytes: usize,
        packets_per_frame: usize,
    ) -> BufferResult<Self> {
        let invalid = |reason: String| Err(BufferError::InvalidLayout { reason });

        if n_modules == 0 || n_modules > MAX_MODULES {
            return invalid(format!("n_modules must be in 1..={MAX_MODULES}, got {n_modules}"));
        }
        if n_slots == 0 {
            return invalid("n_slots cannot be 0".to_string());
        }
        if module_n_bytes == 0 {
            return invalid("module_n_bytes cannot be 0".to_string());
        }
        if packets_per_frame == 0 {
            return invalid("packets_per_frame cannot be 0".to_string());
        }

        let layout = Self {
            n_modules,
            n_slots,
            module_n_bytes,
            packets_per_frame,
        };
        if layout.checked_total_bytes().is_none() {
            return invalid(format!(
                "{n_slots} slots x {n_modules} modules x {module_n_bytes} bytes overflows"
            ));
        }
        Ok(layout)
    }

    /// Layout for Jungfrau modules (1 MiB frames of 128 packets).
    pub fn jungfrau(n_modules: usize, n_slots: usize) -> BufferResult<Self> {
        Self::new(n_modules, n_slots, MODULE_N_BYTES, N_PACKETS_PER_FRAME)
    }

    /// Descriptor bytes of one slot.
    pub fn meta_bytes(&self) -> usize {
        MODULE_FRAME_N_BYTES * self.n_modules
    }

    /// Payload bytes of one slot (one full image).
    pub fn image_bytes(&self) -> usize {
        self.module_n_bytes * self.n_modules
    }

    /// Offset of the payload region.
    pub fn data_offset(&self) -> usize {
        cache_aligned_size(HEADER_N_BYTES + self.meta_bytes() * self.n_slots)
    }

    /// Size of the whole mapped region.
    pub fn total_bytes(&self) -> usize {
        self.data_offset() + self.image_bytes() * self.n_slots
    }

    fn checked_total_bytes(&self) -> Option<usize> {
        let meta = MODULE_FRAME_N_BYTES
            .checked_mul(self.n_modules)?
            .checked_mul(self.n_slots)?
            .checked_add(HEADER_N_BYTES + CACHE_LINE_SIZE)?;
        let data = self
            .module_n_bytes
            .checked_mul(self.n_modules)?
            .checked_mul(self.n_slots)?;
        meta.checked_add(data)
    }

    /// Slot holding `pulse_id`.
    #[inline]
    pub fn slot_of(&self, pulse_id: u64) -> usize {
        (pulse_id % self.n_slots as u64) as usize
    }

    /// Validate a module id and convert it to an index.
    pub fn module_index(&self, module_id: u64) -> BufferResult<usize> {
        if module_id >= self.n_modules as u64 {
            return Err(BufferError::ModuleOutOfRange {
                module_id,
                n_modules: self.n_modules,
            });
        }
        Ok(module_id as usize)
    }

    fn check_slot(&self, slot: usize) -> BufferResult<()> {
        if slot >= self.n_slots {
            return Err(BufferError::SlotOutOfRange {
                slot,
                n_slots: self.n_slots,
            });
        }
        Ok(())
    }

    /// Descriptors of every module in `slot`.
    pub fn slot_meta_range(&self, slot: usize) -> BufferResult<Range<usize>> {
        self.check_slot(slot)?;
        let start = HEADER_N_BYTES + self.meta_bytes() * slot;
        Ok(start..start + self.meta_bytes())
    }

    /// Descriptor of (`slot`, `module_id`).
    pub fn meta_range(&self, slot: usize, module_id: u64) -> BufferResult<Range<usize>> {
        let module = self.module_index(module_id)?;
        let start = self.slot_meta_range(slot)?.start + MODULE_FRAME_N_BYTES * module;
        Ok(start..start + MODULE_FRAME_N_BYTES)
    }

    /// Payloads of every module in `slot`, contiguous.
    pub fn image_range(&self, slot: usize) -> BufferResult<Range<usize>> {
        self.check_slot(slot)?;
        let start = self.data_offset() + self.image_bytes() * slot;
        Ok(start..start + self.image_bytes())
    }

    /// Payload of (`slot`, `module_id`).
    pub fn data_range(&self, slot: usize, module_id: u64) -> BufferResult<Range<usize>> {
        let module = self.module_index(module_id)?;
        let start = self.image_range(slot)?.start + self.module_n_bytes * module;
        Ok(start..start + self.module_n_bytes)
    }
}

/// Round up to a multiple of the cache line size.
pub fn cache_aligned_size(size: usize) -> usize {
    (size + CACHE_LINE_SIZE - 1) & !(CACHE_LINE_SIZE - 1)
}
