//! Slot-indexed shared ring buffer of module frames

use crate::error::{BufferError, BufferResult};
use crate::layout::{BufferHeader, BufferLayout, HEADER_N_BYTES};
use crate::platform::{attach_region_mmap, create_region_mmap, get_current_pid, unlink_region};
use crate::writer::ModuleWriter;
use memmap2::MmapRaw;
use sfdaq_common::formats::{ImageMetadata, ModuleFrame, MODULE_FRAME_N_BYTES};
use std::ops::Range;
use std::sync::atomic::{Ordering, fence};
use tracing::{debug, info, warn};

/// Named shared-memory ring buffer holding one frame per (slot, module).
///
/// Exactly one process creates the buffer and owns its lifecycle; any number
/// of processes attach to it. Slot selection is `pulse_id % n_slots`. There
/// is no locking: module writers own disjoint cells (see [`ModuleWriter`]),
/// and readers detect partially written or stale slots through
/// [`assemble_image`](Self::assemble_image).
pub struct RamBuffer {
    name: String,
    layout: BufferLayout,
    mmap: MmapRaw,
    is_owner: bool,
    released: bool,
}

impl RamBuffer {
    /// Create and own a new zero-initialised buffer.
    ///
    /// Fails with [`BufferError::AlreadyExists`] if a region with this name is
    /// present; a left-over region of a crashed owner has to be removed with
    /// [`release_stale`](Self::release_stale) first.
    pub fn create(name: &str, layout: BufferLayout) -> BufferResult<Self> {
        let total_bytes = layout.total_bytes();
        let mmap = create_region_mmap(name, total_bytes)?;

        let owner_pid = get_current_pid();
        {
            // SAFETY: freshly created mapping, at least HEADER_N_BYTES long and
            // page aligned; nobody else can have validated the magic yet.
            let header = unsafe { &mut *(mmap.as_mut_ptr() as *mut BufferHeader) };
            header.initialize(&layout, owner_pid);
        }

        info!(
            name = %name,
            n_modules = layout.n_modules,
            n_slots = layout.n_slots,
            total_bytes,
            "Ring buffer created"
        );

        Ok(Self {
            name: name.to_string(),
            layout,
            mmap,
            is_owner: true,
            released: false,
        })
    }

    /// Attach to a buffer created by another process (or this one).
    pub fn attach(name: &str) -> BufferResult<Self> {
        let mmap = attach_region_mmap(name)?;
        let corrupted = |reason: String| BufferError::Corrupted {
            name: name.to_string(),
            reason,
        };

        if mmap.len() < HEADER_N_BYTES {
            return Err(corrupted(format!("region is only {} bytes", mmap.len())));
        }

        // SAFETY: length checked above; the mapping is page aligned.
        let header = unsafe { &*(mmap.as_ptr() as *const BufferHeader) };
        if !header.is_initialized() {
            return Err(corrupted("invalid magic".to_string()));
        }
        let layout = header
            .layout()
            .map_err(|e| corrupted(format!("bad geometry in header: {e}")))?;
        if mmap.len() < layout.total_bytes() {
            return Err(corrupted(format!(
                "region is {} bytes, layout needs {}",
                mmap.len(),
                layout.total_bytes()
            )));
        }

        debug!(name = %name, ?layout, "Attached to ring buffer");

        Ok(Self {
            name: name.to_string(),
            layout,
            mmap,
            is_owner: false,
            released: false,
        })
    }

    /// Unmap the buffer; the owner also unlinks the named region.
    ///
    /// Attachers never unlink, so calling this on an attached buffer only
    /// drops the local mapping.
    pub fn release(mut self) -> BufferResult<()> {
        self.released = true;
        if self.is_owner {
            unlink_region(&self.name)?;
            info!(name = %self.name, "Ring buffer released");
        }
        Ok(())
    }

    /// Buffer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Buffer geometry
    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Whether this handle created the region
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Process recorded as owner in the shared header
    pub fn owner_pid(&self) -> u32 {
        self.header().owner_pid.load(Ordering::Acquire)
    }

    pub(crate) fn header(&self) -> &BufferHeader {
        // SAFETY: validated in create/attach; the header lives as long as the mapping.
        unsafe { &*(self.mmap.as_ptr() as *const BufferHeader) }
    }

    /// Claim the exclusive write capability for `module_id`.
    ///
    /// The claimant's pid is recorded in shared memory, so the claim holds
    /// across processes: a second claim fails with
    /// [`BufferError::ModuleClaimed`] until the first writer is dropped or
    /// its process exits. A claim left behind by a dead process is taken
    /// over.
    pub fn module_writer(&self, module_id: u64) -> BufferResult<ModuleWriter<'_>> {
        let module = self.layout.module_index(module_id)?;
        let pid = get_current_pid();
        let previous = self.header().claimant(module);
        if let Err(holder) = self.header().claim_module(module, pid) {
            debug!(name = %self.name, module_id, holder, "Module writer already claimed");
            return Err(BufferError::ModuleClaimed { module_id });
        }
        match previous {
            Some(dead) if dead != pid => {
                warn!(name = %self.name, module_id, dead_pid = dead, "Took over claim of dead writer");
            }
            _ => debug!(name = %self.name, module_id, "Module writer claimed"),
        }
        Ok(ModuleWriter::new(self, module_id))
    }

    /// Whether a writer currently holds `module_id`.
    pub fn is_module_claimed(&self, module_id: u64) -> BufferResult<bool> {
        Ok(self.module_claimant(module_id)?.is_some())
    }

    /// Process recorded as writer of `module_id`, alive or not.
    pub fn module_claimant(&self, module_id: u64) -> BufferResult<Option<u32>> {
        let module = self.layout.module_index(module_id)?;
        Ok(self.header().claimant(module))
    }

    pub(crate) fn release_module(&self, module_id: u64) {
        self.header()
            .release_module(module_id as usize, get_current_pid());
    }

    /// Copy `src` into the mapped `range`.
    ///
    /// # Safety
    ///
    /// `range` must come from `self.layout` and the caller must be the only
    /// writer of it (guaranteed by holding the module's `ModuleWriter`).
    pub(crate) unsafe fn write_bytes(&self, range: Range<usize>, src: &[u8]) {
        debug_assert_eq!(range.len(), src.len());
        debug_assert!(range.end <= self.mmap.len());
        unsafe {
            let dst = self.mmap.as_mut_ptr().add(range.start);
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
        }
    }

    /// Copy the mapped `range` into `dst`.
    fn read_bytes(&self, range: Range<usize>, dst: &mut [u8]) {
        debug_assert_eq!(range.len(), dst.len());
        debug_assert!(range.end <= self.mmap.len());
        // SAFETY: every range comes from self.layout, which attach/create checked
        // against the mapping length. No reference into the mapping escapes.
        unsafe {
            let src = self.mmap.as_ptr().add(range.start);
            std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len());
        }
    }

    fn read_meta(&self, range: Range<usize>) -> ModuleFrame {
        fence(Ordering::Acquire);
        // SAFETY: range is MODULE_FRAME_N_BYTES long; any bit pattern is a valid ModuleFrame.
        unsafe { std::ptr::read_unaligned(self.mmap.as_ptr().add(range.start) as *const ModuleFrame) }
    }

    /// Read whatever currently occupies (`pulse_id % n_slots`, `module_id`).
    ///
    /// The payload is copied into `dst_data`, which must be exactly
    /// `module_n_bytes` long. The returned descriptor may belong to an older
    /// pulse with the same slot residue.
    pub fn read_frame(
        &self,
        pulse_id: u64,
        module_id: u64,
        dst_data: &mut [u8],
    ) -> BufferResult<ModuleFrame> {
        if dst_data.len() != self.layout.module_n_bytes {
            return Err(BufferError::PayloadSize {
                expected: self.layout.module_n_bytes,
                got: dst_data.len(),
            });
        }

        let slot = self.layout.slot_of(pulse_id);
        let meta = self.read_meta(self.layout.meta_range(slot, module_id)?);
        self.read_bytes(self.layout.data_range(slot, module_id)?, dst_data);
        Ok(meta)
    }

    /// Aggregate all module descriptors of the slot holding `pulse_id`.
    ///
    /// The first complete module seeds pulse id, frame index and DAQ record;
    /// every later complete module must agree with the seed. The image is
    /// good only if all modules are complete, all agree, and the seed belongs
    /// to `pulse_id` itself rather than an older pulse in the same slot. If no
    /// module is complete the seed fields stay zero.
    pub fn assemble_image(&self, pulse_id: u64) -> ImageMetadata {
        let slot = self.layout.slot_of(pulse_id);
        let slot_meta = match self.layout.slot_meta_range(slot) {
            Ok(range) => range,
            Err(_) => return ImageMetadata::default(),
        };

        let mut image_meta = ImageMetadata {
            is_good_image: true,
            ..Default::default()
        };
        let mut is_pulse_init = false;

        for i_module in 0..self.layout.n_modules {
            let start = slot_meta.start + MODULE_FRAME_N_BYTES * i_module;
            let frame_meta = self.read_meta(start..start + MODULE_FRAME_N_BYTES);

            if !frame_meta.is_good_frame(self.layout.packets_per_frame) {
                image_meta.is_good_image = false;
                continue;
            }

            if !is_pulse_init {
                image_meta.pulse_id = frame_meta.pulse_id;
                image_meta.frame_index = frame_meta.frame_index;
                image_meta.daq_rec = frame_meta.daq_rec;
                is_pulse_init = true;

                if frame_meta.pulse_id != pulse_id {
                    warn!(
                        expected = pulse_id,
                        got = frame_meta.pulse_id,
                        module = i_module,
                        "Unexpected pulse_id in ram buffer"
                    );
                    image_meta.is_good_image = false;
                }
                continue;
            }

            if frame_meta.pulse_id != image_meta.pulse_id
                || frame_meta.frame_index != image_meta.frame_index
                || frame_meta.daq_rec != image_meta.daq_rec
            {
                debug!(
                    pulse_id,
                    module = i_module,
                    module_pulse_id = frame_meta.pulse_id,
                    module_frame_index = frame_meta.frame_index,
                    "Module disagrees with image seed"
                );
                image_meta.is_good_image = false;
            }
        }

        image_meta
    }

    /// Copy all module payloads of the slot holding `pulse_id` into `dst`.
    ///
    /// `dst` must be `image_bytes()` long; module `m` lands at
    /// `m * module_n_bytes`. Writers may update the slot during the copy, so
    /// check [`assemble_image`](Self::assemble_image) before and after when
    /// the copy must be consistent.
    pub fn read_image(&self, pulse_id: u64, dst: &mut [u8]) -> BufferResult<()> {
        if dst.len() != self.layout.image_bytes() {
            return Err(BufferError::PayloadSize {
                expected: self.layout.image_bytes(),
                got: dst.len(),
            });
        }
        let range = self.layout.image_range(self.layout.slot_of(pulse_id))?;
        fence(Ordering::Acquire);
        self.read_bytes(range, dst);
        Ok(())
    }
}

impl Drop for RamBuffer {
    fn drop(&mut self) {
        if self.is_owner && !self.released {
            if let Err(e) = unlink_region(&self.name) {
                warn!(name = %self.name, error = %e, "Failed to unlink ring buffer on drop");
            }
        }
    }
}
