//! # sf-daq RAM Buffer
//!
//! A named shared-memory ring buffer that stages per-module detector frames
//! and assembles them into full images. Module receivers write into it
//! independently; writers, streamers and replay tools read from it without
//! any synchronization with the producers.
//!
//! ## Features
//!
//! - **Slot addressing**: `pulse_id % n_slots` selects the slot; one frame per module per slot
//! - **Lock-free writes**: each module has exactly one writer capability, so writers never share bytes
//! - **Consistency verdict**: image assembly detects incomplete, mixed and stale slots
//! - **Explicit lifecycle**: one owner creates and releases; attachers never unlink
//! - **Bounds-checked layout**: every byte range is derived from the validated geometry
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────┐    ┌─────────────────┐
//! │ udp_recv M0     │    │  Shared Memory       │    │ Image writer    │
//! │ ModuleWriter(0) ├───►│                      ├───►│ assemble_image  │
//! └─────────────────┘    │ [Header|Meta|Data]   │    │ read_image      │
//! ┌─────────────────┐    │ slot = pulse % slots │    └─────────────────┘
//! │ udp_recv M1     ├───►│                      │    ┌─────────────────┐
//! │ ModuleWriter(1) │    │                      ├───►│ Streamer        │
//! └─────────────────┘    └──────────────────────┘    │ read_frame      │
//!                                                    └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use sfdaq_buffer::{BufferLayout, RamBuffer};
//! use sfdaq_common::formats::ModuleFrame;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = BufferLayout::new(2, 10, 1024, 4)?;
//! let buffer = RamBuffer::create("doc_example", layout)?;
//!
//! let mut meta = ModuleFrame { pulse_id: 42, frame_index: 7, n_recv_packets: 4, ..Default::default() };
//! for module_id in 0..2 {
//!     let mut writer = buffer.module_writer(module_id)?;
//!     meta.module_id = module_id;
//!     writer.write_frame(&meta, &[0u8; 1024])?;
//! }
//!
//! let image = buffer.assemble_image(42);
//! assert!(image.is_good_image);
//!
//! let mut pixels = vec![0u8; layout.image_bytes()];
//! buffer.read_image(42, &mut pixels)?;
//!
//! buffer.release()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Setup failures (creating, attaching, claiming) return `BufferError`.
//! Data inconsistencies never fail: they are reported through
//! `ImageMetadata::is_good_image`.
//!
//! ## Thread Safety
//!
//! - **RamBuffer**: `Send + Sync`; reads may run concurrently with writes
//! - **ModuleWriter**: one per module, `Send`, writes need `&mut`

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod platform;
pub mod ram_buffer;
pub mod writer;

pub use error::{BufferError, BufferResult};
pub use layout::{BufferHeader, BufferLayout, HEADER_N_BYTES, SFDAQ_BUFFER_MAGIC};
pub use lifecycle::{RegionState, region_state};
pub use ram_buffer::RamBuffer;
pub use writer::ModuleWriter;
