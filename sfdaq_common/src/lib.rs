//! sf-daq Common Library
//!
//! Shared binary formats, detector geometry constants and configuration
//! loading for the acquisition core crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Detector geometry and buffer defaults
//! - [`formats`] - Wire/shared-memory records (`PacketFrame`, `ModuleFrame`, `ImageMetadata`)
//! - [`buffer_utils`] - Pulse id to on-disk file addressing
//! - [`config`] - TOML configuration loading traits and types
//! - [`logging`] - Tracing subscriber setup for binaries
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use sfdaq_common::formats::ModuleFrame;
//! use sfdaq_common::consts::N_PACKETS_PER_FRAME;
//!
//! let frame = ModuleFrame { n_recv_packets: N_PACKETS_PER_FRAME as u64, ..Default::default() };
//! assert!(frame.is_good_frame(N_PACKETS_PER_FRAME));
//! ```

pub mod buffer_utils;
pub mod config;
pub mod consts;
pub mod formats;
pub mod logging;
pub mod prelude;
