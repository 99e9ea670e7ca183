//! Prelude module for common re-exports.
//!
//! ```rust
//! use sfdaq_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, DetectorConfig, LogLevel, SharedConfig};

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::logging::init_tracing;

// ─── Geometry ───────────────────────────────────────────────────────
pub use crate::consts::{
    BYTES_PER_PACKET, DATA_BYTES_PER_PACKET, MODULE_N_BYTES, N_PACKETS_PER_FRAME,
};

// ─── Binary formats ─────────────────────────────────────────────────
pub use crate::formats::{ImageMetadata, ModuleFrame, PacketFrame, MODULE_FRAME_N_BYTES};
