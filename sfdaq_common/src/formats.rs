//! Fixed-layout binary records shared between the receiver, the ring buffer
//! and any downstream consumer.
//!
//! All structs are plain-old-data: every bit pattern is a valid value, there
//! is no implicit padding, and the sizes are checked at compile time. This is
//! what allows them to be received straight from a socket and copied in and
//! out of shared memory as raw bytes.

use crate::consts::{BYTES_PER_PACKET, DATA_BYTES_PER_PACKET, PACKET_HEADER_PAD};
use static_assertions::const_assert_eq;
use std::fmt;

/// One detector UDP packet, exactly as it appears on the wire.
///
/// Layout (byte offsets): header pad 0, frame number 6, exposure time 14,
/// packet number 18, bunch id 22, timestamp 30, module id 38, coordinates
/// 40/42/44, debug 46, round robin 50, detector type 52, header version 53,
/// data 54..8246.
#[derive(Clone, Copy)]
#[repr(C, packed)]
pub struct PacketFrame {
    /// Opaque leading bytes, never interpreted.
    pub empty_header: [u8; PACKET_HEADER_PAD],
    /// Module-local frame counter.
    pub frame_number: u64,
    /// Exposure time reported by the module.
    pub exposure_time: u32,
    /// Sequence number of this packet within the frame.
    pub packet_number: u32,
    /// Bunch / timing identifier.
    pub bunch_id: u64,
    /// Timing system timestamp; carries the pulse id.
    pub timestamp: u64,
    /// Physical module identifier.
    pub module_id: u16,
    /// Spatial x coordinate.
    pub x_coord: u16,
    /// Spatial y coordinate.
    pub y_coord: u16,
    /// Spatial z coordinate.
    pub z_coord: u16,
    /// Debug field; carries the DAQ record.
    pub debug: u32,
    /// Round-robin counter.
    pub round_robin: u16,
    /// Detector type code.
    pub detector_type: u8,
    /// Packet header version.
    pub header_version: u8,
    /// One fragment of the module pixel image.
    pub data: [u8; DATA_BYTES_PER_PACKET],
}

const_assert_eq!(core::mem::size_of::<PacketFrame>(), BYTES_PER_PACKET);
const_assert_eq!(core::mem::align_of::<PacketFrame>(), 1);

impl Default for PacketFrame {
    fn default() -> Self {
        // SAFETY: all fields are integers or byte arrays; zero is valid for each.
        unsafe { core::mem::zeroed() }
    }
}

impl PacketFrame {
    /// View the packet as its wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: packed POD struct of BYTES_PER_PACKET bytes, alignment 1.
        unsafe { std::slice::from_raw_parts(self as *const Self as *const u8, BYTES_PER_PACKET) }
    }

    /// Mutable wire view, used to receive a datagram in place.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above; any byte pattern written through the slice is a valid PacketFrame.
        unsafe { std::slice::from_raw_parts_mut(self as *mut Self as *mut u8, BYTES_PER_PACKET) }
    }

    /// Decode a packet from exactly `BYTES_PER_PACKET` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != BYTES_PER_PACKET {
            return None;
        }
        // SAFETY: length checked; read_unaligned tolerates any source alignment.
        Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const Self) })
    }
}

impl fmt::Debug for PacketFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Braces copy the packed fields out before borrowing them.
        f.debug_struct("PacketFrame")
            .field("frame_number", &{ self.frame_number })
            .field("packet_number", &{ self.packet_number })
            .field("timestamp", &{ self.timestamp })
            .field("module_id", &{ self.module_id })
            .field("debug", &{ self.debug })
            .finish_non_exhaustive()
    }
}

/// Metadata of one module frame as stored in the ring buffer.
///
/// Size: 40 bytes (5×u64), no padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ModuleFrame {
    /// Acquisition pulse id; selects the ring buffer slot.
    pub pulse_id: u64,
    /// Module-local frame counter.
    pub frame_index: u64,
    /// Opaque DAQ record passed through from the detector.
    pub daq_rec: u64,
    /// Number of distinct packets received for this frame.
    pub n_recv_packets: u64,
    /// Module this frame belongs to.
    pub module_id: u64,
}

const_assert_eq!(core::mem::size_of::<ModuleFrame>(), 40);

/// Size of the binary `ModuleFrame` block.
pub const MODULE_FRAME_N_BYTES: usize = core::mem::size_of::<ModuleFrame>();

impl ModuleFrame {
    /// Empty descriptor owned by `module_id`.
    pub const fn for_module(module_id: u64) -> Self {
        Self {
            pulse_id: 0,
            frame_index: 0,
            daq_rec: 0,
            n_recv_packets: 0,
            module_id,
        }
    }

    /// A frame is good when every expected packet arrived.
    #[inline]
    pub const fn is_good_frame(&self, packets_per_frame: usize) -> bool {
        self.n_recv_packets == packets_per_frame as u64
    }

    /// Zero everything except the module id.
    pub fn reset(&mut self) {
        *self = Self::for_module(self.module_id);
    }

    /// View the descriptor as its binary block.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: repr(C) struct of five u64, no padding.
        unsafe {
            std::slice::from_raw_parts(self as *const Self as *const u8, MODULE_FRAME_N_BYTES)
        }
    }

    /// Decode a descriptor from exactly `MODULE_FRAME_N_BYTES` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != MODULE_FRAME_N_BYTES {
            return None;
        }
        // SAFETY: length checked; every bit pattern is a valid ModuleFrame.
        Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const Self) })
    }
}

/// Result of assembling all modules of one ring buffer slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Pulse id of the first complete module (0 if none).
    pub pulse_id: u64,
    /// Frame index of the first complete module (0 if none).
    pub frame_index: u64,
    /// DAQ record of the first complete module (0 if none).
    pub daq_rec: u64,
    /// All modules complete and consistent with each other.
    pub is_good_image: bool,
}
