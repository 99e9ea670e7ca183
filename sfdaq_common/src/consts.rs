//! Detector geometry and buffer constants.
//!
//! Single source of truth for packet sizes, frame geometry and the file
//! addressing moduli. Other crates import these instead of redefining them.

/// Opaque header bytes preceding the packet fields on the wire.
pub const PACKET_HEADER_PAD: usize = 6;

/// Pixel payload bytes carried by one packet.
pub const DATA_BYTES_PER_PACKET: usize = 8192;

/// Number of packets a module needs to send for one complete frame.
pub const N_PACKETS_PER_FRAME: usize = 128;

/// Total size of one packet datagram (6 + 48 + 8192 bytes).
pub const BYTES_PER_PACKET: usize = 8246;

/// Pixel payload bytes of one complete module frame (1 MiB).
pub const MODULE_N_BYTES: usize = DATA_BYTES_PER_PACKET * N_PACKETS_PER_FRAME;

/// Maximum number of modules a ring buffer can hold (size of the writer claim table).
pub const MAX_MODULES: usize = 256;

/// Default number of ring buffer slots.
pub const RAM_BUFFER_N_SLOTS: usize = 1000;

/// Capacity of the receiver intake queue, in packets.
pub const BUFFER_UDP_N_RECV_MSG: usize = 64;

/// Kernel receive buffer requested for the module UDP socket.
pub const BUFFER_UDP_RCVBUF_BYTES: usize = 100 * 1024 * 1024;

/// Read timeout of the module UDP socket in microseconds.
pub const BUFFER_UDP_US_TIMEOUT: u64 = 2 * 1000;

/// Pulses grouped into one destination folder.
pub const FOLDER_MOD: u64 = 100_000;

/// Pulses grouped into one destination file.
pub const FILE_MOD: u64 = 1000;

/// Extension of the binary buffer files.
pub const FILE_EXTENSION: &str = ".bin";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sfdaq/detector.toml";
