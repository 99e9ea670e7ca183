//! Error types for the receiver

use sfdaq_buffer::BufferError;
use thiserror::Error;

/// Result type alias for receiver operations
pub type RecvResult<T> = Result<T, RecvError>;

/// Failures of the packet intake and the receive loop.
///
/// Lost or malformed packets are not errors; they show up in the frame
/// descriptor and in the receiver counters.
#[derive(Error, Debug)]
pub enum RecvError {
    /// UDP socket could not be set up on the module port
    #[error("Failed to bind UDP port {port}: {source}")]
    Bind {
        /// Requested port
        port: u16,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Socket receive failed
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// The packet source will never deliver again
    #[error("Packet source closed")]
    SourceClosed,

    /// Caller passed a frame buffer of the wrong size
    #[error("Frame buffer is {got} bytes, expected {expected}")]
    FrameBufferSize {
        /// Module payload size
        expected: usize,
        /// Provided size
        got: usize,
    },

    /// The attached ring buffer was not created for this detector's frames
    #[error(
        "Ring buffer holds {module_n_bytes}-byte frames of {packets_per_frame} packets, \
         receiver assembles {expected_n_bytes}-byte frames of {expected_packets} packets"
    )]
    LayoutMismatch {
        /// Payload bytes per module frame in the buffer
        module_n_bytes: usize,
        /// Packets per frame in the buffer
        packets_per_frame: usize,
        /// Payload bytes per frame the receiver produces
        expected_n_bytes: usize,
        /// Packets per frame the receiver counts
        expected_packets: usize,
    },

    /// Writing a reassembled frame into the ring buffer failed
    #[error("Ring buffer error: {source}")]
    Buffer {
        /// Underlying buffer error
        #[from]
        source: BufferError,
    },
}
