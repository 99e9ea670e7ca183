//! # sf-daq UDP Receiver
//!
//! Reassembles the packet stream of one detector module into module frames
//! and writes them into the shared RAM buffer.
//!
//! ```text
//! UdpPacketSource ──► PacketBuffer ──► FrameUdpReceiver ──► ModuleWriter
//!   (socket2)         (batch queue)    (reassembly)         (sfdaq_buffer)
//! ```
//!
//! Loss is detected without timers: a frame ends with its last packet or,
//! if that one was lost, with the first packet of the next frame.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sfdaq_common::consts::MODULE_N_BYTES;
//! use sfdaq_common::formats::ModuleFrame;
//! use sfdaq_udp_recv::FrameUdpReceiver;
//!
//! # fn main() -> Result<(), sfdaq_udp_recv::RecvError> {
//! let mut receiver = FrameUdpReceiver::bind(50020, 100 * 1024 * 1024)?;
//! let mut meta = ModuleFrame::for_module(0);
//! let mut data = vec![0u8; MODULE_N_BYTES];
//!
//! while let Some(pulse_id) = receiver.get_frame_from_udp(&mut meta, &mut data)? {
//!     println!("pulse {pulse_id}: {} packets", meta.n_recv_packets);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod packet_buffer;
pub mod pipeline;
pub mod receiver;
pub mod source;
pub mod stats;

pub use config::{ReceiverConfig, ReceiverSettings};
pub use error::{RecvError, RecvResult};
pub use packet_buffer::PacketBuffer;
pub use pipeline::{check_layout, run_module};
pub use receiver::FrameUdpReceiver;
pub use source::{PacketSource, UdpPacketSource};
pub use stats::FrameStats;
