//! Frame reassembly from a module's packet stream

use crate::error::{RecvError, RecvResult};
use crate::packet_buffer::PacketBuffer;
use crate::source::{PacketSource, UdpPacketSource};
use sfdaq_common::consts::{DATA_BYTES_PER_PACKET, MODULE_N_BYTES, N_PACKETS_PER_FRAME};
use sfdaq_common::formats::ModuleFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

const RECEIVED_WORDS: usize = N_PACKETS_PER_FRAME.div_ceil(64);

/// Turns one module's packet stream into module frames.
///
/// Packets are consumed in arrival order. A frame is finished when its last
/// packet (`packet_number == N_PACKETS_PER_FRAME - 1`) arrives, or, if that
/// packet was lost, when the first packet of a different frame shows up. In
/// the second case the foreign packet stays queued and starts the next call.
///
/// Packets of the most recently finished frame that arrive after it was
/// emitted are dropped, so a duplicated or delayed packet never reopens a
/// frame that was already handed out.
///
/// Losing the complete last frame of a run is not detected: nothing arrives
/// afterwards to close it.
pub struct FrameUdpReceiver<S: PacketSource> {
    source: S,
    buffer: PacketBuffer,
    /// Frame number of the oldest unprocessed packet
    frame_index: u64,
    /// Frame number of the last emitted frame
    closed_frame: Option<u64>,
    received: [u64; RECEIVED_WORDS],
    n_rejected_packets: u64,
    n_late_packets: u64,
    running: Arc<AtomicBool>,
}

impl FrameUdpReceiver<UdpPacketSource> {
    /// Receiver on a freshly bound UDP port.
    pub fn bind(port: u16, rcvbuf_bytes: usize) -> RecvResult<Self> {
        Ok(Self::new(UdpPacketSource::bind(port, rcvbuf_bytes)?))
    }
}

impl<S: PacketSource> FrameUdpReceiver<S> {
    /// Receiver reading from `source`, with the default intake queue.
    pub fn new(source: S) -> Self {
        Self::with_buffer(source, PacketBuffer::default())
    }

    /// Receiver reading from `source` through `buffer`.
    pub fn with_buffer(source: S, buffer: PacketBuffer) -> Self {
        Self {
            source,
            buffer,
            frame_index: 0,
            closed_frame: None,
            received: [0; RECEIVED_WORDS],
            n_rejected_packets: 0,
            n_late_packets: 0,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag that stops [`get_frame_from_udp`](Self::get_frame_from_udp) when cleared.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Packets dropped because their packet number was out of range
    pub fn n_rejected_packets(&self) -> u64 {
        self.n_rejected_packets
    }

    /// Packets dropped because their frame had already been emitted
    pub fn n_late_packets(&self) -> u64 {
        self.n_late_packets
    }

    /// Underlying packet source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Block until the next frame is finished and return its pulse id.
    ///
    /// `meta` (except `module_id`) and `frame_buffer` are zeroed first, so
    /// nothing of a previous frame survives into this one. Missing packets
    /// leave zeros in their part of the payload and `meta.n_recv_packets`
    /// below `N_PACKETS_PER_FRAME`.
    ///
    /// Returns `Ok(None)` once the running flag is cleared; a frame in
    /// progress at that point is discarded.
    pub fn get_frame_from_udp(
        &mut self,
        meta: &mut ModuleFrame,
        frame_buffer: &mut [u8],
    ) -> RecvResult<Option<u64>> {
        if frame_buffer.len() != MODULE_N_BYTES {
            return Err(RecvError::FrameBufferSize {
                expected: MODULE_N_BYTES,
                got: frame_buffer.len(),
            });
        }

        meta.reset();
        frame_buffer.fill(0);
        self.received = [0; RECEIVED_WORDS];

        loop {
            // Leftover packets of the previous call come first.
            if self.process_packets(meta, frame_buffer) {
                return Ok(Some(meta.pulse_id));
            }
            if !self.running.load(Ordering::Relaxed) {
                return Ok(None);
            }
            self.buffer.fill_from(&mut self.source)?;
        }
    }

    /// Drain the intake queue into the current frame.
    ///
    /// Returns true when a frame boundary was reached.
    fn process_packets(&mut self, meta: &mut ModuleFrame, frame_buffer: &mut [u8]) -> bool {
        while let Some(packet) = self.buffer.peek_front() {
            let frame_number = packet.frame_number;

            if self.closed_frame == Some(frame_number) {
                self.buffer.pop_front();
                self.n_late_packets += 1;
                debug!(
                    frame_number,
                    module_id = meta.module_id,
                    "Dropped packet of an already emitted frame"
                );
                continue;
            }

            if frame_number != self.frame_index {
                let previous = std::mem::replace(&mut self.frame_index, frame_number);
                // The last packet of the frame in progress got lost.
                if meta.n_recv_packets > 0 {
                    self.closed_frame = Some(previous);
                    return true;
                }
            }

            let Some(packet) = self.buffer.pop_front() else {
                break;
            };

            let packet_number = packet.packet_number as usize;
            if packet_number >= N_PACKETS_PER_FRAME {
                self.n_rejected_packets += 1;
                warn!(
                    frame_number,
                    packet_number,
                    module_id = meta.module_id,
                    "Rejected packet with out-of-range packet number"
                );
                continue;
            }

            // Taken from every packet, so losing packet 0 costs nothing.
            meta.pulse_id = packet.timestamp;
            meta.frame_index = frame_number;
            meta.daq_rec = u64::from(packet.debug);

            let offset = packet_number * DATA_BYTES_PER_PACKET;
            frame_buffer[offset..offset + DATA_BYTES_PER_PACKET].copy_from_slice(&packet.data);

            let (word, bit) = (packet_number / 64, packet_number % 64);
            if self.received[word] & (1 << bit) == 0 {
                self.received[word] |= 1 << bit;
                meta.n_recv_packets += 1;
            }

            if packet_number == N_PACKETS_PER_FRAME - 1 {
                self.closed_frame = Some(frame_number);
                return true;
            }
        }

        self.buffer.reset();
        false
    }
}
