//! Bounded intake queue between the packet source and the reassembly loop

use crate::error::RecvResult;
use crate::source::PacketSource;
use sfdaq_common::consts::BUFFER_UDP_N_RECV_MSG;
use sfdaq_common::formats::PacketFrame;

/// Fixed array of packet slots filled in one batch and drained front to back.
pub struct PacketBuffer {
    packets: Vec<PacketFrame>,
    n_packets: usize,
    idx: usize,
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::with_capacity(BUFFER_UDP_N_RECV_MSG)
    }
}

impl PacketBuffer {
    /// Queue holding up to `capacity` packets per batch.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            packets: vec![PacketFrame::default(); capacity.max(1)],
            n_packets: 0,
            idx: 0,
        }
    }

    /// Replace the queue content with a fresh batch from `source`.
    ///
    /// Anything not yet popped is discarded, so only call this once the
    /// queue is drained.
    pub fn fill_from<S: PacketSource + ?Sized>(&mut self, source: &mut S) -> RecvResult<usize> {
        self.reset();
        let n_packets = source.receive(&mut self.packets)?;
        self.n_packets = n_packets.min(self.packets.len());
        Ok(self.n_packets)
    }

    /// Oldest unprocessed packet
    pub fn peek_front(&self) -> Option<&PacketFrame> {
        self.packets[..self.n_packets].get(self.idx)
    }

    /// Take the oldest unprocessed packet.
    pub fn pop_front(&mut self) -> Option<&PacketFrame> {
        if self.is_empty() {
            return None;
        }
        self.idx += 1;
        Some(&self.packets[self.idx - 1])
    }

    /// No unprocessed packets left
    pub fn is_empty(&self) -> bool {
        self.idx >= self.n_packets
    }

    /// Unprocessed packets left
    pub fn len(&self) -> usize {
        self.n_packets - self.idx
    }

    /// Maximum batch size
    pub fn capacity(&self) -> usize {
        self.packets.len()
    }

    /// Forget the current batch.
    pub fn reset(&mut self) {
        self.n_packets = 0;
        self.idx = 0;
    }
}
