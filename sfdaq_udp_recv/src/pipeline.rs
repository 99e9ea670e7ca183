//! Receive loop of one module: packets in, ring buffer frames out

use crate::error::{RecvError, RecvResult};
use crate::receiver::FrameUdpReceiver;
use crate::source::PacketSource;
use crate::stats::{FrameStats, is_bad_pulse_id};
use sfdaq_buffer::{BufferLayout, ModuleWriter};
use sfdaq_common::consts::{MODULE_N_BYTES, N_PACKETS_PER_FRAME};
use sfdaq_common::formats::ModuleFrame;
use tracing::{debug, info};

/// Check that `layout` stores the frames this receiver assembles.
///
/// Without this a mismatched buffer is only noticed by the first
/// `write_frame`, after the socket is already receiving.
pub fn check_layout(layout: &BufferLayout) -> RecvResult<()> {
    if layout.module_n_bytes != MODULE_N_BYTES || layout.packets_per_frame != N_PACKETS_PER_FRAME {
        return Err(RecvError::LayoutMismatch {
            module_n_bytes: layout.module_n_bytes,
            packets_per_frame: layout.packets_per_frame,
            expected_n_bytes: MODULE_N_BYTES,
            expected_packets: N_PACKETS_PER_FRAME,
        });
    }
    Ok(())
}

/// Move frames from `receiver` into the ring buffer until it is stopped.
///
/// Every finished frame is written, complete or not; readers judge
/// completeness from the descriptor. Returns the number of frames written.
pub fn run_module<S: PacketSource>(
    receiver: &mut FrameUdpReceiver<S>,
    writer: &mut ModuleWriter<'_>,
    stats: &mut FrameStats,
) -> RecvResult<u64> {
    let module_id = writer.module_id();
    let mut meta = ModuleFrame::for_module(module_id);
    let mut frame_buffer = vec![0u8; MODULE_N_BYTES];
    let mut last_pulse_id = 0;
    let mut n_frames = 0;

    info!(module_id, "Receive loop started");

    while let Some(pulse_id) = receiver.get_frame_from_udp(&mut meta, &mut frame_buffer)? {
        let bad_pulse_id = is_bad_pulse_id(last_pulse_id, pulse_id);
        if bad_pulse_id {
            debug!(module_id, pulse_id, last_pulse_id, "Pulse id did not advance");
        }
        last_pulse_id = pulse_id;

        writer.write_frame(&meta, &frame_buffer)?;
        stats.record_stats(&meta, bad_pulse_id);
        n_frames += 1;
    }

    info!(
        module_id,
        n_frames,
        n_rejected_packets = receiver.n_rejected_packets(),
        n_late_packets = receiver.n_late_packets(),
        "Receive loop stopped"
    );
    Ok(n_frames)
}
