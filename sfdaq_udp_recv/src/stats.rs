//! Per-module receive statistics

use sfdaq_common::consts::N_PACKETS_PER_FRAME;
use sfdaq_common::formats::ModuleFrame;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters of one module receiver, flushed to the log every `stats_time`.
#[derive(Debug)]
pub struct FrameStats {
    detector_name: String,
    module_id: u64,
    stats_time: Duration,
    frames_counter: u64,
    n_missed_packets: u64,
    n_corrupted_frames: u64,
    n_corrupted_pulse_id: u64,
    interval_start: Instant,
}

impl FrameStats {
    /// Empty counters for one module.
    pub fn new(detector_name: &str, module_id: u64, stats_time: Duration) -> Self {
        Self {
            detector_name: detector_name.to_string(),
            module_id,
            stats_time,
            frames_counter: 0,
            n_missed_packets: 0,
            n_corrupted_frames: 0,
            n_corrupted_pulse_id: 0,
            interval_start: Instant::now(),
        }
    }

    /// Account one finished frame; flushes when the interval is over.
    pub fn record_stats(&mut self, meta: &ModuleFrame, bad_pulse_id: bool) {
        if bad_pulse_id {
            self.n_corrupted_pulse_id += 1;
        }

        let expected = N_PACKETS_PER_FRAME as u64;
        if meta.n_recv_packets < expected {
            self.n_missed_packets += expected - meta.n_recv_packets;
            self.n_corrupted_frames += 1;
        }

        self.frames_counter += 1;

        if self.interval_start.elapsed() >= self.stats_time {
            self.print_stats();
            self.reset_counters();
        }
    }

    fn print_stats(&self) {
        let interval_ms = self.interval_start.elapsed().as_millis() as u64;
        info!(
            detector_name = %self.detector_name,
            module_name = %format!("M{}", self.module_id),
            n_missed_packets = self.n_missed_packets,
            n_corrupted_frames = self.n_corrupted_frames,
            repetition_rate = repetition_rate(self.frames_counter, interval_ms),
            n_corrupted_pulse_ids = self.n_corrupted_pulse_id,
            "udp_recv stats"
        );
    }

    fn reset_counters(&mut self) {
        self.frames_counter = 0;
        self.n_missed_packets = 0;
        self.n_corrupted_frames = 0;
        self.n_corrupted_pulse_id = 0;
        self.interval_start = Instant::now();
    }

    /// Frames recorded in the current interval
    pub fn frames(&self) -> u64 {
        self.frames_counter
    }

    /// Packets missing from frames of the current interval
    pub fn n_missed_packets(&self) -> u64 {
        self.n_missed_packets
    }

    /// Incomplete frames of the current interval
    pub fn n_corrupted_frames(&self) -> u64 {
        self.n_corrupted_frames
    }

    /// Frames with an implausible pulse id in the current interval
    pub fn n_corrupted_pulse_id(&self) -> u64 {
        self.n_corrupted_pulse_id
    }
}

/// Frames per second, rounded, over an interval of `interval_ms`.
pub fn repetition_rate(frames: u64, interval_ms: u64) -> u64 {
    if interval_ms == 0 {
        return 0;
    }
    // +250 compensates the truncation of the millisecond interval.
    (frames * 1000 + 250) / interval_ms
}

/// A pulse id is implausible if it is zero or does not advance past the
/// previous frame's.
pub fn is_bad_pulse_id(previous: u64, pulse_id: u64) -> bool {
    pulse_id == 0 || pulse_id <= previous
}
