//! # sf-daq Module UDP Receiver
//!
//! Receives one detector module's packets, reassembles frames and writes
//! them into the detector's RAM buffer. One process runs per module.
//!
//! # Usage
//!
//! ```bash
//! # Module 3 of the detector described in the config
//! sfdaq_udp_recv --config /etc/sfdaq/JF07T32V01.toml --module-id 3
//! ```

#![deny(warnings)]

use clap::Parser;
use sfdaq_buffer::RamBuffer;
use sfdaq_common::config::{ConfigLoader, LogLevel};
use sfdaq_common::consts::DEFAULT_CONFIG_PATH;
use sfdaq_common::logging::init_tracing;
use sfdaq_udp_recv::{FrameStats, FrameUdpReceiver, ReceiverConfig, check_layout, run_module};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{error, info};

/// sf-daq module UDP receiver
#[derive(Parser, Debug)]
#[command(name = "sfdaq_udp_recv")]
#[command(version)]
#[command(about = "Reassemble one module's UDP stream into the RAM buffer")]
struct Args {
    /// Path to the detector configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Module served by this process
    #[arg(short, long)]
    module_id: u64,

    /// Enable verbose logging (overrides the configured level)
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("UDP receiver failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = ReceiverConfig::load(&args.config)?;
    config.validate()?;
    let port = config.udp_port(args.module_id)?;

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.shared.log_level
    };
    init_tracing(level, args.json);

    info!(
        service = %config.shared.service_name,
        module_id = args.module_id,
        port,
        "sfdaq_udp_recv v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let buffer = RamBuffer::attach(&config.detector.detector_name)?;
    check_layout(buffer.layout())?;
    let mut writer = buffer.module_writer(args.module_id)?;

    let mut receiver = FrameUdpReceiver::bind(port, config.receiver.rcvbuf_bytes)?;
    let running = receiver.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let mut stats = FrameStats::new(
        &config.detector.detector_name,
        args.module_id,
        Duration::from_secs(config.receiver.stats_time_s),
    );

    run_module(&mut receiver, &mut writer, &mut stats)?;

    drop(writer);
    buffer.release()?;
    info!("sfdaq_udp_recv shutdown complete");
    Ok(())
}
