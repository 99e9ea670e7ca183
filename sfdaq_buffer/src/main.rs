//! # sf-daq RAM Buffer Owner
//!
//! Creates the detector's shared ring buffer, keeps it alive while module
//! receivers and writers attach to it, and removes it on shutdown.
//!
//! # Usage
//!
//! ```bash
//! # Create the buffer described by the detector config
//! sfdaq_buffer --config /etc/sfdaq/JF07T32V01.toml
//!
//! # Remove a buffer left behind by a crashed owner first
//! sfdaq_buffer --config /etc/sfdaq/JF07T32V01.toml --release-stale
//! ```

#![deny(warnings)]

use clap::Parser;
use serde::Deserialize;
use sfdaq_buffer::{BufferLayout, RamBuffer};
use sfdaq_common::config::{ConfigLoader, DetectorConfig, LogLevel, SharedConfig};
use sfdaq_common::consts::DEFAULT_CONFIG_PATH;
use sfdaq_common::logging::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// sf-daq RAM buffer owner
#[derive(Parser, Debug)]
#[command(name = "sfdaq_buffer")]
#[command(version)]
#[command(about = "Create and own the shared RAM ring buffer of a detector")]
struct Args {
    /// Path to the detector configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Remove a left-over buffer of a dead owner before creating
    #[arg(long)]
    release_stale: bool,

    /// Enable verbose logging (overrides the configured level)
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Deserialize)]
struct BufferConfig {
    shared: SharedConfig,
    detector: DetectorConfig,
}

fn main() {
    if let Err(e) = run() {
        error!("Ring buffer owner failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = BufferConfig::load(&args.config)?;
    config.shared.validate()?;
    config.detector.validate()?;

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.shared.log_level
    };
    init_tracing(level, args.json);

    info!(
        service = %config.shared.service_name,
        "sfdaq_buffer v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let name = config.detector.detector_name.as_str();
    if args.release_stale && RamBuffer::release_stale(name)? {
        info!(name = %name, "Removed stale ring buffer");
    }

    let layout = BufferLayout::jungfrau(config.detector.n_modules, config.detector.n_slots)?;
    let buffer = RamBuffer::create(name, layout)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    info!(
        name = %name,
        image_bytes = layout.image_bytes(),
        "Ring buffer ready"
    );
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    buffer.release()?;
    info!("sfdaq_buffer shutdown complete");
    Ok(())
}
