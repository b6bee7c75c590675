//! # Frame Relay Demo
//!
//! This example demonstrates how Frame Relay works.
//! It relays test-pattern frames into a file for a few seconds, pausing
//! half way through, with the profiler reporting throughput.
//!
//! Run with: `cargo run --example demo [config.json]`

use std::thread;
use std::time::Duration;

use anyhow::Context;
use frame_relay::{Config, FrameRelay};

fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    frame_relay::init_logging();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║           Frame Relay Demo                                 ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║ Test frames flow to a file for 3 seconds, with a 1 second ║");
    println!("║ pause in the middle. The profiler reports every second.    ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {path}"))?,
        None => Config {
            width: 320,
            height: 240,
            fps: 60,
            output_file: Some(std::env::temp_dir().join("frame-relay-demo")),
            profiling_enabled: true,
            ..Config::default()
        },
    };

    println!("📹 Configuration:");
    println!("   Source: {:?} {}x{} @ {} FPS", config.source, config.width, config.height, config.fps);
    println!("   Input ring: {} frames", config.ring_capacity);
    println!("   Output: {:?}", config.output_file);
    println!();

    let mut relay = FrameRelay::with_config(config)?;
    relay.start()?;

    thread::sleep(Duration::from_secs(1));
    println!("⏸️  Pausing (the source keeps running, frames are discarded)");
    relay.pause();

    thread::sleep(Duration::from_secs(1));
    println!("▶️  Resuming");
    relay.resume();

    thread::sleep(Duration::from_secs(1));
    println!("⏹️  Stopping");
    relay.stop();

    let report = relay.wait()?;

    println!();
    println!("📊 Final Statistics:");
    println!("   Status: {}", report.status);
    println!("   Frames captured: {}", report.frames_captured);
    println!("   Frames relayed: {}", report.frames_relayed);
    println!("   Dropped at input: {}", report.input.dropped);
    for sink in &report.sinks {
        println!(
            "   Sink {}: {} frames, {} bytes, {} failures",
            sink.name, sink.frames, sink.bytes, sink.failures
        );
    }
    if let Some(profile) = &report.profile {
        println!("   Profile: {}", profile);
    }
    if let Some(error) = &report.capture_error {
        println!("   Capture error: {}", error);
    }
    println!();

    println!("👋 Demo complete!");
    Ok(())
}
