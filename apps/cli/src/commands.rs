//! Command handlers
//!
//! Generic over the backend so the same handlers run against any
//! [`AudioDeviceManager`].

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use micscope_audio_core::{
    AudioDeviceManager, CaptureDriver, CaptureStats, Device, PropertyStore, SampleBuffer,
};

use crate::options::Command;

pub fn run<S: PropertyStore, D: CaptureDriver>(
    manager: &AudioDeviceManager<S, D>,
    command: &Command,
) -> Result<()> {
    match command {
        Command::Devices {
            json,
            supported_only,
        } => list_devices(manager, *json, *supported_only),
        Command::Capture(args) => capture(manager, args.duration()),
        Command::Stream(args) => stream(manager, args.duration()),
    }
}

// ============================================================================
// Device listing
// ============================================================================

fn list_devices<S: PropertyStore, D: CaptureDriver>(
    manager: &AudioDeviceManager<S, D>,
    json: bool,
    supported_only: bool,
) -> Result<()> {
    let devices = if supported_only {
        manager.supported_input_devices()
    } else {
        manager.enumerate_input_devices()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No input devices found");
    }
    for device in &devices {
        println!("{}", describe_device(device));
    }
    Ok(())
}

fn describe_device(device: &Device) -> String {
    let marker = if device.is_default_input { "*" } else { " " };
    let format = match &device.input_stream_format {
        Some(format) => format!(
            "{} {}Hz {}ch {}bit",
            format.format_id, format.sample_rate, format.channels_per_frame, format.bits_per_channel
        ),
        None => "format unknown".to_string(),
    };
    let support = if device.is_supported_format() {
        "supported"
    } else {
        "unsupported"
    };
    format!(
        "{} [{}] {} - {} ({} channels, {}, {})",
        marker,
        device.id,
        device.name,
        device.manufacturer,
        device.input_stream_configuration.channels,
        format,
        support
    )
}

// ============================================================================
// Capture
// ============================================================================

/// Peak absolute value of a chunk
fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

fn print_chunk(samples: &[f32], channels: usize) {
    if let Some(first) = samples.first() {
        println!(
            "Sample {:+.5}  peak {:.5}  frames {}",
            first,
            peak(samples),
            samples.len() / channels.max(1)
        );
    }
}

fn print_stats(stats: &CaptureStats) {
    println!(
        "Captured {} samples ({} dropped)",
        stats.delivered_samples, stats.dropped_samples
    );
}

/// Capture through the callback API; chunks are printed on the consumer thread
fn capture<S: PropertyStore, D: CaptureDriver>(
    manager: &AudioDeviceManager<S, D>,
    duration: Duration,
) -> Result<()> {
    let mut session = manager
        .open_default_input_capture(|buffer: SampleBuffer<'_>| {
            print_chunk(buffer.samples(), buffer.channels())
        })
        .context("failed to open capture")?;
    session.start().context("failed to start capture")?;

    tracing::info!(device_id = session.device_id(), ?duration, "Capturing");
    thread::sleep(duration);

    session.stop()?;
    print_stats(&session.stats());
    Ok(())
}

/// Capture through the async stream adapter on a local runtime
fn stream<S: PropertyStore, D: CaptureDriver>(
    manager: &AudioDeviceManager<S, D>,
    duration: Duration,
) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async {
        let mut stream = manager
            .open_default_input_stream()
            .context("failed to start capture stream")?;
        let channels = stream.session().channels();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(samples) => print_chunk(&samples, channels),
                    None => {
                        tracing::warn!("Capture stream ended unexpectedly");
                        break;
                    }
                },
                _ = &mut deadline => break,
            }
        }

        stream.stop()?;
        print_stats(&stream.stats());
        Ok::<(), anyhow::Error>(())
    })
}
