//! micscope command-line tool
//!
//! Lists the audio input devices known to the system and captures from the
//! default one, printing the first sample and peak of every chunk.

// The handlers are only wired to a backend on macOS.
#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod commands;
mod options;

use anyhow::Result;
use clap::Parser;

use options::Options;

fn init_logging() {
    // Enhanced logging for debug builds
    #[cfg(debug_assertions)]
    {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("Debug mode logging enabled");
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(target_os = "macos")]
fn run(options: &Options) -> Result<()> {
    let config = options.capture_config()?;
    let manager = micscope_audio_macos::device_manager().with_config(config);
    commands::run(&manager, &options.command)
}

#[cfg(not(target_os = "macos"))]
fn run(_options: &Options) -> Result<()> {
    use micscope_audio_core::AudioError;

    Err(AudioError::PlatformNotSupported(format!(
        "no audio backend for {}",
        std::env::consts::OS
    ))
    .into())
}

fn main() -> Result<()> {
    let options = Options::parse();
    init_logging();
    run(&options)
}
