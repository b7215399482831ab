//! Command-line parsing

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use micscope_audio_core::CaptureConfig;

/// Capture length when `--seconds` is not given
pub const DEFAULT_CAPTURE_SECONDS: u64 = 5;

#[derive(Parser, Debug)]
#[command(name = "micscope")]
#[command(about = "List audio input devices and capture from the default one")]
pub struct Options {
    /// JSON file overriding the capture queue and chunk settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List input devices
    Devices {
        /// Print the device list as JSON
        #[arg(long)]
        json: bool,

        /// Only list devices delivering packed float linear PCM
        #[arg(long = "supported")]
        supported_only: bool,
    },
    /// Capture the default input via callback
    Capture(CaptureArgs),
    /// Capture the default input as an async stream
    Stream(CaptureArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CaptureArgs {
    /// Capture length in seconds
    #[arg(long, default_value_t = DEFAULT_CAPTURE_SECONDS)]
    pub seconds: u64,
}

impl CaptureArgs {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl Options {
    /// Load the capture configuration, defaults when no file was given
    pub fn capture_config(&self) -> Result<CaptureConfig> {
        let Some(path) = &self.config else {
            return Ok(CaptureConfig::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: CaptureConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
}
