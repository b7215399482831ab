use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Samples held between the real-time thread and the consumer.
/// At 48kHz stereo this is roughly 0.7 seconds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 65_536;

/// Maximum samples handed to the consumer per invocation
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Interval at which the consumer thread checks for new samples
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Capture tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub queue_capacity: usize,
    pub chunk_size: usize,
    pub poll_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl CaptureConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), AudioError> {
        if self.queue_capacity == 0 {
            return Err(AudioError::InvalidConfig("queue_capacity must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(AudioError::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AudioError::InvalidConfig("poll_interval_ms must be at least 1".into()));
        }
        Ok(())
    }
}
