//! Device discovery and real-time input capture over an audio HAL
//!
//! The HAL is reached through two seams, [`PropertyStore`] for metadata and
//! [`CaptureDriver`] for callback registration. Platform crates implement
//! them; [`AudioDeviceManager`] ties them together.

mod capture;
mod config;
mod device;
mod enumerate;
mod error;
mod format;
mod manager;
mod property;
mod stream;
mod traits;

#[cfg(test)]
mod fake;

pub use capture::{CaptureSession, CaptureStats, SampleBuffer, SampleSink, SessionState};
pub use config::CaptureConfig;
pub use device::{Device, DeviceId, StreamConfiguration, UNKNOWN_DEVICE};
pub use enumerate::{
    all_device_ids, build_device, build_devices, default_input_device_id,
    input_stream_configuration, UNKNOWN_STRING,
};
pub use error::{AudioError, OsStatus, PropertyError};
pub use format::{is_supported, FormatFlags, FormatId, StreamFormat};
pub use manager::AudioDeviceManager;
pub use property::{
    Element, ObjectId, PropertyAddress, PropertyElement, PropertyQuery, Scope, Selector,
    SYSTEM_OBJECT,
};
pub use stream::CaptureStream;
pub use traits::{AudioStream, CaptureDriver, PropertyStore};
