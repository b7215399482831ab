//! Core Audio HAL backend
//!
//! Empty on platforms other than macOS.

#![cfg(target_os = "macos")]

mod device;
mod driver;
mod hal;
mod store;

pub use device::{device_manager, list_devices, HalDeviceManager};
pub use driver::{HalCaptureDriver, HalRegistration};
pub use micscope_audio_core::{AudioError, CaptureSession, Device, SampleBuffer};
pub use store::HalPropertyStore;
