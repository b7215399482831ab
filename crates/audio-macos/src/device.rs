use std::sync::Arc;

use micscope_audio_core::{AudioDeviceManager, Device};

use crate::driver::HalCaptureDriver;
use crate::store::HalPropertyStore;

/// Device manager wired to the Core Audio HAL
pub type HalDeviceManager = AudioDeviceManager<HalPropertyStore, HalCaptureDriver>;

/// Create a device manager over the Core Audio HAL
pub fn device_manager() -> HalDeviceManager {
    AudioDeviceManager::new(HalPropertyStore, Arc::new(HalCaptureDriver))
}

/// List all input-capable audio devices on macOS
pub fn list_devices() -> Vec<Device> {
    device_manager().enumerate_input_devices()
}
