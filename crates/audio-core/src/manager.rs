use std::sync::Arc;

use crate::capture::{CaptureSession, SampleBuffer};
use crate::config::CaptureConfig;
use crate::device::{Device, DeviceId};
use crate::enumerate;
use crate::error::AudioError;
use crate::stream::{self, CaptureStream};
use crate::traits::{CaptureDriver, PropertyStore};

/// Entry point for device listing and capture
///
/// Owns the property store and capture driver; nothing is cached between
/// calls, so every listing reflects the hardware at the time of the call.
pub struct AudioDeviceManager<S, D> {
    store: S,
    driver: Arc<D>,
    config: CaptureConfig,
}

impl<S: PropertyStore, D: CaptureDriver> AudioDeviceManager<S, D> {
    pub fn new(store: S, driver: Arc<D>) -> Self {
        Self {
            store,
            driver,
            config: CaptureConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn default_input_device_id(&self) -> Option<DeviceId> {
        enumerate::default_input_device_id(&self.store)
    }

    pub fn all_device_ids(&self) -> Vec<DeviceId> {
        enumerate::all_device_ids(&self.store)
    }

    /// List every device with an input stream
    pub fn enumerate_input_devices(&self) -> Vec<Device> {
        let default_id = self.default_input_device_id();
        let ids = self.all_device_ids();
        let devices = enumerate::build_devices(&self.store, &ids, default_id);
        tracing::debug!(
            total = ids.len(),
            inputs = devices.len(),
            ?default_id,
            "Enumerated audio devices"
        );
        devices
    }

    /// List input devices whose stream format is packed float linear PCM
    pub fn supported_input_devices(&self) -> Vec<Device> {
        self.enumerate_input_devices()
            .into_iter()
            .filter(Device::is_supported_format)
            .collect()
    }

    /// Register a capture callback on `device_id`
    pub fn open_input_capture<F>(
        &self,
        device_id: DeviceId,
        on_samples: F,
    ) -> Result<CaptureSession<D>, AudioError>
    where
        F: FnMut(SampleBuffer<'_>) + Send + 'static,
    {
        let channels = self.input_channels(device_id);
        CaptureSession::open(
            self.driver.clone(),
            device_id,
            channels,
            &self.config,
            on_samples,
        )
    }

    /// Register a capture callback on the default input device
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::NoDefaultDevice`] without touching the driver if
    /// no default input device is configured.
    pub fn open_default_input_capture<F>(&self, on_samples: F) -> Result<CaptureSession<D>, AudioError>
    where
        F: FnMut(SampleBuffer<'_>) + Send + 'static,
    {
        let device_id = self
            .default_input_device_id()
            .ok_or(AudioError::NoDefaultDevice)?;
        self.open_input_capture(device_id, on_samples)
    }

    /// Start capturing the default input device as an async stream of chunks
    pub fn open_default_input_stream(&self) -> Result<CaptureStream<D>, AudioError> {
        let (callback, receiver) = stream::channel_callback();
        let session = self.open_default_input_capture(callback)?;
        CaptureStream::start(session, receiver)
    }

    /// Channels interleaved in the delivered input buffer, 1 if unknown
    fn input_channels(&self, device_id: DeviceId) -> usize {
        enumerate::input_stream_configuration(&self.store, device_id)
            .map(|config| config.first_buffer_channels as usize)
            .filter(|&channels| channels > 0)
            .unwrap_or(1)
    }
}
