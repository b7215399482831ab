use crate::capture::SampleSink;
use crate::device::DeviceId;
use crate::error::OsStatus;
use crate::property::{ObjectId, PropertyAddress};

/// Trait for the raw HAL property store
///
/// Implementations only forward to the OS; sizing, decoding and error
/// suppression live in [`crate::PropertyQuery`].
pub trait PropertyStore {
    /// Byte length the store would return for this property
    fn data_size(&self, object: ObjectId, address: &PropertyAddress) -> Result<u32, OsStatus>;

    /// Fill `buf` with the property's bytes and return how many were written
    fn fill_data(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        buf: &mut [u8],
    ) -> Result<usize, OsStatus>;

    /// Read a string-valued property
    ///
    /// The OS hands strings out as owned native objects, so they are read
    /// through their own accessor rather than through [`Self::fill_data`].
    fn string_data(&self, object: ObjectId, address: &PropertyAddress) -> Result<String, OsStatus>;
}

/// Trait for the driver that invokes capture callbacks on its real-time thread
pub trait CaptureDriver {
    /// Opaque token identifying one callback registration
    type Registration;

    /// Register `sink` to receive the device's input buffers
    fn register(&self, device: DeviceId, sink: SampleSink) -> Result<Self::Registration, OsStatus>;

    /// Begin invoking the registered callback
    fn start(&self, device: DeviceId, registration: &mut Self::Registration) -> Result<(), OsStatus>;

    /// Stop invoking the registered callback
    fn stop(&self, device: DeviceId, registration: &mut Self::Registration) -> Result<(), OsStatus>;

    /// Remove the registration and release its sink
    fn unregister(&self, device: DeviceId, registration: Self::Registration);
}

/// Trait for audio streams that produce interleaved sample chunks
pub trait AudioStream: futures::Stream<Item = Vec<f32>> {
    /// Number of interleaved channels per frame
    fn channels(&self) -> usize;
}
