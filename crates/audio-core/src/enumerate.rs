//! Device enumeration and descriptor building

use crate::device::{Device, DeviceId, StreamConfiguration, UNKNOWN_DEVICE};
use crate::format::StreamFormat;
use crate::property::{PropertyAddress, PropertyQuery, Selector, SYSTEM_OBJECT};
use crate::traits::PropertyStore;

/// Placeholder for device strings the store cannot provide
pub const UNKNOWN_STRING: &str = "???";

/// Resolve the system's default input device, if one is configured
pub fn default_input_device_id<S: PropertyStore + ?Sized>(store: &S) -> Option<DeviceId> {
    let address = PropertyAddress::global(Selector::DEFAULT_INPUT_DEVICE);
    store
        .query_singleton::<DeviceId>(SYSTEM_OBJECT, &address)
        .filter(|&id| id != UNKNOWN_DEVICE)
}

/// List every device the system knows about, input-capable or not
pub fn all_device_ids<S: PropertyStore + ?Sized>(store: &S) -> Vec<DeviceId> {
    // The input scope does not restrict this list, so ask globally.
    let address = PropertyAddress::global(Selector::DEVICES);
    store.query_array(SYSTEM_OBJECT, &address)
}

/// Input buffer layout of a device, `None` if it has no input stream
pub fn input_stream_configuration<S: PropertyStore + ?Sized>(
    store: &S,
    device_id: DeviceId,
) -> Option<StreamConfiguration> {
    let address = PropertyAddress::input(Selector::STREAM_CONFIGURATION);
    let bytes = store.query_bytes(device_id, &address);
    match StreamConfiguration::from_buffer_list(&bytes) {
        Ok(configuration) => configuration,
        Err(err) => {
            tracing::warn!(device_id, %address, "{}", err);
            None
        }
    }
}

/// Build the descriptor of one device, or `None` if it has no input stream
pub fn build_device<S: PropertyStore + ?Sized>(
    store: &S,
    device_id: DeviceId,
    default_id: Option<DeviceId>,
) -> Option<Device> {
    // Probing the format of a device without inputs makes the HAL complain, so check first.
    let Some(configuration) = input_stream_configuration(store, device_id) else {
        tracing::debug!(device_id, "Skipping device without input configuration");
        return None;
    };

    let format_address = PropertyAddress::input(Selector::STREAM_FORMAT);
    let format = store.query_singleton::<StreamFormat>(device_id, &format_address);
    if format.is_none() {
        tracing::debug!(device_id, "Input stream format unavailable");
    }

    let manufacturer = store.query_string(
        device_id,
        &PropertyAddress::global(Selector::DEVICE_MANUFACTURER),
        UNKNOWN_STRING,
    );
    let name = store.query_string(
        device_id,
        &PropertyAddress::global(Selector::DEVICE_NAME),
        UNKNOWN_STRING,
    );

    Some(Device {
        id: device_id,
        is_default_input: Some(device_id) == default_id,
        manufacturer,
        name,
        input_stream_configuration: configuration,
        input_stream_format: format,
    })
}

/// Build descriptors for `device_ids`, dropping devices without inputs
pub fn build_devices<S: PropertyStore + ?Sized>(
    store: &S,
    device_ids: &[DeviceId],
    default_id: Option<DeviceId>,
) -> Vec<Device> {
    device_ids
        .iter()
        .filter_map(|&id| build_device(store, id, default_id))
        .collect()
}
