//! In-memory stand-ins for the HAL used by unit tests

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Mutex;

use crate::capture::SampleSink;
use crate::device::DeviceId;
use crate::error::OsStatus;
use crate::format::{FormatFlags, FormatId, StreamFormat};
use crate::property::{ObjectId, PropertyAddress, Selector, SYSTEM_OBJECT};
use crate::traits::{CaptureDriver, PropertyStore};

/// kAudioHardwareUnknownPropertyError
const UNKNOWN_PROPERTY: OsStatus = OsStatus(i32::from_be_bytes(*b"who?"));

type Key = (ObjectId, PropertyAddress);

#[derive(Default)]
pub struct FakeStore {
    properties: HashMap<Key, Vec<u8>>,
    failing_fill: HashSet<Key>,
    truncated: HashMap<Key, usize>,
    strings: HashMap<Key, String>,
    queried: RefCell<Vec<Key>>,
    fill_calls: Cell<usize>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(mut self, object: ObjectId, address: PropertyAddress, bytes: Vec<u8>) -> Self {
        self.properties.insert((object, address), bytes);
        self
    }

    pub fn with_u32s(self, object: ObjectId, address: PropertyAddress, values: &[u32]) -> Self {
        let bytes = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        self.with_bytes(object, address, bytes)
    }

    pub fn with_string(mut self, object: ObjectId, address: PropertyAddress, value: &str) -> Self {
        self.strings.insert((object, address), value.to_string());
        self
    }

    pub fn failing_fill(mut self, object: ObjectId, address: PropertyAddress) -> Self {
        self.failing_fill.insert((object, address));
        self
    }

    /// Make the fill report only `len` bytes, as if the property shrank after the size query
    pub fn truncating_fill(mut self, object: ObjectId, address: PropertyAddress, len: usize) -> Self {
        self.truncated.insert((object, address), len);
        self
    }

    pub fn with_devices(self, ids: &[DeviceId]) -> Self {
        self.with_u32s(SYSTEM_OBJECT, PropertyAddress::global(Selector::DEVICES), ids)
    }

    pub fn with_default_input(self, id: DeviceId) -> Self {
        self.with_u32s(
            SYSTEM_OBJECT,
            PropertyAddress::global(Selector::DEFAULT_INPUT_DEVICE),
            &[id],
        )
    }

    pub fn with_input_configuration(self, id: DeviceId, channels: u32) -> Self {
        let address = PropertyAddress::input(Selector::STREAM_CONFIGURATION);
        self.with_bytes(id, address, encode_configuration(channels))
    }

    /// Input buffer list with one buffer per entry of `channels`
    pub fn with_input_buffers(self, id: DeviceId, channels: &[u32]) -> Self {
        let address = PropertyAddress::input(Selector::STREAM_CONFIGURATION);
        self.with_bytes(id, address, encode_buffer_list(channels))
    }

    pub fn with_input_format(self, id: DeviceId, format: StreamFormat) -> Self {
        let address = PropertyAddress::input(Selector::STREAM_FORMAT);
        self.with_bytes(id, address, encode_format(&format))
    }

    pub fn with_name(self, id: DeviceId, name: &str) -> Self {
        self.with_string(id, PropertyAddress::global(Selector::DEVICE_NAME), name)
    }

    pub fn with_manufacturer(self, id: DeviceId, manufacturer: &str) -> Self {
        self.with_string(
            id,
            PropertyAddress::global(Selector::DEVICE_MANUFACTURER),
            manufacturer,
        )
    }

    pub fn was_queried(&self, object: ObjectId, address: &PropertyAddress) -> bool {
        self.queried.borrow().contains(&(object, *address))
    }

    pub fn fill_calls(&self) -> usize {
        self.fill_calls.get()
    }
}

impl PropertyStore for FakeStore {
    fn data_size(&self, object: ObjectId, address: &PropertyAddress) -> Result<u32, OsStatus> {
        self.queried.borrow_mut().push((object, *address));
        self.properties
            .get(&(object, *address))
            .map(|bytes| bytes.len() as u32)
            .ok_or(UNKNOWN_PROPERTY)
    }

    fn fill_data(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        buf: &mut [u8],
    ) -> Result<usize, OsStatus> {
        self.fill_calls.set(self.fill_calls.get() + 1);
        let key = (object, *address);
        if self.failing_fill.contains(&key) {
            return Err(OsStatus(-50));
        }
        let bytes = self.properties.get(&key).ok_or(UNKNOWN_PROPERTY)?;
        let limit = self.truncated.get(&key).copied().unwrap_or(usize::MAX);
        let len = bytes.len().min(buf.len()).min(limit);
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn string_data(&self, object: ObjectId, address: &PropertyAddress) -> Result<String, OsStatus> {
        self.queried.borrow_mut().push((object, *address));
        self.strings
            .get(&(object, *address))
            .cloned()
            .ok_or(UNKNOWN_PROPERTY)
    }
}

/// `AudioBufferList` bytes, 512 frames of `f32` per buffer
pub fn encode_buffer_list(channels: &[u32]) -> Vec<u8> {
    let ptr = mem::size_of::<usize>();
    let mut bytes = vec![0u8; ptr];
    bytes[..4].copy_from_slice(&(channels.len() as u32).to_ne_bytes());
    for &count in channels {
        bytes.extend_from_slice(&count.to_ne_bytes());
        bytes.extend_from_slice(&(count * 512 * 4).to_ne_bytes());
        bytes.extend_from_slice(&[0u8; mem::size_of::<usize>()]);
    }
    bytes
}

pub fn encode_configuration(channels: u32) -> Vec<u8> {
    encode_buffer_list(&[channels])
}

pub fn encode_format(format: &StreamFormat) -> Vec<u8> {
    let mut bytes = format.sample_rate.to_ne_bytes().to_vec();
    for field in [
        format.format_id.0,
        format.format_flags.0,
        format.bytes_per_packet,
        format.frames_per_packet,
        format.bytes_per_frame,
        format.channels_per_frame,
        format.bits_per_channel,
        0,
    ] {
        bytes.extend_from_slice(&field.to_ne_bytes());
    }
    bytes
}

pub fn float_format() -> StreamFormat {
    StreamFormat {
        sample_rate: 48_000.0,
        format_id: FormatId::LINEAR_PCM,
        format_flags: FormatFlags::IS_FLOAT | FormatFlags::IS_PACKED,
        bytes_per_packet: 8,
        frames_per_packet: 1,
        bytes_per_frame: 8,
        channels_per_frame: 2,
        bits_per_channel: 32,
    }
}

#[derive(Default)]
struct DriverState {
    registrations: usize,
    unregistrations: usize,
    started: bool,
    sink: Option<SampleSink>,
}

/// Driver that delivers buffers only when a test calls [`FakeDriver::fire`].
///
/// The sink is kept after unregistration so tests can attempt late deliveries.
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<DriverState>,
    fail_register: Option<OsStatus>,
    fail_start: Option<OsStatus>,
}

impl FakeDriver {
    pub fn failing_register(status: OsStatus) -> Self {
        Self {
            fail_register: Some(status),
            ..Self::default()
        }
    }

    pub fn failing_start(status: OsStatus) -> Self {
        Self {
            fail_start: Some(status),
            ..Self::default()
        }
    }

    pub fn fire(&self, samples: &[f32]) {
        self.with_sink(|sink| sink.deliver(samples));
    }

    pub fn with_sink(&self, f: impl FnOnce(&mut SampleSink)) {
        if let Some(sink) = self.state.lock().unwrap().sink.as_mut() {
            f(sink);
        }
    }

    pub fn registrations(&self) -> usize {
        self.state.lock().unwrap().registrations
    }

    pub fn unregistrations(&self) -> usize {
        self.state.lock().unwrap().unregistrations
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().unwrap().started
    }
}

impl CaptureDriver for FakeDriver {
    type Registration = usize;

    fn register(&self, _device: DeviceId, sink: SampleSink) -> Result<usize, OsStatus> {
        let mut state = self.state.lock().unwrap();
        state.registrations += 1;
        if let Some(status) = self.fail_register {
            return Err(status);
        }
        state.sink = Some(sink);
        Ok(state.registrations)
    }

    fn start(&self, _device: DeviceId, _registration: &mut usize) -> Result<(), OsStatus> {
        if let Some(status) = self.fail_start {
            return Err(status);
        }
        self.state.lock().unwrap().started = true;
        Ok(())
    }

    fn stop(&self, _device: DeviceId, _registration: &mut usize) -> Result<(), OsStatus> {
        self.state.lock().unwrap().started = false;
        Ok(())
    }

    fn unregister(&self, _device: DeviceId, _registration: usize) {
        self.state.lock().unwrap().unregistrations += 1;
    }
}
