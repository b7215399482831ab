use std::mem;

use serde::{Deserialize, Serialize};

use crate::error::PropertyError;
use crate::format::{self, StreamFormat};
use crate::property::read_u32;

/// HAL object id of an audio device.
///
/// Only stable for the life of the current hardware configuration.
pub type DeviceId = u32;

/// Id the HAL reports when no device is set.
pub const UNKNOWN_DEVICE: DeviceId = 0;

/// Channel and buffer layout of a device's input stream.
///
/// Totals across every buffer of the `AudioBufferList` the HAL reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfiguration {
    pub buffer_count: u32,
    pub channels: u32,
    pub data_byte_size: u32,
    /// Channels interleaved in the first buffer, the one capture delivers
    pub first_buffer_channels: u32,
}

const PTR_WIDTH: usize = mem::size_of::<usize>();

/// `mNumberBuffers`, padded to the alignment of the buffers that follow
const BUFFER_LIST_HEADER: usize = PTR_WIDTH;

/// One `AudioBuffer`: channels, byte size, data pointer
const AUDIO_BUFFER_WIDTH: usize = 8 + PTR_WIDTH;

impl StreamConfiguration {
    /// Byte length of a buffer list holding `buffers` buffers
    pub const fn buffer_list_len(buffers: usize) -> usize {
        BUFFER_LIST_HEADER + buffers * AUDIO_BUFFER_WIDTH
    }

    /// Decode a raw `AudioBufferList`.
    ///
    /// `Ok(None)` when the list is empty or holds no buffers: the stream
    /// direction is absent on the device.
    pub fn from_buffer_list(bytes: &[u8]) -> Result<Option<Self>, PropertyError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() < 4 {
            return Err(PropertyError::Malformed {
                len: bytes.len(),
                width: BUFFER_LIST_HEADER,
            });
        }

        let buffer_count = read_u32(bytes, 0);
        if buffer_count == 0 {
            return Ok(None);
        }
        let expected = (buffer_count as usize)
            .checked_mul(AUDIO_BUFFER_WIDTH)
            .and_then(|len| len.checked_add(BUFFER_LIST_HEADER));
        if expected != Some(bytes.len()) {
            return Err(PropertyError::MalformedBufferList {
                len: bytes.len(),
                buffers: buffer_count,
            });
        }

        let buffers = &bytes[BUFFER_LIST_HEADER..];
        let first_buffer_channels = read_u32(buffers, 0);
        let (channels, data_byte_size) = buffers
            .chunks_exact(AUDIO_BUFFER_WIDTH)
            .fold((0u32, 0u32), |(channels, size), buffer| {
                (
                    channels.saturating_add(read_u32(buffer, 0)),
                    size.saturating_add(read_u32(buffer, 4)),
                )
            });

        Ok(Some(Self {
            buffer_count,
            channels,
            data_byte_size,
            first_buffer_channels,
        }))
    }
}

/// An input-capable audio device as seen during one enumeration pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub is_default_input: bool,
    pub manufacturer: String,
    pub name: String,
    pub input_stream_configuration: StreamConfiguration,
    pub input_stream_format: Option<StreamFormat>,
}

impl Device {
    /// Whether the input stream delivers packed float linear PCM
    pub fn is_supported_format(&self) -> bool {
        format::is_supported(self.input_stream_format.as_ref())
    }
}
