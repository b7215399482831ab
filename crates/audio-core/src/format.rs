//! Stream format descriptors and the support check applied to them

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::property::{read_f64, read_u32, PropertyElement};

/// Format family code of a stream (`mFormatID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatId(pub u32);

impl FormatId {
    pub const LINEAR_PCM: Self = Self(u32::from_be_bytes(*b"lpcm"));
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0.to_be_bytes()))
    }
}

/// Format flag bit-set (`mFormatFlags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatFlags(pub u32);

impl FormatFlags {
    pub const IS_FLOAT: Self = Self(1 << 0);
    pub const IS_BIG_ENDIAN: Self = Self(1 << 1);
    pub const IS_SIGNED_INTEGER: Self = Self(1 << 2);
    pub const IS_PACKED: Self = Self(1 << 3);
    pub const IS_ALIGNED_HIGH: Self = Self(1 << 4);
    pub const IS_NON_INTERLEAVED: Self = Self(1 << 5);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FormatFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Basic description of one stream's sample layout.
///
/// Mirrors `AudioStreamBasicDescription`; only `format_id` and
/// `format_flags` are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub format_id: FormatId,
    pub format_flags: FormatFlags,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl PropertyElement for StreamFormat {
    // f64 followed by eight u32 fields, the last one reserved.
    const WIDTH: usize = 40;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            sample_rate: read_f64(bytes, 0),
            format_id: FormatId(read_u32(bytes, 8)),
            format_flags: FormatFlags(read_u32(bytes, 12)),
            bytes_per_packet: read_u32(bytes, 16),
            frames_per_packet: read_u32(bytes, 20),
            bytes_per_frame: read_u32(bytes, 24),
            channels_per_frame: read_u32(bytes, 28),
            bits_per_channel: read_u32(bytes, 32),
        }
    }
}

/// Whether a stream delivers packed linear-PCM float samples.
pub fn is_supported(format: Option<&StreamFormat>) -> bool {
    let required = FormatFlags::IS_FLOAT | FormatFlags::IS_PACKED;
    match format {
        Some(format) => {
            format.format_id == FormatId::LINEAR_PCM && format.format_flags.contains(required)
        }
        None => false,
    }
}
