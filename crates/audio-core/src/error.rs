use std::fmt;

use thiserror::Error;

use crate::capture::SessionState;

/// Result code reported by the audio HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsStatus(pub i32);

impl OsStatus {
    pub const NO_ERR: Self = Self(0);

    pub fn is_ok(self) -> bool {
        self == Self::NO_ERR
    }
}

impl fmt::Display for OsStatus {
    /// HAL errors are four-character codes; print them as such when printable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            let code: String = bytes.iter().map(|&b| b as char).collect();
            write!(f, "'{}' ({})", code, self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No default input device")]
    NoDefaultDevice,

    #[error("Failed to register capture callback on device {device}: {status}")]
    DriverRegistrationFailed { device: u32, status: OsStatus },

    #[error("Failed to start device {device}: {status}")]
    DriverStartFailed { device: u32, status: OsStatus },

    #[error("Failed to stop device {device}: {status}")]
    DriverStopFailed { device: u32, status: OsStatus },

    #[error("Invalid capture state transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Invalid capture configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn capture consumer thread: {0}")]
    ConsumerSpawnFailed(#[source] std::io::Error),

    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),
}

/// Failure of a single property query.
///
/// Never surfaced past the query layer: callers see an empty result instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property unavailable: {0}")]
    Unavailable(OsStatus),

    #[error("malformed property result: {len} bytes is not a multiple of {width}")]
    Malformed { len: usize, width: usize },

    #[error("malformed buffer list: {len} bytes does not hold {buffers} buffers")]
    MalformedBufferList { len: usize, buffers: u32 },
}
