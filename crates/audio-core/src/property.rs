//! Typed queries over the HAL's addressable property space
//!
//! Every property is identified by an object id plus a [`PropertyAddress`].
//! Results are variable length and may legitimately be missing on a given
//! object, so the query helpers here probe the size, allocate exactly that
//! many bytes, fill them, and decode the bytes into typed elements. Any
//! failure along the way collapses into an empty result.

use std::fmt;
use std::mem;

use crate::error::PropertyError;
use crate::traits::PropertyStore;

/// Handle of an object in the HAL (system object, device, stream).
pub type ObjectId = u32;

/// The HAL's root object, owner of the device list and default-device properties.
pub const SYSTEM_OBJECT: ObjectId = 1;

const fn four_cc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// Property selector code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub u32);

impl Selector {
    pub const DEFAULT_INPUT_DEVICE: Self = Self(four_cc(b"dIn "));
    pub const DEVICES: Self = Self(four_cc(b"dev#"));
    pub const STREAM_CONFIGURATION: Self = Self(four_cc(b"slay"));
    pub const STREAM_FORMAT: Self = Self(four_cc(b"sfmt"));
    pub const DEVICE_MANUFACTURER: Self = Self(four_cc(b"lmak"));
    pub const DEVICE_NAME: Self = Self(four_cc(b"lnam"));
}

/// Direction qualifier of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Input,
    Output,
}

impl Scope {
    pub fn code(self) -> u32 {
        match self {
            Self::Global => four_cc(b"glob"),
            Self::Input => four_cc(b"inpt"),
            Self::Output => four_cc(b"outp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element(pub u32);

impl Element {
    pub const MAIN: Self = Self(0);
}

/// Identifies one property on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyAddress {
    pub selector: Selector,
    pub scope: Scope,
    pub element: Element,
}

impl PropertyAddress {
    pub const fn new(selector: Selector, scope: Scope) -> Self {
        Self {
            selector,
            scope,
            element: Element::MAIN,
        }
    }

    pub const fn global(selector: Selector) -> Self {
        Self::new(selector, Scope::Global)
    }

    pub const fn input(selector: Selector) -> Self {
        Self::new(selector, Scope::Input)
    }
}

impl fmt::Display for PropertyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sel = self.selector.0.to_be_bytes();
        let scope = self.scope.code().to_be_bytes();
        write!(
            f,
            "{}/{}/{}",
            String::from_utf8_lossy(&sel),
            String::from_utf8_lossy(&scope),
            self.element.0
        )
    }
}

/// A fixed-width record the property store can return.
///
/// `WIDTH` must match the HAL's in-memory layout of the record exactly.
pub trait PropertyElement: Sized {
    const WIDTH: usize;

    /// Decode one element from exactly `WIDTH` native-endian bytes.
    fn decode(bytes: &[u8]) -> Self;
}

impl PropertyElement for u32 {
    const WIDTH: usize = mem::size_of::<u32>();

    fn decode(bytes: &[u8]) -> Self {
        read_u32(bytes, 0)
    }
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

pub(crate) fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_ne_bytes(raw)
}

/// Query helpers available on every [`PropertyStore`].
pub trait PropertyQuery: PropertyStore {
    /// Byte length of a property, 0 when the object does not expose it.
    fn query_size(&self, object: ObjectId, address: &PropertyAddress) -> u32 {
        match self.data_size(object, address) {
            Ok(size) => size,
            Err(status) => {
                tracing::debug!(object, %address, %status, "Property size query failed");
                0
            }
        }
    }

    /// Raw bytes of a property, empty when unavailable.
    ///
    /// For variable-length records whose layout the caller decodes itself.
    fn query_bytes(&self, object: ObjectId, address: &PropertyAddress) -> Vec<u8> {
        match try_query_bytes(self, object, address) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(object, %address, "{}", err);
                Vec::new()
            }
        }
    }

    /// Query a property as a sequence of `T`, empty when unavailable or malformed.
    fn query_array<T: PropertyElement>(&self, object: ObjectId, address: &PropertyAddress) -> Vec<T> {
        match try_query_array(self, object, address) {
            Ok(values) => values,
            Err(PropertyError::Unavailable(status)) => {
                tracing::debug!(object, %address, %status, "Property unavailable");
                Vec::new()
            }
            Err(err @ (PropertyError::Malformed { .. } | PropertyError::MalformedBufferList { .. })) => {
                tracing::warn!(object, %address, "{}", err);
                Vec::new()
            }
        }
    }

    /// Query a property that holds at most one `T`.
    ///
    /// # Panics
    ///
    /// Panics if the store returns more than one element; that means the
    /// selector and `T` do not belong together.
    fn query_singleton<T: PropertyElement>(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
    ) -> Option<T> {
        let values = self.query_array::<T>(object, address);
        assert!(
            values.len() < 2,
            "singleton property {} on object {} returned {} elements",
            address,
            object,
            values.len()
        );
        values.into_iter().next()
    }

    /// Query a string property, returning `fallback` when it is unavailable.
    fn query_string(&self, object: ObjectId, address: &PropertyAddress, fallback: &str) -> String {
        match self.string_data(object, address) {
            Ok(value) => value,
            Err(status) => {
                tracing::debug!(object, %address, %status, "String property unavailable");
                fallback.to_string()
            }
        }
    }
}

impl<S: PropertyStore + ?Sized> PropertyQuery for S {}

fn try_query_bytes<S>(
    store: &S,
    object: ObjectId,
    address: &PropertyAddress,
) -> Result<Vec<u8>, PropertyError>
where
    S: PropertyStore + ?Sized,
{
    let len = store
        .data_size(object, address)
        .map_err(PropertyError::Unavailable)? as usize;
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; len];
    let written = store
        .fill_data(object, address, &mut buf)
        .map_err(PropertyError::Unavailable)?;
    // The store may report fewer bytes than probed if the hardware changed in between.
    buf.truncate(written.min(len));
    Ok(buf)
}

fn try_query_array<S, T>(
    store: &S,
    object: ObjectId,
    address: &PropertyAddress,
) -> Result<Vec<T>, PropertyError>
where
    S: PropertyStore + ?Sized,
    T: PropertyElement,
{
    let bytes = try_query_bytes(store, object, address)?;
    check_width::<T>(bytes.len())?;
    Ok(bytes.chunks_exact(T::WIDTH).map(T::decode).collect())
}

fn check_width<T: PropertyElement>(len: usize) -> Result<(), PropertyError> {
    if len % T::WIDTH != 0 {
        return Err(PropertyError::Malformed {
            len,
            width: T::WIDTH,
        });
    }
    Ok(())
}
