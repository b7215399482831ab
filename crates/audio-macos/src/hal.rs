//! Conversions between the core crate's HAL types and cidre's

use cidre::{core_audio as ca, os};
use micscope_audio_core::{DeviceId, OsStatus, PropertyAddress};

pub(crate) fn prop_addr(address: &PropertyAddress) -> ca::PropAddr {
    ca::PropAddr {
        selector: ca::PropSelector(address.selector.0),
        scope: ca::PropScope(address.scope.code()),
        element: ca::PropElement(address.element.0),
    }
}

pub(crate) fn device(id: DeviceId) -> ca::Device {
    ca::Device(ca::Obj(id))
}

pub(crate) fn status(err: os::Error) -> OsStatus {
    OsStatus(os::Status::from(err).0)
}
