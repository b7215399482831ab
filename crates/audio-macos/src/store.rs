use cidre::{cf, core_audio as ca};
use micscope_audio_core::{ObjectId, OsStatus, PropertyAddress, PropertyStore};

use crate::hal;

/// Property store over `ca::Obj` property access
#[derive(Debug, Default, Clone, Copy)]
pub struct HalPropertyStore;

impl PropertyStore for HalPropertyStore {
    fn data_size(&self, object: ObjectId, address: &PropertyAddress) -> Result<u32, OsStatus> {
        ca::Obj(object)
            .prop_size(&hal::prop_addr(address))
            .map_err(hal::status)
    }

    fn fill_data(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        buf: &mut [u8],
    ) -> Result<usize, OsStatus> {
        let bytes: Vec<u8> = ca::Obj(object)
            .prop_vec(&hal::prop_addr(address))
            .map_err(hal::status)?;
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn string_data(&self, object: ObjectId, address: &PropertyAddress) -> Result<String, OsStatus> {
        let value = ca::Obj(object)
            .cf_prop::<cf::String>(&hal::prop_addr(address))
            .map_err(hal::status)?;
        Ok(value.to_string())
    }
}
