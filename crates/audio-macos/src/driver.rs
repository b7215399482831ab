//! IO proc registration on a HAL device
//!
//! The HAL calls [`io_proc`] on its real-time thread with the registration's
//! sink as client data. The proc only forwards the first input buffer.

use std::ffi::c_void;

use cidre::{cat, core_audio as ca, os};
use micscope_audio_core::{CaptureDriver, DeviceId, OsStatus, SampleSink};

use crate::hal;

type StartedDevice = ca::hardware::StartedDevice<Box<ca::Device>>;

/// Capture driver over `ca::Device` IO procs
#[derive(Debug, Default, Clone, Copy)]
pub struct HalCaptureDriver;

/// An IO proc id, the sink it delivers into, and the running device if started
pub struct HalRegistration {
    proc_id: ca::DeviceIoProcId,
    started: Option<StartedDevice>,
    sink: Box<SampleSink>,
}

/// First buffer of an input list, `None` when the HAL sent no buffers
fn first_buffer(input: &cat::AudioBufList<1>) -> Option<&cat::AudioBuf> {
    if input.number_buffers == 0 {
        return None;
    }
    input.buffers.first()
}

extern "C" fn io_proc(
    _device: ca::Device,
    _now: &cat::AudioTimeStamp,
    input_data: &cat::AudioBufList<1>,
    _input_time: &cat::AudioTimeStamp,
    _output_data: &mut cat::AudioBufList<1>,
    _output_time: &cat::AudioTimeStamp,
    sink: Option<&mut SampleSink>,
) -> os::Status {
    let Some(sink) = sink else {
        return os::Status::NO_ERR;
    };

    // One input stream, samples interleaved across its channels.
    if let Some(buffer) = first_buffer(input_data) {
        unsafe { sink.deliver_raw(buffer.data as *const c_void, buffer.data_bytes_size as usize) };
    }

    os::Status::NO_ERR
}

impl CaptureDriver for HalCaptureDriver {
    type Registration = HalRegistration;

    fn register(&self, device: DeviceId, sink: SampleSink) -> Result<HalRegistration, OsStatus> {
        let mut sink = Box::new(sink);
        let proc_id = hal::device(device)
            .create_io_proc_id(io_proc, Some(&mut *sink))
            .map_err(hal::status)?;

        Ok(HalRegistration {
            proc_id,
            started: None,
            sink,
        })
    }

    fn start(&self, device: DeviceId, registration: &mut HalRegistration) -> Result<(), OsStatus> {
        let started = ca::device_start(Box::new(hal::device(device)), Some(registration.proc_id))
            .map_err(hal::status)?;
        registration.started = Some(started);
        Ok(())
    }

    fn stop(&self, _device: DeviceId, registration: &mut HalRegistration) -> Result<(), OsStatus> {
        // Dropping the guard stops the device.
        registration.started = None;
        Ok(())
    }

    fn unregister(&self, device: DeviceId, mut registration: HalRegistration) {
        registration.started = None;
        if let Err(err) = hal::device(device).destroy_io_proc_id(registration.proc_id) {
            tracing::warn!(device, status = %hal::status(err), "Failed to destroy IO proc");
        }
        // The HAL no longer references the sink once the proc is destroyed.
        drop(registration.sink);
    }
}
