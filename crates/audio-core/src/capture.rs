//! Real-time capture session lifecycle
//!
//! The driver invokes the capture callback on its own real-time thread. That
//! side only ever touches a [`SampleSink`]: it checks an atomic flag and
//! copies the buffer into a lock-free ring buffer, nothing else. A consumer
//! thread drains the ring buffer and hands [`SampleBuffer`] views to the
//! caller's callback.
//!
//! # Stopping
//!
//! The sink counts the callbacks currently inside it. [`CaptureSession::stop`]
//! clears the active flag, stops the driver, waits for that count to reach
//! zero, unregisters, and joins the consumer. Once it returns, no callback is
//! running and the caller's callback will not be invoked again.

use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use serde::Serialize;

use crate::config::CaptureConfig;
use crate::device::DeviceId;
use crate::error::AudioError;
use crate::traits::CaptureDriver;

/// Name of the consumer thread
const CONSUMER_THREAD_NAME: &str = "micscope-capture";

/// Lifecycle of a [`CaptureSession`]; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Registered,
    Started,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Registered => "registered",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interleaved samples handed to the consumer callback.
///
/// Only valid for the duration of the call; copy out anything needed later.
#[derive(Debug, Clone, Copy)]
pub struct SampleBuffer<'a> {
    samples: &'a [f32],
    channels: usize,
}

impl<'a> SampleBuffer<'a> {
    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

impl Deref for SampleBuffer<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.samples
    }
}

/// Counters shared between the real-time side, the consumer and the session
struct Shared {
    active: AtomicBool,
    in_flight: AtomicUsize,
    finished: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn wait_idle(&self) {
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            std::hint::spin_loop();
            thread::yield_now();
        }
    }
}

/// Real-time end of a capture session, owned by the driver's callback
pub struct SampleSink {
    producer: HeapProd<f32>,
    shared: Arc<Shared>,
}

impl SampleSink {
    /// Enqueue one callback's worth of interleaved samples.
    ///
    /// Never blocks or allocates. A buffer that does not fit is dropped whole
    /// so the queue stays frame aligned.
    pub fn deliver(&mut self, samples: &[f32]) {
        let shared = &*self.shared;
        shared.in_flight.fetch_add(1, Ordering::SeqCst);

        if shared.active.load(Ordering::SeqCst) {
            let len = samples.len() as u64;
            if self.producer.vacant_len() >= samples.len() {
                self.producer.push_slice(samples);
                shared.delivered.fetch_add(len, Ordering::Relaxed);
            } else {
                shared.dropped.fetch_add(len, Ordering::Relaxed);
            }
        } else {
            shared.rejected.fetch_add(1, Ordering::Relaxed);
        }

        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Enqueue a raw HAL buffer of `byte_len` bytes of `f32` samples.
    ///
    /// # Safety
    ///
    /// `data` must be null or point to at least `byte_len` readable bytes,
    /// aligned for `f32`, that stay valid for the duration of the call.
    pub unsafe fn deliver_raw(&mut self, data: *const c_void, byte_len: usize) {
        let count = byte_len / mem::size_of::<f32>();
        if data.is_null() || count == 0 {
            return;
        }
        let samples = std::slice::from_raw_parts(data as *const f32, count);
        self.deliver(samples);
    }
}

/// Snapshot of a session's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    /// Samples accepted into the queue
    pub delivered_samples: u64,
    /// Samples lost to queue overflow or left short of a frame at stop
    pub dropped_samples: u64,
    pub rejected_callbacks: u64,
}

type OnSamples = Box<dyn FnMut(SampleBuffer<'_>) + Send + 'static>;

/// Non-real-time end: drains the queue into the caller's callback
struct Worker {
    consumer: HeapCons<f32>,
    shared: Arc<Shared>,
    channels: usize,
    chunk: Vec<f32>,
    poll_interval: Duration,
    on_samples: OnSamples,
}

impl Worker {
    fn run(mut self) {
        let mut reported_dropped = 0;
        loop {
            // Read before draining so the last pass sees everything enqueued before stop.
            let finished = self.shared.finished.load(Ordering::SeqCst);
            while self.drain_chunk() {}
            if finished {
                self.discard_partial_frame();
            }

            let dropped = self.shared.dropped.load(Ordering::Relaxed);
            if dropped > reported_dropped {
                tracing::warn!(
                    dropped = dropped - reported_dropped,
                    "Audio samples dropped"
                );
                reported_dropped = dropped;
            }

            if finished {
                break;
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Count samples short of a whole frame left in the queue at stop as dropped
    fn discard_partial_frame(&mut self) {
        let leftover = self.consumer.occupied_len().min(self.chunk.len());
        if leftover == 0 {
            return;
        }
        let popped = self.consumer.pop_slice(&mut self.chunk[..leftover]);
        self.shared.dropped.fetch_add(popped as u64, Ordering::Relaxed);
        tracing::debug!(samples = popped, "Discarded partial frame at stop");
    }

    fn drain_chunk(&mut self) -> bool {
        let available = self.consumer.occupied_len().min(self.chunk.len());
        let len = available - available % self.channels;
        if len == 0 {
            return false;
        }

        let popped = self.consumer.pop_slice(&mut self.chunk[..len]);
        (self.on_samples)(SampleBuffer {
            samples: &self.chunk[..popped],
            channels: self.channels,
        });
        true
    }
}

/// A live callback registration on one device
pub struct CaptureSession<D: CaptureDriver> {
    driver: Arc<D>,
    device_id: DeviceId,
    channels: usize,
    state: SessionState,
    registration: Option<D::Registration>,
    shared: Arc<Shared>,
    worker: Option<Worker>,
    worker_handle: Option<JoinHandle<()>>,
}

impl<D: CaptureDriver> CaptureSession<D> {
    /// Register a capture callback on `device_id`, leaving the session `Registered`
    pub fn open<F>(
        driver: Arc<D>,
        device_id: DeviceId,
        channels: usize,
        config: &CaptureConfig,
        on_samples: F,
    ) -> Result<Self, AudioError>
    where
        F: FnMut(SampleBuffer<'_>) + Send + 'static,
    {
        config.validate()?;
        let channels = channels.max(1);

        let (producer, consumer) = HeapRb::<f32>::new(config.queue_capacity).split();
        let shared = Arc::new(Shared::new());

        let worker = Worker {
            consumer,
            shared: shared.clone(),
            channels,
            chunk: vec![0.0f32; config.chunk_size.max(channels)],
            poll_interval: config.poll_interval(),
            on_samples: Box::new(on_samples),
        };

        let mut session = Self {
            driver,
            device_id,
            channels,
            state: SessionState::Idle,
            registration: None,
            shared: shared.clone(),
            worker: Some(worker),
            worker_handle: None,
        };

        let sink = SampleSink { producer, shared };
        let registration = session
            .driver
            .register(device_id, sink)
            .map_err(|status| {
                tracing::error!(device_id, %status, "Capture registration failed");
                AudioError::DriverRegistrationFailed {
                    device: device_id,
                    status,
                }
            })?;

        session.registration = Some(registration);
        session.state = SessionState::Registered;
        tracing::debug!(device_id, channels, "Capture callback registered");
        Ok(session)
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            delivered_samples: self.shared.delivered.load(Ordering::Relaxed),
            dropped_samples: self.shared.dropped.load(Ordering::Relaxed),
            rejected_callbacks: self.shared.rejected.load(Ordering::Relaxed),
        }
    }

    /// Start the consumer thread and ask the driver to begin delivering buffers.
    ///
    /// On driver failure the session is torn down and left `Stopped`.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.state != SessionState::Registered {
            return Err(AudioError::InvalidTransition {
                from: self.state,
                to: SessionState::Started,
            });
        }

        if let Some(worker) = self.worker.take() {
            let handle = thread::Builder::new()
                .name(CONSUMER_THREAD_NAME.to_string())
                .spawn(move || worker.run())
                .map_err(|e| {
                    self.teardown();
                    AudioError::ConsumerSpawnFailed(e)
                })?;
            self.worker_handle = Some(handle);
        }

        self.shared.active.store(true, Ordering::SeqCst);

        let started = match self.registration.as_mut() {
            Some(registration) => self.driver.start(self.device_id, registration),
            None => Ok(()),
        };
        if let Err(status) = started {
            tracing::error!(device_id = self.device_id, %status, "Failed to start capture");
            self.shared.active.store(false, Ordering::SeqCst);
            self.teardown();
            return Err(AudioError::DriverStartFailed {
                device: self.device_id,
                status,
            });
        }

        self.state = SessionState::Started;
        tracing::info!(device_id = self.device_id, channels = self.channels, "Capture started");
        Ok(())
    }

    /// Stop delivery and unregister. Safe to call more than once.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        match self.state {
            SessionState::Idle | SessionState::Stopped => return Ok(()),
            SessionState::Registered | SessionState::Started => {}
        }

        self.shared.active.store(false, Ordering::SeqCst);

        let mut result = Ok(());
        if self.state == SessionState::Started {
            if let Some(registration) = self.registration.as_mut() {
                if let Err(status) = self.driver.stop(self.device_id, registration) {
                    tracing::error!(device_id = self.device_id, %status, "Failed to stop device");
                    result = Err(AudioError::DriverStopFailed {
                        device: self.device_id,
                        status,
                    });
                }
            }
        }

        self.teardown();

        let stats = self.stats();
        tracing::info!(
            device_id = self.device_id,
            delivered = stats.delivered_samples,
            dropped = stats.dropped_samples,
            "Capture stopped"
        );
        result
    }

    /// Wait out in-flight callbacks, unregister, and finish the consumer
    fn teardown(&mut self) {
        self.shared.wait_idle();

        if let Some(registration) = self.registration.take() {
            self.driver.unregister(self.device_id, registration);
        }

        self.worker = None;
        self.shared.finished.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                tracing::error!(device_id = self.device_id, "Capture consumer thread panicked");
            }
        }

        self.state = SessionState::Stopped;
    }
}

impl<D: CaptureDriver> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Error stopping capture session on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OsStatus;
    use crate::fake::FakeDriver;

    fn counting_session(
        driver: &Arc<FakeDriver>,
        channels: usize,
    ) -> (CaptureSession<FakeDriver>, Arc<AtomicUsize>) {
        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        let config = CaptureConfig {
            poll_interval_ms: 1,
            ..CaptureConfig::default()
        };
        let session = CaptureSession::open(driver.clone(), 4, channels, &config, move |buf| {
            assert_eq!(buf.len() % buf.channels(), 0);
            counter.fetch_add(buf.len(), Ordering::SeqCst);
        })
        .unwrap();
        (session, received)
    }

    #[test]
    fn test_lifecycle_moves_forward() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, _) = counting_session(&driver, 1);
        assert_eq!(session.state(), SessionState::Registered);
        assert_eq!(driver.registrations(), 1);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);
        assert!(driver.is_started());

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!driver.is_started());
        assert_eq!(driver.unregistrations(), 1);

        assert!(matches!(
            session.start(),
            Err(AudioError::InvalidTransition {
                from: SessionState::Stopped,
                to: SessionState::Started
            })
        ));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, _) = counting_session(&driver, 1);
        session.start().unwrap();
        session.stop().unwrap();
        session.stop().unwrap();
        drop(session);
        assert_eq!(driver.unregistrations(), 1);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, _) = counting_session(&driver, 1);
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(AudioError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_registration_failure_surfaces() {
        let driver = Arc::new(FakeDriver::failing_register(OsStatus(-50)));
        let result =
            CaptureSession::open(driver.clone(), 4, 1, &CaptureConfig::default(), |_| {});
        assert!(matches!(
            result,
            Err(AudioError::DriverRegistrationFailed { device: 4, .. })
        ));
    }

    #[test]
    fn test_start_failure_leaves_session_unusable() {
        let driver = Arc::new(FakeDriver::failing_start(OsStatus(-50)));
        let (mut session, received) = counting_session(&driver, 1);

        assert!(matches!(
            session.start(),
            Err(AudioError::DriverStartFailed { device: 4, .. })
        ));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(driver.unregistrations(), 1);

        driver.fire(&[0.5; 8]);
        assert_eq!(received.load(Ordering::SeqCst), 0);
        assert!(session.start().is_err());
    }

    #[test]
    fn test_samples_reach_consumer() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, received) = counting_session(&driver, 2);
        session.start().unwrap();

        driver.fire(&[0.1, -0.1, 0.2, -0.2]);
        driver.fire(&[0.3, -0.3]);
        session.stop().unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 6);
        assert_eq!(session.stats().delivered_samples, 6);
    }

    #[test]
    fn test_no_delivery_before_start() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, received) = counting_session(&driver, 1);

        driver.fire(&[1.0; 4]);
        session.start().unwrap();
        session.stop().unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 0);
        assert_eq!(session.stats().rejected_callbacks, 1);
    }

    #[test]
    fn test_no_delivery_after_stop() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, received) = counting_session(&driver, 1);
        session.start().unwrap();

        let firing = Arc::new(AtomicBool::new(true));
        let producer = {
            let driver = driver.clone();
            let firing = firing.clone();
            thread::spawn(move || {
                while firing.load(Ordering::SeqCst) {
                    driver.fire(&[0.25; 64]);
                    thread::yield_now();
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        session.stop().unwrap();
        let after_stop = received.load(Ordering::SeqCst);

        thread::sleep(Duration::from_millis(20));
        firing.store(false, Ordering::SeqCst);
        producer.join().unwrap();

        driver.fire(&[0.25; 64]);
        assert_eq!(received.load(Ordering::SeqCst), after_stop);
        assert_eq!(after_stop as u64, session.stats().delivered_samples);
        assert!(session.stats().rejected_callbacks >= 1);
    }

    #[test]
    fn test_partial_frame_at_stop_counts_as_dropped() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, received) = counting_session(&driver, 2);
        session.start().unwrap();

        driver.fire(&[0.1, -0.1, 0.2]);
        session.stop().unwrap();

        let stats = session.stats();
        assert_eq!(received.load(Ordering::SeqCst), 2);
        assert_eq!(stats.delivered_samples, 3);
        assert_eq!(stats.dropped_samples, 1);
    }

    #[test]
    fn test_overflow_drops_whole_buffers() {
        let (producer, _consumer) = HeapRb::<f32>::new(6).split();
        let shared = Arc::new(Shared::new());
        shared.active.store(true, Ordering::SeqCst);
        let mut sink = SampleSink {
            producer,
            shared: shared.clone(),
        };

        sink.deliver(&[0.0; 4]);
        sink.deliver(&[0.0; 4]);

        assert_eq!(shared.delivered.load(Ordering::Relaxed), 4);
        assert_eq!(shared.dropped.load(Ordering::Relaxed), 4);
        assert_eq!(shared.in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_deliver_raw_skips_null_and_counts_samples() {
        let driver = Arc::new(FakeDriver::default());
        let (mut session, received) = counting_session(&driver, 1);
        session.start().unwrap();

        let samples = [0.5f32, 0.25, -0.5];
        driver.with_sink(|sink| unsafe {
            sink.deliver_raw(std::ptr::null(), 12);
            // A trailing partial sample is ignored.
            sink.deliver_raw(samples.as_ptr() as *const c_void, 12 + 2);
        });
        session.stop().unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_sample_buffer_frames() {
        let samples = [0.0f32; 6];
        let buf = SampleBuffer {
            samples: &samples,
            channels: 2,
        };
        assert_eq!(buf.frames(), 3);
        assert_eq!(buf.len(), 6);
    }
}
