//! Async adapter over a capture session
//!
//! The consumer thread copies each [`SampleBuffer`](crate::SampleBuffer)
//! into a `Vec` and sends it through an unbounded tokio channel, so callers
//! can `await` chunks instead of supplying a callback.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream as FuturesStream;
use tokio::sync::mpsc as tokio_mpsc;

use crate::capture::{CaptureSession, CaptureStats, SampleBuffer};
use crate::error::AudioError;
use crate::traits::{AudioStream, CaptureDriver};

/// Build the callback feeding a [`CaptureStream`]
pub(crate) fn channel_callback() -> (
    impl FnMut(SampleBuffer<'_>) + Send + 'static,
    tokio_mpsc::UnboundedReceiver<Vec<f32>>,
) {
    let (tx, rx) = tokio_mpsc::unbounded_channel::<Vec<f32>>();
    let callback = move |buffer: SampleBuffer<'_>| send_samples(&tx, buffer.to_vec());
    (callback, rx)
}

/// Send a chunk down the channel, logging if the stream was dropped
fn send_samples(tx: &tokio_mpsc::UnboundedSender<Vec<f32>>, samples: Vec<f32>) {
    if let Err(e) = tx.send(samples) {
        // Only log at debug level since this typically happens during shutdown
        tracing::debug!("Failed to send audio samples (receiver dropped): {}", e);
    }
}

/// Stream of interleaved sample chunks from a started capture session.
///
/// Ends once the session is stopped; dropping the stream stops the session.
pub struct CaptureStream<D: CaptureDriver> {
    session: CaptureSession<D>,
    receiver: tokio_mpsc::UnboundedReceiver<Vec<f32>>,
}

impl<D: CaptureDriver> CaptureStream<D> {
    /// Start `session` and wrap it; `receiver` must be the one paired with its callback
    pub(crate) fn start(
        mut session: CaptureSession<D>,
        receiver: tokio_mpsc::UnboundedReceiver<Vec<f32>>,
    ) -> Result<Self, AudioError> {
        session.start()?;
        Ok(Self { session, receiver })
    }

    pub fn session(&self) -> &CaptureSession<D> {
        &self.session
    }

    pub fn stats(&self) -> CaptureStats {
        self.session.stats()
    }

    /// Stop capturing; chunks already captured are still yielded
    pub fn stop(&mut self) -> Result<(), AudioError> {
        self.session.stop()
    }
}

impl<D: CaptureDriver> AudioStream for CaptureStream<D> {
    fn channels(&self) -> usize {
        self.session.channels()
    }
}

// The stream is never pinned structurally.
impl<D: CaptureDriver> Unpin for CaptureStream<D> {}

impl<D: CaptureDriver> FuturesStream for CaptureStream<D> {
    type Item = Vec<f32>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}
