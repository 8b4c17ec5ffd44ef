use super::detector::AccelerationSample;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A stream of acceleration samples for the lifetime of a screen
#[async_trait]
pub trait MotionSource: Send {
    /// Wait for the next sample. `None` means the source has ended and will
    /// never produce another one. Must be cancel safe.
    async fn next_sample(&mut self) -> Option<AccelerationSample>;
}

/// Source for platforms without motion events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMotion;

#[async_trait]
impl MotionSource for NoMotion {
    async fn next_sample(&mut self) -> Option<AccelerationSample> {
        None
    }
}

/// Samples pushed through an mpsc channel
pub struct ChannelMotionSource {
    receiver: mpsc::Receiver<AccelerationSample>,
}

#[async_trait]
impl MotionSource for ChannelMotionSource {
    async fn next_sample(&mut self) -> Option<AccelerationSample> {
        self.receiver.recv().await
    }
}

/// Create a channel-backed motion source
pub fn channel(capacity: usize) -> (mpsc::Sender<AccelerationSample>, ChannelMotionSource) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (sender, ChannelMotionSource { receiver })
}
