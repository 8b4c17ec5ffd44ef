use crate::error::TorchError;
use async_trait::async_trait;

/// A source of torch streams, typically the rear camera's flash LED
#[async_trait]
pub trait TorchDevice: Send + Sync {
    /// Request a stream that owns the torch hardware
    async fn open_stream(&self) -> Result<Box<dyn TorchStream>, TorchError>;

    /// Human readable device name for logs
    fn name(&self) -> &str;
}

/// An acquired torch stream. Dropping it without `stop_tracks` is a leak.
#[async_trait]
pub trait TorchStream: Send {
    /// Whether any track of the stream can drive a torch
    fn supports_torch(&self) -> bool;

    /// Switch the torch on or off
    async fn apply_torch(&mut self, on: bool) -> Result<(), TorchError>;

    /// Stop every track and give the hardware back
    fn stop_tracks(&mut self);
}

/// Torch device for platforms without one
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTorch;

#[async_trait]
impl TorchDevice for NoTorch {
    async fn open_stream(&self) -> Result<Box<dyn TorchStream>, TorchError> {
        Err(TorchError::NotAvailable)
    }

    fn name(&self) -> &str {
        "none"
    }
}
