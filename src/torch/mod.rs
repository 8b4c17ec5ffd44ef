mod controller;
mod device;
mod mock;
mod sysfs;
#[cfg(test)]
mod tests;

pub use controller::TorchController;
pub use device::{NoTorch, TorchDevice, TorchStream};
pub use mock::{MockTorch, MockTorchLog, MockTorchOutcome};
pub use sysfs::SysfsFlashLed;

use crate::config::{TorchBackend, TorchConfig};
use std::sync::Arc;

/// Build the torch device selected by configuration
pub fn from_config(config: &TorchConfig) -> Arc<dyn TorchDevice> {
    match config.backend {
        TorchBackend::Sysfs => Arc::new(SysfsFlashLed::new(&config.led_device)),
        TorchBackend::Mock => Arc::new(MockTorch::new(MockTorchOutcome::Grant)),
        TorchBackend::None => Arc::new(NoTorch),
    }
}
