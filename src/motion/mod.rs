mod detector;
mod iio;
mod source;

pub use detector::{AccelerationSample, ShakeDetector, ShakeEvent, SHAKE_DEBOUNCE, SHAKE_THRESHOLD};
pub use iio::{IioAccelerometer, IIO_DEVICES};
pub use source::{channel, ChannelMotionSource, MotionSource, NoMotion};

use crate::config::{MotionBackend, MotionConfig};
use crate::error::MotionError;
use std::path::PathBuf;
use tracing::warn;

/// Build the motion source selected by configuration.
///
/// The keyboard backend returns the channel sender so the host can inject
/// simulated samples; other backends return `None` for it.
pub fn from_config(
    config: &MotionConfig,
) -> (Box<dyn MotionSource>, Option<tokio::sync::mpsc::Sender<AccelerationSample>>) {
    match config.backend {
        MotionBackend::Iio => {
            let device = config
                .iio_device
                .clone()
                .map(PathBuf::from)
                .or_else(IioAccelerometer::discover);

            let opened = device
                .ok_or_else(|| MotionError::DeviceNotFound(IIO_DEVICES.to_string()))
                .and_then(|device| IioAccelerometer::open(device, config.poll_interval()));

            match opened {
                Ok(accelerometer) => (Box::new(accelerometer), None),
                Err(e) => {
                    warn!("{}, shake input disabled", e);
                    (Box::new(NoMotion), None)
                }
            }
        }
        MotionBackend::Keyboard => {
            let (sender, source) = channel(64);
            (Box::new(source), Some(sender))
        }
        MotionBackend::None => (Box::new(NoMotion), None),
    }
}
