use super::detector::AccelerationSample;
use super::source::MotionSource;
use crate::error::MotionError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const IIO_DEVICES: &str = "/sys/bus/iio/devices";

/// Accelerometer read through the Linux IIO sysfs interface
pub struct IioAccelerometer {
    device_dir: PathBuf,
    poll: Interval,
    scale: Option<f64>,
    reported_missing: bool,
}

impl IioAccelerometer {
    pub fn new<P: Into<PathBuf>>(device_dir: P, poll_interval: Duration) -> Self {
        let device_dir = device_dir.into();
        info!(
            "Polling IIO accelerometer at {} every {:?}",
            device_dir.display(),
            poll_interval
        );

        let mut poll = interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            device_dir,
            poll,
            scale: None,
            reported_missing: false,
        }
    }

    /// Open a device directory, checking that it exposes acceleration channels
    pub fn open<P: Into<PathBuf>>(device_dir: P, poll_interval: Duration) -> Result<Self, MotionError> {
        let device_dir = device_dir.into();
        if !device_dir.join("in_accel_x_raw").exists() {
            return Err(MotionError::DeviceNotFound(device_dir.display().to_string()));
        }
        Ok(Self::new(device_dir, poll_interval))
    }

    /// Find the first IIO device exposing acceleration channels
    pub fn discover() -> Option<PathBuf> {
        Self::discover_in(Path::new(IIO_DEVICES))
    }

    pub(crate) fn discover_in(root: &Path) -> Option<PathBuf> {
        let entries = std::fs::read_dir(root).ok()?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join("in_accel_x_raw").exists())
            .collect();
        candidates.sort();

        if let Some(found) = candidates.first() {
            let name = std::fs::read_to_string(found.join("name")).unwrap_or_default();
            info!("Found accelerometer: {} ({})", found.display(), name.trim());
        }

        candidates.into_iter().next()
    }

    // Sysfs attributes answer immediately, so reads stay synchronous and no
    // await point follows a consumed tick
    fn read_value(&self, file: &str) -> Option<f64> {
        let raw = std::fs::read_to_string(self.device_dir.join(file)).ok()?;
        raw.trim().parse().ok()
    }

    fn scale(&mut self) -> f64 {
        if let Some(scale) = self.scale {
            return scale;
        }

        let scale = match self.read_value("in_accel_scale") {
            Some(scale) if scale.is_finite() && scale > 0.0 => scale,
            _ => {
                debug!("No usable in_accel_scale for {}, using 1.0", self.device_dir.display());
                1.0
            }
        };
        self.scale = Some(scale);
        scale
    }

    /// Read one sample; axes that cannot be read are reported as missing
    pub fn read_sample(&mut self) -> AccelerationSample {
        let scale = self.scale();

        let sample = AccelerationSample {
            x: self.read_value("in_accel_x_raw").map(|v| v * scale),
            y: self.read_value("in_accel_y_raw").map(|v| v * scale),
            z: self.read_value("in_accel_z_raw").map(|v| v * scale),
        };

        if sample.magnitude().is_none() && !self.reported_missing {
            warn!(
                "Accelerometer {} returned an incomplete sample: {:?}",
                self.device_dir.display(),
                sample
            );
            self.reported_missing = true;
        }

        sample
    }
}

#[async_trait]
impl MotionSource for IioAccelerometer {
    async fn next_sample(&mut self) -> Option<AccelerationSample> {
        self.poll.tick().await;
        Some(self.read_sample())
    }
}
