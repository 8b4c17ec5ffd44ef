use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Acceleration magnitude (m/s², gravity included) a sample must exceed
pub const SHAKE_THRESHOLD: f64 = 25.0;

/// Minimum spacing between two accepted shakes
pub const SHAKE_DEBOUNCE: Duration = Duration::from_millis(800);

/// One acceleration-including-gravity reading. Axes the platform could not
/// report are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AccelerationSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl AccelerationSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Euclidean magnitude, or `None` when any axis is missing or non-finite
    pub fn magnitude(&self) -> Option<f64> {
        let (x, y, z) = (self.x?, self.y?, self.z?);
        let magnitude = (x * x + y * y + z * z).sqrt();
        magnitude.is_finite().then_some(magnitude)
    }
}

/// An accepted shake
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeEvent {
    pub magnitude: f64,
    pub at: Instant,
}

/// Threshold detector with a debounce window anchored on the last accepted shake
#[derive(Debug, Clone)]
pub struct ShakeDetector {
    threshold: f64,
    debounce: Duration,
    last_shake: Option<Instant>,
}

impl ShakeDetector {
    pub fn new() -> Self {
        Self::with_settings(SHAKE_THRESHOLD, SHAKE_DEBOUNCE)
    }

    pub fn with_settings(threshold: f64, debounce: Duration) -> Self {
        Self {
            threshold,
            debounce,
            last_shake: None,
        }
    }

    /// Feed one sample; returns the shake it completes, if any
    pub fn process(&mut self, sample: AccelerationSample, now: Instant) -> Option<ShakeEvent> {
        let magnitude = sample.magnitude()?;

        if magnitude <= self.threshold {
            return None;
        }

        if let Some(last) = self.last_shake {
            if now.saturating_duration_since(last) <= self.debounce {
                trace!("Shake of {:.2} inside debounce window, dropped", magnitude);
                return None;
            }
        }

        self.last_shake = Some(now);
        Some(ShakeEvent { magnitude, at: now })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new()
    }
}
