use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PawSignalConfig {
    pub presentation: PresentationConfig,
    pub torch: TorchConfig,
    pub motion: MotionConfig,
    pub profile: ProfileConfig,
    pub analytics: AnalyticsConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PresentationConfig {
    /// Half-period of the attention duty cycle in milliseconds
    #[serde(default = "default_flash_period_ms")]
    pub flash_period_ms: u64,

    /// Acceleration magnitude a sample must exceed to count as a shake
    #[serde(default = "default_shake_threshold")]
    pub shake_threshold: f64,

    /// Minimum spacing between accepted shakes in milliseconds
    #[serde(default = "default_shake_debounce_ms")]
    pub shake_debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TorchConfig {
    /// Torch hardware backend
    #[serde(default = "default_torch_backend")]
    pub backend: TorchBackend,

    /// LED class device directory (sysfs backend)
    #[serde(default = "default_led_device")]
    pub led_device: String,

    /// When the torch stream is requested
    #[serde(default = "default_torch_acquisition")]
    pub acquisition: TorchAcquisition,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MotionConfig {
    /// Acceleration sample backend
    #[serde(default = "default_motion_backend")]
    pub backend: MotionBackend,

    /// IIO device directory; discovered when unset
    pub iio_device: Option<String>,

    /// IIO polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProfileConfig {
    /// Location of the single local profile record
    #[serde(default = "default_profile_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AnalyticsConfig {
    /// Emit analytics events at all
    #[serde(default = "default_analytics_enabled")]
    pub enabled: bool,

    /// Append events as JSON lines to this file instead of the log
    pub log_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TorchBackend {
    Sysfs,
    Mock,
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TorchAcquisition {
    /// Request the stream on the first flash
    Lazy,
    /// Request the stream as soon as the screen mounts
    Eager,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MotionBackend {
    Iio,
    Keyboard,
    None,
}

impl PresentationConfig {
    pub fn flash_period(&self) -> Duration {
        Duration::from_millis(self.flash_period_ms)
    }

    pub fn shake_debounce(&self) -> Duration {
        Duration::from_millis(self.shake_debounce_ms)
    }
}

impl MotionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl PawSignalConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("presentation.flash_period_ms", default_flash_period_ms())?
            .set_default("presentation.shake_threshold", default_shake_threshold())?
            .set_default("presentation.shake_debounce_ms", default_shake_debounce_ms())?
            .set_default("torch.backend", "sysfs")?
            .set_default("torch.led_device", default_led_device())?
            .set_default("torch.acquisition", "lazy")?
            .set_default("motion.backend", "keyboard")?
            .set_default("motion.poll_interval_ms", default_poll_interval_ms())?
            .set_default("profile.path", default_profile_path())?
            .set_default("analytics.enabled", default_analytics_enabled())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // PAWSIGNAL_PRESENTATION__FLASH_PERIOD_MS=250
            .add_source(
                Environment::with_prefix("PAWSIGNAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PawSignalConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.presentation.flash_period_ms == 0 {
            return Err(ConfigError::Message(
                "Presentation flash_period_ms must be greater than 0".to_string(),
            ));
        }

        if !self.presentation.shake_threshold.is_finite() || self.presentation.shake_threshold <= 0.0 {
            return Err(ConfigError::Message(
                "Presentation shake_threshold must be a positive number".to_string(),
            ));
        }

        if self.motion.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Motion poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.torch.backend == TorchBackend::Sysfs && self.torch.led_device.trim().is_empty() {
            return Err(ConfigError::Message(
                "Torch led_device must be set for the sysfs backend".to_string(),
            ));
        }

        if self.profile.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Profile path must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            flash_period_ms: default_flash_period_ms(),
            shake_threshold: default_shake_threshold(),
            shake_debounce_ms: default_shake_debounce_ms(),
        }
    }
}

impl Default for PawSignalConfig {
    fn default() -> Self {
        Self {
            presentation: PresentationConfig::default(),
            torch: TorchConfig {
                backend: default_torch_backend(),
                led_device: default_led_device(),
                acquisition: default_torch_acquisition(),
            },
            motion: MotionConfig {
                backend: default_motion_backend(),
                iio_device: None,
                poll_interval_ms: default_poll_interval_ms(),
            },
            profile: ProfileConfig {
                path: default_profile_path(),
            },
            analytics: AnalyticsConfig {
                enabled: default_analytics_enabled(),
                log_path: None,
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_flash_period_ms() -> u64 {
    500
}
fn default_shake_threshold() -> f64 {
    25.0
}
fn default_shake_debounce_ms() -> u64 {
    800
}

fn default_torch_backend() -> TorchBackend {
    TorchBackend::Sysfs
}
fn default_led_device() -> String {
    "/sys/class/leds/torch-light0".to_string()
}
fn default_torch_acquisition() -> TorchAcquisition {
    TorchAcquisition::Lazy
}

fn default_motion_backend() -> MotionBackend {
    MotionBackend::Keyboard
}
fn default_poll_interval_ms() -> u64 {
    20
}

fn default_profile_path() -> String {
    "pawsignal-profile.json".to_string()
}

fn default_analytics_enabled() -> bool {
    false
}

fn default_event_bus_capacity() -> usize {
    100
}
