use super::device::{TorchDevice, TorchStream};
use crate::error::TorchError;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Flash LED exposed through the Linux LED class (`/sys/class/leds/<name>`)
#[derive(Debug, Clone)]
pub struct SysfsFlashLed {
    led_dir: PathBuf,
    name: String,
}

impl SysfsFlashLed {
    pub fn new<P: AsRef<Path>>(led_dir: P) -> Self {
        let led_dir = led_dir.as_ref().to_path_buf();
        let name = led_dir.display().to_string();
        Self { led_dir, name }
    }

    fn map_open_error(&self, path: &Path, e: std::io::Error) -> TorchError {
        match e.kind() {
            ErrorKind::NotFound => TorchError::NoDevice(path.display().to_string()),
            ErrorKind::PermissionDenied => TorchError::PermissionDenied(path.display().to_string()),
            _ => TorchError::Constraint {
                details: format!("Failed to open {}: {}", path.display(), e),
            },
        }
    }

    fn read_max_brightness(&self) -> u32 {
        let path = self.led_dir.join("max_brightness");
        match std::fs::read_to_string(&path) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Unparseable max_brightness in {}: {:?}", path.display(), raw.trim());
                1
            }),
            Err(e) => {
                debug!("No max_brightness at {} ({}), assuming 1", path.display(), e);
                1
            }
        }
    }
}

#[async_trait]
impl TorchDevice for SysfsFlashLed {
    async fn open_stream(&self) -> Result<Box<dyn TorchStream>, TorchError> {
        let brightness_path = self.led_dir.join("brightness");

        // Opening for write up front surfaces missing devices and permissions
        OpenOptions::new()
            .write(true)
            .open(&brightness_path)
            .map_err(|e| self.map_open_error(&brightness_path, e))?;

        let max_brightness = self.read_max_brightness();
        info!(
            "Torch LED opened: {} (max brightness {})",
            brightness_path.display(),
            max_brightness
        );

        Ok(Box::new(SysfsLedStream {
            brightness_path: Some(brightness_path),
            max_brightness,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct SysfsLedStream {
    brightness_path: Option<PathBuf>,
    max_brightness: u32,
}

impl SysfsLedStream {
    fn write_brightness(path: &Path, value: u32) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(format!("{}\n", value).as_bytes())?;
        file.flush()
    }
}

#[async_trait]
impl TorchStream for SysfsLedStream {
    fn supports_torch(&self) -> bool {
        self.max_brightness > 0
    }

    async fn apply_torch(&mut self, on: bool) -> Result<(), TorchError> {
        let value = if on { self.max_brightness } else { 0 };
        let path = self.brightness_path.as_deref().ok_or(TorchError::NotAvailable)?;

        Self::write_brightness(path, value).map_err(|e| TorchError::Constraint {
            details: e.to_string(),
        })
    }

    fn stop_tracks(&mut self) {
        if let Some(path) = self.brightness_path.take() {
            if let Err(e) = Self::write_brightness(&path, 0) {
                debug!("Failed to switch torch LED off while stopping: {}", e);
            }
        }
    }
}
