use thiserror::Error;

#[derive(Error, Debug)]
pub enum PawSignalError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Torch error: {0}")]
    Torch(#[from] TorchError),

    #[error("Motion error: {0}")]
    Motion(#[from] MotionError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    #[error("Invalid color value: {0}")]
    InvalidColor(String),
}

/// Failures while acquiring or driving the torch. Never surfaced to the screen.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TorchError {
    #[error("No torch device at {0}")]
    NoDevice(String),

    #[error("Permission denied for torch device: {0}")]
    PermissionDenied(String),

    #[error("Torch not available on this system")]
    NotAvailable,

    #[error("Failed to apply torch constraint: {details}")]
    Constraint { details: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("No accelerometer channels under {0}")]
    DeviceNotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("Missing required profile fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, PawSignalError>;
