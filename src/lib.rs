pub mod analytics;
pub mod config;
pub mod error;
pub mod events;
pub mod motion;
pub mod presentation;
pub mod profile;
pub mod signal;
pub mod terminal;
pub mod torch;

pub use analytics::{AnalyticsSink, EventParams, JsonLinesAnalytics, NoopAnalytics, TracingAnalytics};
pub use config::PawSignalConfig;
pub use error::{PawSignalError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, SignalEvent};
pub use motion::{AccelerationSample, MotionSource, ShakeDetector, ShakeEvent};
pub use presentation::{
    render, Frame, PresentationMode, PresentationState, ScreenInput, ScreenInputs, SignalScreen,
    SignalScreenBuilder, Transition, Trigger,
};
pub use profile::{DogProfile, ProfileStore};
pub use signal::{Rgb, Signal, SignalIcon, SignalId, SIGNALS};
pub use torch::{TorchController, TorchDevice, TorchStream};
