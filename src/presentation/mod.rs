mod render;
mod screen;
mod state;
#[cfg(test)]
mod tests;

pub use render::{render, Frame, BACK_LABEL, HINT_START, HINT_STOP};
pub use screen::{BackCallback, ScreenInputs, SignalScreen, SignalScreenBuilder};
pub use state::{PresentationMode, PresentationState, ScreenInput, Transition, Trigger};
