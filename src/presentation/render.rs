use super::state::{PresentationMode, PresentationState};
use crate::signal::{Rgb, Signal, SignalIcon};
use serde::Serialize;

pub const HINT_START: &str = "Tap Flash or shake to get attention";
pub const HINT_STOP: &str = "Tap anywhere to stop";
pub const BACK_LABEL: &str = "‹ Back";

/// Everything needed to paint the signal screen for one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub mode: PresentationMode,
    pub background: Rgb,
    pub foreground: Rgb,
    /// Label, guidance and icon are drawn only when set
    pub text_visible: bool,
    pub label: &'static str,
    pub guidance: &'static str,
    pub icon: SignalIcon,
    pub hint: &'static str,
    /// Label of the start/stop flashing control
    pub flash_control: &'static str,
    /// The back control is drawn and tappable in every mode
    pub back_label: &'static str,
}

/// Derive the frame for a signal in the given presentation state
pub fn render(signal: &Signal, state: &PresentationState) -> Frame {
    let attention = state.mode() == PresentationMode::Attention;
    let lit = !attention || state.color_on();

    Frame {
        mode: state.mode(),
        background: if lit { signal.hex } else { Rgb::BLACK },
        foreground: signal.text_color,
        text_visible: lit,
        label: signal.label,
        guidance: signal.guidance,
        icon: signal.icon,
        hint: if attention { HINT_STOP } else { HINT_START },
        flash_control: if attention { "Stop" } else { "Flash" },
        back_label: BACK_LABEL,
    }
}
