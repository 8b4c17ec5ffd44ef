use serde::Serialize;

/// How the signal color is currently presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresentationMode {
    /// Steady color, torch off
    Solid,
    /// Color and torch alternate with the background on every tick
    Attention,
}

/// User input delivered to a mounted signal screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenInput {
    /// Tap anywhere on the background
    Tap,
    /// The explicit start/stop flashing control
    FlashButton,
    /// An accepted shake from the motion detector
    Shake,
    /// The exit affordance
    Back,
}

/// What caused a mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Tap,
    Button,
    Shake,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Tap => "tap",
            Trigger::Button => "button",
            Trigger::Shake => "shake",
        }
    }
}

/// Outcome of applying one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Input had no effect in the current mode
    Ignored,
    EnterAttention(Trigger),
    LeaveAttention(Trigger),
    /// Navigate away; mode is left untouched
    Exit,
}

/// Mode and duty-cycle flag of a signal screen.
///
/// Transition graph (flash control + shake):
///
/// ```text
///            FlashButton | Shake
///   Solid  ------------------------>  Attention
///          <------------------------
///         FlashButton | Shake | Tap
/// ```
///
/// A background tap only ever stops flashing, so a stray touch cannot start
/// it. `Back` exits from either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationState {
    mode: PresentationMode,
    color_on: bool,
}

impl PresentationState {
    pub fn new() -> Self {
        Self {
            mode: PresentationMode::Solid,
            color_on: true,
        }
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn color_on(&self) -> bool {
        self.color_on
    }

    pub fn is_attention(&self) -> bool {
        self.mode == PresentationMode::Attention
    }

    /// Apply an input and report the transition taken
    pub fn apply(&mut self, input: ScreenInput) -> Transition {
        let trigger = match input {
            ScreenInput::Back => return Transition::Exit,
            ScreenInput::Tap => Trigger::Tap,
            ScreenInput::FlashButton => Trigger::Button,
            ScreenInput::Shake => Trigger::Shake,
        };

        match (self.mode, trigger) {
            (PresentationMode::Solid, Trigger::Tap) => Transition::Ignored,
            (PresentationMode::Solid, _) => {
                self.mode = PresentationMode::Attention;
                self.color_on = true;
                Transition::EnterAttention(trigger)
            }
            (PresentationMode::Attention, _) => {
                self.mode = PresentationMode::Solid;
                self.color_on = true;
                Transition::LeaveAttention(trigger)
            }
        }
    }

    /// Advance the duty cycle. Returns the new flag, or `None` outside
    /// attention mode.
    pub fn tick(&mut self) -> Option<bool> {
        if self.mode != PresentationMode::Attention {
            return None;
        }

        self.color_on = !self.color_on;
        Some(self.color_on)
    }
}

impl Default for PresentationState {
    fn default() -> Self {
        Self::new()
    }
}
