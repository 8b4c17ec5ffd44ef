use crate::error::Result;
use crate::motion::AccelerationSample;
use crate::presentation::{Frame, ScreenInputs};
use crate::signal::Rgb;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Acceleration injected by the shake key; well above the default threshold
const SIMULATED_SHAKE: AccelerationSample = AccelerationSample {
    x: Some(30.0),
    y: Some(0.0),
    z: Some(0.0),
};

/// What a key press does on the signal screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Tap,
    Flash,
    Shake,
    Back,
}

/// Map a key to its action on the signal screen
pub fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Option<KeyAction> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(KeyAction::Back),
        KeyCode::Char(' ') | KeyCode::Enter => Some(KeyAction::Tap),
        KeyCode::Char('f') | KeyCode::Char('F') => Some(KeyAction::Flash),
        KeyCode::Char('s') | KeyCode::Char('S') => Some(KeyAction::Shake),
        KeyCode::Char('b') | KeyCode::Char('q') | KeyCode::Esc | KeyCode::Backspace => {
            Some(KeyAction::Back)
        }
        _ => None,
    }
}

/// Keyboard front end for a mounted signal screen
pub struct KeyboardHost {
    inputs: ScreenInputs,
    shake_sender: Option<mpsc::Sender<AccelerationSample>>,
    cancellation_token: CancellationToken,
}

impl KeyboardHost {
    pub fn new(
        inputs: ScreenInputs,
        shake_sender: Option<mpsc::Sender<AccelerationSample>>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            inputs,
            shake_sender,
            cancellation_token,
        }
    }

    /// Deliver one key action to the screen
    pub fn dispatch(&self, action: KeyAction) {
        let delivered = match action {
            KeyAction::Tap => self.inputs.tap(),
            KeyAction::Flash => self.inputs.press_flash(),
            KeyAction::Back => self.inputs.back(),
            KeyAction::Shake => match &self.shake_sender {
                Some(sender) => match sender.try_send(SIMULATED_SHAKE) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("Motion queue full, simulated shake dropped");
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                },
                None => {
                    debug!("Shake simulation needs the keyboard motion backend");
                    true
                }
            },
        };

        if !delivered {
            debug!("{:?} not delivered, screen is gone", action);
        }
    }

    /// Start reading keys on a blocking thread until cancelled
    pub fn start(self) -> JoinHandle<()> {
        info!("Keyboard host active: SPACE/ENTER tap, F flash, S shake, B/ESC back");

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !self.cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if key_event.kind != KeyEventKind::Press {
                                continue;
                            }
                            match map_key(key_event.code, key_event.modifiers) {
                                Some(action) => self.dispatch(action),
                                None => debug!("Key pressed: {:?}", key_event.code),
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard host exited");
        })
    }
}

/// One line of text placed on the terminal grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub column: u16,
    pub row: u16,
    pub text: String,
}

fn centered(text: &str, row: u16, columns: u16) -> Placement {
    let width = text.chars().count() as u16;
    Placement {
        column: columns.saturating_sub(width) / 2,
        row,
        text: text.to_string(),
    }
}

/// Lay out a frame on a `columns` x `rows` grid.
///
/// The back control and the hint are placed in every mode; signal text only
/// while `text_visible` is set.
pub fn layout(frame: &Frame, columns: u16, rows: u16) -> Vec<Placement> {
    let middle = rows / 2;
    let mut placements = vec![Placement {
        column: 1,
        row: 0,
        text: frame.back_label.to_string(),
    }];

    if frame.text_visible {
        placements.push(centered(frame.icon.glyph(), middle.saturating_sub(3), columns));
        placements.push(centered(frame.label, middle.saturating_sub(1), columns));
        placements.push(centered(frame.guidance, middle + 1, columns));
    }

    let control = format!("[ {} ]", frame.flash_control);
    placements.push(centered(&control, rows.saturating_sub(3), columns));
    placements.push(centered(frame.hint, rows.saturating_sub(2), columns));
    placements
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.r,
        g: rgb.g,
        b: rgb.b,
    }
}

/// Paint a frame over the whole terminal
pub fn draw_frame<W: Write>(out: &mut W, frame: &Frame, columns: u16, rows: u16) -> io::Result<()> {
    queue!(
        out,
        SetBackgroundColor(color(frame.background)),
        Clear(ClearType::All),
        SetForegroundColor(color(frame.foreground))
    )?;

    for placement in layout(frame, columns, rows) {
        queue!(out, MoveTo(placement.column, placement.row), Print(placement.text))?;
    }

    queue!(out, ResetColor)?;
    out.flush()
}

/// Repaint the terminal on every frame change until cancelled or the screen
/// is gone
pub async fn paint_frames(
    mut frames: watch::Receiver<Frame>,
    cancellation_token: CancellationToken,
) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide)?;

    let result = async {
        loop {
            let frame = frames.borrow_and_update().clone();
            let (columns, rows) = terminal::size()?;
            draw_frame(&mut stdout, &frame, columns, rows)?;

            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                changed = frames.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Ok::<(), io::Error>(())
    }
    .await;

    execute!(stdout, ResetColor, Show, LeaveAlternateScreen)?;
    Ok(result?)
}
