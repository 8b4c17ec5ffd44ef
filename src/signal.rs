use crate::error::{PawSignalError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of one of the fixed temperament signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalId {
    #[default]
    Green,
    Yellow,
    Blue,
    Red,
}

impl SignalId {
    pub const ALL: [SignalId; 4] = [
        SignalId::Green,
        SignalId::Yellow,
        SignalId::Blue,
        SignalId::Red,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalId::Green => "green",
            SignalId::Yellow => "yellow",
            SignalId::Blue => "blue",
            SignalId::Red => "red",
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalId {
    type Err = PawSignalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(SignalId::Green),
            "yellow" => Ok(SignalId::Yellow),
            "blue" => Ok(SignalId::Blue),
            "red" => Ok(SignalId::Red),
            other => Err(PawSignalError::UnknownSignal(other.to_string())),
        }
    }
}

/// 24-bit sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `#RGB` (leading `#` optional)
    pub fn parse_hex(value: &str) -> Result<Self> {
        let digits = value.trim().trim_start_matches('#');
        let invalid = || PawSignalError::InvalidColor(value.to_string());

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        match digits.len() {
            6 => {
                let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
                Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
            }
            3 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&digits[i..i + 1], 16)
                        .map(|v| v * 0x11)
                        .map_err(|_| invalid())
                };
                Ok(Self::new(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Pictogram shown above the label on the signal screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalIcon {
    Smiley,
    Warning,
    ShieldStar,
    NoSymbol,
}

impl SignalIcon {
    /// Single-glyph rendering for text surfaces
    pub fn glyph(&self) -> &'static str {
        match self {
            SignalIcon::Smiley => "☺",
            SignalIcon::Warning => "⚠",
            SignalIcon::ShieldStar => "★",
            SignalIcon::NoSymbol => "⊘",
        }
    }
}

/// A temperament signal definition. Immutable for the life of the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: SignalId,
    pub label: &'static str,
    pub hex: Rgb,
    pub text_color: Rgb,
    pub meaning: &'static str,
    pub guidance: &'static str,
    pub icon: SignalIcon,
}

impl Signal {
    /// Look up a built-in signal
    pub fn get(id: SignalId) -> &'static Signal {
        match id {
            SignalId::Green => &SIGNALS[0],
            SignalId::Yellow => &SIGNALS[1],
            SignalId::Blue => &SIGNALS[2],
            SignalId::Red => &SIGNALS[3],
        }
    }

    /// Look up a built-in signal by its string id
    pub fn by_name(name: &str) -> Result<&'static Signal> {
        Ok(Self::get(name.parse()?))
    }
}

pub static SIGNALS: [Signal; 4] = [
    Signal {
        id: SignalId::Green,
        label: "Friendly",
        hex: Rgb::new(0x2E, 0x7D, 0x32),
        text_color: Rgb::WHITE,
        meaning: "Social and generally okay with people and dogs.",
        guidance: "Ask, then friendly greeting is fine.",
        icon: SignalIcon::Smiley,
    },
    Signal {
        id: SignalId::Yellow,
        label: "Caution / Quirks",
        hex: Rgb::new(0xF9, 0xA8, 0x25),
        text_color: Rgb::new(0x1A, 0x1A, 0x2E),
        meaning: "May react to big dogs, kids, fast movement, or has specific triggers.",
        guidance: "Ask specifics. Slow intro. Avoid surprises.",
        icon: SignalIcon::Warning,
    },
    Signal {
        id: SignalId::Blue,
        label: "Working / In Training",
        hex: Rgb::new(0x15, 0x65, 0xC0),
        text_color: Rgb::WHITE,
        meaning: "Service, police, military, or serious training focus.",
        guidance: "Do not distract. No interaction.",
        icon: SignalIcon::ShieldStar,
    },
    Signal {
        id: SignalId::Red,
        label: "Do Not Approach",
        hex: Rgb::new(0xC6, 0x28, 0x28),
        text_color: Rgb::WHITE,
        meaning: "High arousal, reactive, or unsafe with strangers/dogs.",
        guidance: "Give space. No petting. No greetings.",
        icon: SignalIcon::NoSymbol,
    },
];
