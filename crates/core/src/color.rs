//! Named-color and hex-color table, mapping to ANSI SGR escapes for channel labels.

use crate::error::ParseError;

/// A resolved channel color: either one of the 4-bit named colors or a 24-bit
/// hex triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Named(NamedColor),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl NamedColor {
    fn sgr_code(self) -> u8 {
        use NamedColor::*;
        match self {
            Black => 30,
            Red => 31,
            Green => 32,
            Yellow => 33,
            Blue => 34,
            Magenta => 35,
            Cyan => 36,
            White => 37,
            BrightBlack => 90,
            BrightRed => 91,
            BrightGreen => 92,
            BrightYellow => 93,
            BrightBlue => 94,
            BrightMagenta => 95,
            BrightCyan => 96,
            BrightWhite => 97,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        use NamedColor::*;
        Some(match name {
            "black" => Black,
            "red" => Red,
            "green" => Green,
            "yellow" => Yellow,
            "blue" => Blue,
            "magenta" => Magenta,
            "cyan" => Cyan,
            "white" => White,
            "bright_black" => BrightBlack,
            "bright_red" => BrightRed,
            "bright_green" => BrightGreen,
            "bright_yellow" => BrightYellow,
            "bright_blue" => BrightBlue,
            "bright_magenta" => BrightMagenta,
            "bright_cyan" => BrightCyan,
            "bright_white" => BrightWhite,
            _ => return None,
        })
    }
}

impl Color {
    /// Parse a `#COLOR` value: either a named color or a 6-hex-digit RGB triple.
    pub fn parse(spec: &str) -> Result<Self, ParseError> {
        if let Some(named) = NamedColor::from_name(spec) {
            return Ok(Color::Named(named));
        }
        if spec.len() == 6 && spec.bytes().all(|b| b.is_ascii_hexdigit()) {
            let r = u8::from_str_radix(&spec[0..2], 16).unwrap();
            let g = u8::from_str_radix(&spec[2..4], 16).unwrap();
            let b = u8::from_str_radix(&spec[4..6], 16).unwrap();
            return Ok(Color::Rgb(r, g, b));
        }
        Err(ParseError::UnknownColor(spec.to_string()))
    }

    /// Render as an ANSI SGR escape sequence, terminated (no separate reset).
    pub fn sgr(self) -> String {
        match self {
            Color::Named(n) => format!("\x1b[{}m", n.sgr_code()),
            Color::Rgb(r, g, b) => format!("\x1b[38;2;{r};{g};{b}m"),
        }
    }
}

pub const RESET: &str = "\x1b[0m";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_color_parses() {
        assert_eq!(Color::parse("green").unwrap(), Color::Named(NamedColor::Green));
        assert_eq!(
            Color::parse("bright_red").unwrap(),
            Color::Named(NamedColor::BrightRed)
        );
    }

    #[test]
    fn hex_color_parses() {
        assert_eq!(Color::parse("ff00aa").unwrap(), Color::Rgb(0xff, 0x00, 0xaa));
    }

    #[test]
    fn unknown_color_rejected() {
        assert!(Color::parse("not-a-color").is_err());
        assert!(Color::parse("ff00").is_err());
        assert!(Color::parse("gggggg").is_err());
    }

    #[test]
    fn sgr_rendering() {
        assert_eq!(Color::Named(NamedColor::Cyan).sgr(), "\x1b[36m");
        assert_eq!(Color::Rgb(1, 2, 3).sgr(), "\x1b[38;2;1;2;3m");
    }
}
