//! Terminal escape sequences used when labelling output.
//!
//! Only the few sequences the multiplexer emits itself live here; anything
//! richer belongs to a terminal library.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::UnicodeWidthStr;

pub const ESC: &str = "\x1b";
pub const RESET: &str = "\x1b[0m";
pub const FG_RED: &str = "\x1b[31m";

/// CSI sequences (colors, cursor movement) and OSC sequences terminated by BEL or ST.
static ESCAPE_SEQUENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("Valid regex pattern")
});

/// Foreground color escape for a 24-bit RGB value.
pub fn fg_rgb(r: u8, g: u8, b: u8) -> String {
    format!("{ESC}[38;2;{r};{g};{b}m")
}

/// Remove escape sequences, leaving only printable text.
pub fn strip_sequences(text: &str) -> String {
    ESCAPE_SEQUENCE.replace_all(text, "").into_owned()
}

/// Number of terminal columns `text` occupies once escape sequences are removed.
pub fn visible_width(text: &str) -> usize {
    strip_sequences(text).width()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fg_rgb_sequence() {
        assert_eq!(fg_rgb(50, 100, 254), "\x1b[38;2;50;100;254m");
    }

    #[test]
    fn test_strip_sequences_removes_colors() {
        let label = format!("{}build:42{}", fg_rgb(1, 2, 3), RESET);
        assert_eq!(strip_sequences(&label), "build:42");
        assert_eq!(strip_sequences(&format!("{FG_RED} | {RESET}")), " | ");
    }

    #[test]
    fn test_strip_sequences_removes_osc_title() {
        assert_eq!(strip_sequences("\x1b]0;title\x07text"), "text");
    }

    #[test]
    fn test_visible_width_ignores_escapes() {
        let label = format!("{}npm:7{}", fg_rgb(200, 60, 60), RESET);
        assert_eq!(visible_width(&label), 5);
        assert_eq!(visible_width(""), 0);
    }

    #[test]
    fn test_visible_width_counts_wide_characters() {
        assert_eq!(visible_width("日本"), 4);
    }
}
