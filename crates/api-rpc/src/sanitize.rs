//! Log line sanitizing for tail responses

use regex::Regex;

// CSI sequences (colors, cursor movement) and OSC sequences (titles, hyperlinks)
const ANSI_PATTERN: &str = r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]";

/// Strips terminal escape sequences and control characters from log lines
#[derive(Debug, Clone)]
pub struct LineSanitizer {
    ansi: Regex,
}

impl LineSanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            ansi: Regex::new(ANSI_PATTERN)?,
        })
    }

    /// Tabs survive; every other control character is dropped
    pub fn sanitize(&self, line: &str) -> String {
        self.ansi
            .replace_all(line, "")
            .chars()
            .filter(|c| *c == '\t' || !c.is_control())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_color_codes() {
        let s = LineSanitizer::new().unwrap();
        assert_eq!(s.sanitize("\x1b[31merror\x1b[0m: boom"), "error: boom");
        assert_eq!(s.sanitize("\x1b[1;32mOK\x1b[m"), "OK");
    }

    #[test]
    fn test_strips_osc_and_controls() {
        let s = LineSanitizer::new().unwrap();
        assert_eq!(s.sanitize("\x1b]0;title\x07ready"), "ready");
        assert_eq!(s.sanitize("a\x00b\x08c\rd"), "abcd");
        assert_eq!(s.sanitize("col1\tcol2"), "col1\tcol2");
    }

    #[test]
    fn test_plain_text_untouched() {
        let s = LineSanitizer::new().unwrap();
        assert_eq!(s.sanitize("listening on :8080 (ünïcode)"), "listening on :8080 (ünïcode)");
    }
}
