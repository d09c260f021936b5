//! Terminal capability probing.
//!
//! Detection runs once at startup. When stdout is not a terminal (piped into
//! a file, captured by CI) the binary skips in-place redraws and prints one
//! line per event instead.

use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TerminalCapabilities {
    /// Cursor movement and line clearing are honoured.
    pub supports_redraw: bool,
    pub width: u16,
}

pub const FALLBACK_WIDTH: u16 = 80;

impl TerminalCapabilities {
    pub fn detect() -> Self {
        let supports_redraw = std::io::stdout().is_terminal();
        let width = crossterm::terminal::size()
            .map(|(cols, _)| cols)
            .ok()
            .filter(|cols| *cols > 0)
            .unwrap_or(FALLBACK_WIDTH);
        Self::new(supports_redraw, width)
    }

    pub fn new(supports_redraw: bool, width: u16) -> Self {
        Self {
            supports_redraw,
            width: width.max(1),
        }
    }

    /// Capabilities of a plain byte sink.
    pub fn plain() -> Self {
        Self::new(false, FALLBACK_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_never_redraws() {
        let caps = TerminalCapabilities::plain();
        assert!(!caps.supports_redraw);
        assert_eq!(caps.width, FALLBACK_WIDTH);
    }

    #[test]
    fn zero_width_is_raised() {
        assert_eq!(TerminalCapabilities::new(true, 0).width, 1);
    }
}
