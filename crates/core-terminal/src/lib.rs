//! Terminal backend abstraction and crossterm implementation.
//!
//! The animation is drawn inline below the shell prompt: `draw` repaints a
//! block of lines in place and `commit` leaves the current block on screen so
//! later output lands underneath it.

use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveToPreviousLine, Show},
    execute, queue,
    style::Print,
    terminal::{Clear, ClearType, SetTitle},
};
use std::io::{Stdout, Write, stdout};
use tracing::trace;

pub mod capabilities;
pub use capabilities::TerminalCapabilities;

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    /// Replace the previously drawn block with `lines`.
    fn draw(&mut self, lines: &[String]) -> Result<()>;
    /// Keep the current block; the next `draw` starts below it.
    fn commit(&mut self);
}

pub struct CrosstermBackend<W: Write = Stdout> {
    out: W,
    entered: bool,
    drawn_rows: u16,
}

/// RAII guard ensuring the cursor comes back even if the caller early-returns or panics.
pub struct TerminalGuard<'a, W: Write = Stdout> {
    backend: &'a mut CrosstermBackend<W>,
    active: bool,
}

impl Default for CrosstermBackend<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend<Stdout> {
    pub fn new() -> Self {
        Self::with_writer(stdout())
    }
}

impl<W: Write> CrosstermBackend<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            entered: false,
            drawn_rows: 0,
        }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_, W>> {
        self.enter()?;
        Ok(TerminalGuard {
            backend: self,
            active: true,
        })
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    pub fn writer(&self) -> &W {
        &self.out
    }
}

impl<W: Write> TerminalBackend for CrosstermBackend<W> {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            execute!(self.out, Hide)?;
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(self.out, Show)?;
            self.entered = false;
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(self.out, SetTitle(title))?;
        Ok(())
    }

    fn draw(&mut self, lines: &[String]) -> Result<()> {
        if self.drawn_rows > 0 {
            queue!(self.out, MoveToPreviousLine(self.drawn_rows))?;
        }
        for line in lines {
            queue!(
                self.out,
                Clear(ClearType::CurrentLine),
                Print(line),
                Print("\r\n")
            )?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        self.out.flush()?;
        self.drawn_rows = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        trace!(target: "terminal", rows = self.drawn_rows, "draw");
        Ok(())
    }

    fn commit(&mut self) {
        self.drawn_rows = 0;
    }
}

impl<W: Write> Drop for CrosstermBackend<W> {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl<'a, W: Write> TerminalGuard<'a, W> {
    pub fn backend(&mut self) -> &mut CrosstermBackend<W> {
        self.backend
    }
}

impl<'a, W: Write> Drop for TerminalGuard<'a, W> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HIDE: &str = "\x1b[?25l";
    const SHOW: &str = "\x1b[?25h";

    fn output(backend: &CrosstermBackend<Vec<u8>>) -> String {
        String::from_utf8_lossy(backend.writer()).into_owned()
    }

    #[test]
    fn enter_and_leave_are_idempotent() {
        let mut backend = CrosstermBackend::with_writer(Vec::new());
        backend.enter().unwrap();
        backend.enter().unwrap();
        assert!(backend.is_entered());
        backend.leave().unwrap();
        backend.leave().unwrap();
        let out = output(&backend);
        assert_eq!(out.matches(HIDE).count(), 1);
        assert_eq!(out.matches(SHOW).count(), 1);
    }

    #[test]
    fn guard_restores_cursor() {
        let mut backend = CrosstermBackend::with_writer(Vec::new());
        {
            let _guard = backend.enter_guard().unwrap();
        }
        assert!(!backend.is_entered());
        assert!(output(&backend).ends_with(SHOW));
    }

    #[test]
    fn redraw_moves_back_over_previous_block() {
        let mut backend = CrosstermBackend::with_writer(Vec::new());
        backend
            .draw(&["one".to_string(), "two".to_string()])
            .unwrap();
        let first = output(&backend);
        assert!(!first.contains("\x1b[2F"));
        assert!(first.contains("one\r\n"));

        backend.draw(&["three".to_string()]).unwrap();
        assert!(output(&backend).contains("\x1b[2F"));

        backend.commit();
        let before = output(&backend).len();
        backend.draw(&["four".to_string()]).unwrap();
        let tail = output(&backend)[before..].to_string();
        assert!(!tail.contains("\x1b[1F"));
        assert!(tail.contains("four"));
    }
}
