//! Roulette stepper: one cursor walking the candidate list, decelerating
//! over the final ticks.
//!
//! Tick order is fixed: the current cursor is reported, the tick counter
//! advances, and only a non-final tick moves the cursor on. The winner is
//! therefore the candidate shown on the final tick, at index
//! `(start + total_ticks - 1) mod len`.

use crate::SelectionError;
use crate::settings::SpinnerSettings;
use core_entropy::Entropy;
use std::time::Duration;

/// Fewest ticks a spin can last.
pub const MIN_TICKS: u32 = 30;
/// `total_ticks` is drawn from `MIN_TICKS..MIN_TICKS + TICK_SPREAD`.
pub const TICK_SPREAD: usize = 20;
/// A loading text is rotated on every Nth tick.
pub const FLAVOR_EVERY: u32 = 5;
/// Longest delay between two ticks, however steep the slowdown.
pub const MAX_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinTick {
    /// 1-based.
    pub tick: u32,
    pub total_ticks: u32,
    /// Cursor shown on this tick.
    pub cursor: usize,
    /// Delay before the following tick, `None` on the final tick.
    pub next_delay: Option<Duration>,
}

impl SpinTick {
    pub fn is_final(&self) -> bool {
        self.next_delay.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Spinner {
    len: usize,
    cursor: usize,
    total_ticks: u32,
    ticks_elapsed: u32,
    interval: Duration,
    slowdown_factor: f64,
    slowdown_ticks: u32,
}

impl Spinner {
    /// Draw the spin length and place the cursor at `start % len`.
    pub fn new(
        len: usize,
        start: usize,
        settings: &SpinnerSettings,
        entropy: &mut dyn Entropy,
    ) -> Result<Self, SelectionError> {
        if len == 0 {
            return Err(SelectionError::invalid("roulette needs at least one candidate"));
        }
        let total_ticks = MIN_TICKS + entropy.uniform_int(TICK_SPREAD) as u32;
        Ok(Self {
            len,
            cursor: start % len,
            total_ticks,
            ticks_elapsed: 0,
            interval: settings.base_delay,
            slowdown_factor: settings.slowdown_factor,
            slowdown_ticks: settings.slowdown_ticks,
        })
    }

    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }

    pub fn ticks_elapsed(&self) -> u32 {
        self.ticks_elapsed
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Delay until the next tick.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        self.ticks_elapsed >= self.total_ticks
    }

    /// Index of the winner once the final tick has run.
    pub fn winner(&self) -> Option<usize> {
        self.is_finished().then_some(self.cursor)
    }

    /// Advance one tick. Calling this after the final tick repeats the final
    /// report without moving anything.
    pub fn tick(&mut self) -> SpinTick {
        if self.is_finished() {
            return SpinTick {
                tick: self.ticks_elapsed,
                total_ticks: self.total_ticks,
                cursor: self.cursor,
                next_delay: None,
            };
        }
        let shown = self.cursor;
        self.ticks_elapsed += 1;
        let next_delay = if self.is_finished() {
            None
        } else {
            if self.ticks_elapsed > self.total_ticks.saturating_sub(self.slowdown_ticks) {
                self.interval = scale(self.interval, self.slowdown_factor);
            }
            self.cursor = (self.cursor + 1) % self.len;
            Some(self.interval)
        };
        SpinTick {
            tick: self.ticks_elapsed,
            total_ticks: self.total_ticks,
            cursor: shown,
            next_delay,
        }
    }
}

/// `interval * factor`, saturating at [`MAX_INTERVAL`] when the product is
/// too large or not a number.
fn scale(interval: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(interval.as_secs_f64() * factor)
        .map_or(MAX_INTERVAL, |scaled| scaled.min(MAX_INTERVAL))
}
