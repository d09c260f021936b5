//! Optional per-tick sound cue. Purely cosmetic: a cue can never influence a
//! session, and a failing cue is ignored.

use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Capability invoked once per roulette tick.
pub trait TickCue: Send + Sync {
    fn tick(&self);
}

/// Process-wide cue writing the terminal bell. Created on first use and kept
/// for the rest of the process so sessions never tear it down mid-spin.
pub struct BellCue {
    out: Mutex<io::Stdout>,
    plays: AtomicU64,
}

static SHARED: Lazy<BellCue> = Lazy::new(|| {
    tracing::debug!(target: "selection.cue", "bell_cue_created");
    BellCue {
        out: Mutex::new(io::stdout()),
        plays: AtomicU64::new(0),
    }
});

/// The lazily-created shared cue.
pub fn shared() -> &'static BellCue {
    &SHARED
}

impl BellCue {
    pub fn plays(&self) -> u64 {
        self.plays.load(Ordering::Relaxed)
    }
}

impl TickCue for BellCue {
    fn tick(&self) {
        self.plays.fetch_add(1, Ordering::Relaxed);
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.write_all(b"\x07").and_then(|_| out.flush()) {
            tracing::trace!(target: "selection.cue", ?e, "bell_write_failed");
        }
    }
}

impl TickCue for &'static BellCue {
    fn tick(&self) {
        (**self).tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_is_a_single_instance() {
        let a = shared() as *const BellCue;
        let b = shared() as *const BellCue;
        assert_eq!(a, b);
    }
}
