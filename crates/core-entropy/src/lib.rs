//! Entropy sources for the selection engines.
//!
//! Engines never reach for ambient randomness. Every draw goes through the
//! [`Entropy`] trait so production code can use an OS-seeded generator while
//! tests pin the exact sequence of draws (`ScriptedEntropy`) or a reproducible
//! stream (`SeededEntropy`).
//!
//! Contract:
//! * `uniform()` returns a value in `[0, 1)`.
//! * `uniform_int(n)` returns a value in `[0, n)`; `n == 0` yields 0 and does
//!   not consume a draw.
//! * Drawing has no side effects beyond advancing the source's own state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Uniform random draws consumed by the engines.
pub trait Entropy: Send {
    /// Uniform float in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Uniform integer in `[0, n)`.
    ///
    /// The default maps one `uniform()` draw onto the range, so scripted
    /// sources stay easy to reason about: a draw of `u` picks `floor(u * n)`.
    fn uniform_int(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let pick = (self.uniform() * n as f64).floor() as usize;
        pick.min(n - 1)
    }
}

impl<E: Entropy + ?Sized> Entropy for Box<E> {
    fn uniform(&mut self) -> f64 {
        (**self).uniform()
    }
    fn uniform_int(&mut self, n: usize) -> usize {
        (**self).uniform_int(n)
    }
}

/// OS-seeded generator used in production.
pub struct SystemEntropy {
    rng: StdRng,
}

impl SystemEntropy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for SystemEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl Entropy for SystemEntropy {
    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
    fn uniform_int(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.random_range(0..n)
    }
}

/// Reproducible generator seeded from a `u64` (`--seed`).
pub struct SeededEntropy {
    seed: u64,
    rng: StdRng,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        tracing::debug!(target: "entropy", seed, "seeded_entropy_created");
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent stream (used for cosmetic draws) so flavor picks
    /// never shift the outcome stream.
    pub fn derive(&self, salt: u64) -> Self {
        Self::new(self.seed ^ salt.rotate_left(17) ^ 0x9E37_79B9_7F4A_7C15)
    }
}

impl Entropy for SeededEntropy {
    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
    fn uniform_int(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.random_range(0..n)
    }
}

/// Largest `f64` strictly below 1.0.
pub const JUST_BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

/// Replays a fixed sequence of draws, cycling when exhausted.
///
/// Values are clamped into `[0, 1)`; `1.0` becomes [`JUST_BELOW_ONE`]. An empty
/// script always draws `0.0`.
#[derive(Debug, Clone)]
pub struct ScriptedEntropy {
    script: Vec<f64>,
    queue: VecDeque<f64>,
    draws: u64,
}

impl ScriptedEntropy {
    pub fn cycle<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let script: Vec<f64> = values.into_iter().map(clamp_unit).collect();
        Self {
            queue: script.iter().copied().collect(),
            script,
            draws: 0,
        }
    }

    /// A script that always returns the same value.
    pub fn constant(value: f64) -> Self {
        Self::cycle([value])
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else if value >= 1.0 {
        JUST_BELOW_ONE
    } else {
        value
    }
}

impl Entropy for ScriptedEntropy {
    fn uniform(&mut self) -> f64 {
        self.draws += 1;
        if self.queue.is_empty() {
            self.queue.extend(self.script.iter().copied());
        }
        self.queue.pop_front().unwrap_or(0.0)
    }
}
