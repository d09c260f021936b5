//! Selection data model shared by the engines, the search collaborator and the
//! terminal front end.
//!
//! A *session* runs one engine over a fixed, ordered candidate list. The types
//! here describe what flows out of a session (snapshots, commentary, phase
//! changes) and what flows in (candidates). They carry no behavior beyond
//! small invariant-preserving constructors.
//!
//! Core invariants:
//! * A `Candidate` is identified by its `title` alone. Two candidates with the
//!   same title compare equal and hash identically even if their display
//!   extras (`uri`, `description`, `distance`) differ.
//! * Titles reaching an engine are plain `String`s. Malformed upstream values
//!   are coerced with [`safe_title`] at the collaborator boundary, never inside
//!   an engine.
//! * `RaceSnapshot::progress` is index-aligned with the candidate list the
//!   session was started with and every value lies in `[0, 100]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

mod title;
pub use title::{FALLBACK_TITLE, safe_title};

/// Entity participating in a selection round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Short "vibe check" blurb shown on the winner card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: None,
            description: None,
            distance: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_distance(mut self, distance: impl Into<String>) -> Self {
        self.distance = Some(distance.into());
        self
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
    }
}

impl Eq for Candidate {}

impl Hash for Candidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.title.hash(state);
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Build a candidate list from bare titles (offline mode, tests).
pub fn candidates_from_titles<I, S>(titles: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    titles.into_iter().map(Candidate::new).collect()
}

/// Which selection mini-game drives a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Slot-machine roulette: one decelerating cursor.
    Spinner,
    /// Battle arena: independent racers toward a finish line.
    Race,
}

impl EngineKind {
    /// Smallest candidate list the engine accepts.
    pub const fn min_candidates(self) -> usize {
        match self {
            EngineKind::Spinner => 1,
            EngineKind::Race => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Spinner => "spinner",
            EngineKind::Race => "race",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle phase.
///
/// `Idle -> CountingDown -> Running -> Resolved`, with `CountingDown` only used
/// by the race. A cancelled session is discarded and its owner returns to
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    CountingDown,
    Running,
    Resolved,
}

impl Phase {
    /// True while ticks may still be scheduled for the session.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::CountingDown | Phase::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::CountingDown => "counting_down",
            Phase::Running => "running",
            Phase::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One roulette tick as seen by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinSnapshot {
    /// 1-based tick number.
    pub tick: u32,
    pub total_ticks: u32,
    pub cursor: usize,
    pub title: String,
    /// Delay before the next tick (grows during the slowdown).
    pub interval: Duration,
}

impl SpinSnapshot {
    pub fn is_final(&self) -> bool {
        self.tick == self.total_ticks
    }
}

/// One race frame as seen by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceSnapshot {
    /// 1-based frame number.
    pub frame: u64,
    pub progress: Vec<f64>,
}

impl RaceSnapshot {
    /// Index of the racer furthest ahead (lowest index on ties).
    pub fn leader(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, value) in self.progress.iter().copied().enumerate() {
            match best {
                Some((_, top)) if value <= top => {}
                _ => best = Some((idx, value)),
            }
        }
        best.map(|(idx, _)| idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentaryKind {
    Intro,
    Go,
    Boost,
    Setback,
    /// Rotating loading text shown while the roulette spins.
    Flavor,
    Winner,
}

/// Presentational text emitted alongside snapshots. Never authoritative over
/// the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commentary {
    pub kind: CommentaryKind,
    pub text: String,
    pub racer: Option<usize>,
}

impl Commentary {
    pub fn new(kind: CommentaryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            racer: None,
        }
    }

    pub fn for_racer(kind: CommentaryKind, racer: usize, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            racer: Some(racer),
        }
    }
}
