//! Turns selection events into terminal lines.
//!
//! `Screen` folds the event stream into the latest visible state and renders
//! it as a block of lines for in-place redraws. `narrate` is the line-per-event
//! fallback used when stdout is not a terminal.

use core_events::SelectionEvent;
use core_model::{Candidate, EngineKind, Phase, RaceSnapshot, SpinSnapshot};
use std::collections::VecDeque;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const COMMENTARY_LINES: usize = 3;
const TITLE_WIDTH: usize = 18;
const MAX_BAR_WIDTH: usize = 30;
const MIN_BAR_WIDTH: usize = 5;
/// Avatar, spaces, brackets and the percentage around each lane bar.
const LANE_CHROME: usize = 12;

pub const NO_RESULTS: &str = "No spots found in this radius. Try walking a bit further?";

pub struct Screen {
    kind: EngineKind,
    candidates: Vec<Candidate>,
    avatars: Vec<&'static str>,
    phase: Phase,
    countdown: Option<u32>,
    spin: Option<SpinSnapshot>,
    race: Option<RaceSnapshot>,
    commentary: VecDeque<String>,
    width: usize,
}

impl Screen {
    pub fn new(
        kind: EngineKind,
        candidates: Vec<Candidate>,
        avatars: Vec<&'static str>,
        width: u16,
    ) -> Self {
        Self {
            kind,
            candidates,
            avatars,
            phase: Phase::Idle,
            countdown: None,
            spin: None,
            race: None,
            commentary: VecDeque::with_capacity(COMMENTARY_LINES),
            width: usize::from(width),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fold one event into the visible state.
    pub fn apply(&mut self, event: &SelectionEvent) {
        match event {
            SelectionEvent::Phase(phase) => {
                self.phase = *phase;
                if *phase == Phase::Running {
                    self.countdown = None;
                }
            }
            SelectionEvent::Countdown(n) => self.countdown = Some(*n),
            SelectionEvent::Spin(snapshot) => self.spin = Some(snapshot.clone()),
            SelectionEvent::Race(snapshot) => self.race = Some(snapshot.clone()),
            SelectionEvent::Commentary(note) => {
                if self.commentary.len() == COMMENTARY_LINES {
                    self.commentary.pop_front();
                }
                self.commentary.push_back(note.text.clone());
            }
            SelectionEvent::Resolved(_) => self.phase = Phase::Resolved,
            SelectionEvent::Cancelled => self.phase = Phase::Idle,
        }
    }

    /// Every line fits in `width` columns, so each one takes exactly one
    /// terminal row and a redraw covers the whole previous block.
    pub fn lines(&self) -> Vec<String> {
        let mut out = match self.kind {
            EngineKind::Spinner => self.roulette_lines(),
            EngineKind::Race => self.arena_lines(),
        };
        out.push(String::new());
        out.extend(self.commentary.iter().map(|text| format!("  > {text}")));
        out.into_iter().map(|line| fit(&line, self.width)).collect()
    }

    fn roulette_lines(&self) -> Vec<String> {
        let mut out = vec!["🎰 THE ROULETTE".to_string()];
        match &self.spin {
            Some(spin) => {
                let len = self.candidates.len().max(1);
                let prev = (spin.cursor + len - 1) % len;
                let next = (spin.cursor + 1) % len;
                out.push(format!(
                    "   {}   ▶ {} ◀   {}",
                    fit(self.title_at(prev), TITLE_WIDTH),
                    fit(&spin.title, TITLE_WIDTH),
                    fit(self.title_at(next), TITLE_WIDTH),
                ));
                out.push(format!("   tick {}/{}", spin.tick, spin.total_ticks));
            }
            None => out.push("   spinning up...".to_string()),
        }
        out
    }

    fn arena_lines(&self) -> Vec<String> {
        let mut out = vec!["⚔️  BATTLE ARENA".to_string()];
        match (self.phase, self.countdown) {
            (Phase::CountingDown, Some(0)) => out.push("   GO!".to_string()),
            (Phase::CountingDown, Some(n)) => out.push(format!("   ... {n} ...")),
            _ => out.push(String::new()),
        }
        let bar_width = self
            .width
            .saturating_sub(TITLE_WIDTH + LANE_CHROME)
            .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);
        for (idx, candidate) in self.candidates.iter().enumerate() {
            let progress = self
                .race
                .as_ref()
                .and_then(|r| r.progress.get(idx).copied())
                .unwrap_or(0.0);
            let avatar = self.avatars.get(idx).copied().unwrap_or("?");
            out.push(format!(
                "{avatar} {} |{}| {:>3}%",
                pad(&fit(&candidate.title, TITLE_WIDTH), TITLE_WIDTH),
                bar(progress, bar_width),
                progress.round() as u32,
            ));
        }
        out
    }

    fn title_at(&self, idx: usize) -> &str {
        self.candidates
            .get(idx)
            .map(|c| c.title.as_str())
            .unwrap_or_default()
    }
}

/// Single line for an event in non-interactive output.
pub fn narrate(event: &SelectionEvent) -> Option<String> {
    match event {
        SelectionEvent::Countdown(0) => None,
        SelectionEvent::Countdown(n) => Some(format!("{n}...")),
        SelectionEvent::Commentary(note) => Some(note.text.clone()),
        SelectionEvent::Spin(spin) if spin.is_final() => {
            Some(format!("The wheel stops on {}", spin.title))
        }
        SelectionEvent::Cancelled => Some("Selection cancelled.".to_string()),
        _ => None,
    }
}

pub fn candidate_list(candidates: &[Candidate]) -> Vec<String> {
    let mut out = Vec::with_capacity(candidates.len() * 2);
    for (idx, candidate) in candidates.iter().enumerate() {
        match candidate.distance.as_deref() {
            Some(distance) => out.push(format!("{:>2}. {}  ({distance})", idx + 1, candidate.title)),
            None => out.push(format!("{:>2}. {}", idx + 1, candidate.title)),
        }
        if let Some(description) = candidate.description.as_deref() {
            out.push(format!("      {description}"));
        }
    }
    out
}

pub fn winner_card(winner: &Candidate, quote: &str) -> Vec<String> {
    let mut out = vec![
        String::new(),
        "🏆 WINNER 🏆".to_string(),
        format!("   {}", winner.title),
    ];
    for detail in [&winner.description, &winner.distance, &winner.uri]
        .into_iter()
        .flatten()
    {
        out.push(format!("   {detail}"));
    }
    out.push(format!("   \"{quote}\""));
    out
}

fn bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Truncate to `max` display columns, marking the cut with an ellipsis.
fn fit(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(1);
    let mut used = 0;
    let mut cut = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut.push(ch);
    }
    cut.push('…');
    cut
}

/// Left-align in `columns` display columns.
fn pad(text: &str, columns: usize) -> String {
    let fill = columns.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}
