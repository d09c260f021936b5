//! One selection session: engine state, event emission and tick scheduling.
//!
//! Every tick runs as a scheduler task that locks the session, re-checks the
//! cancel token, mutates the engine, emits events and finally schedules its
//! successor after releasing the lock. A session therefore never has two ticks
//! in flight, and a tick that fires after `cancel` returns touches nothing.

use crate::cue::TickCue;
use crate::flavor;
use crate::race::{IncidentKind, Race};
use crate::settings::{RaceSettings, SpinnerSettings};
use crate::spinner::{FLAVOR_EVERY, Spinner};
use core_entropy::Entropy;
use core_events::{
    EventSink, SESSIONS_CANCELLED, SESSIONS_RESOLVED, STALE_TICKS_SKIPPED, SelectionEvent,
    TICKS_EXECUTED,
};
use core_model::{Candidate, Commentary, CommentaryKind, EngineKind, Phase, SpinSnapshot};
use core_scheduler::{CancelToken, Scheduler};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Outcome draws and cosmetic draws come from separate streams so that
/// commentary can never shift an outcome.
pub struct EntropyStreams {
    pub outcome: Box<dyn Entropy>,
    pub flavor: Box<dyn Entropy>,
}

impl EntropyStreams {
    pub fn new(outcome: Box<dyn Entropy>, flavor: Box<dyn Entropy>) -> Self {
        Self { outcome, flavor }
    }
}

pub(crate) type SharedEntropy = Arc<Mutex<EntropyStreams>>;

pub(crate) enum Engine {
    Spinner {
        spinner: Spinner,
        settings: SpinnerSettings,
    },
    Race {
        race: Race,
        settings: RaceSettings,
    },
}

/// Next unit of work for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    SpinTick,
    Countdown(u32),
    RaceFrame,
    Reveal(usize),
}

impl Step {
    fn as_str(&self) -> &'static str {
        match self {
            Step::SpinTick => "spin_tick",
            Step::Countdown(_) => "countdown",
            Step::RaceFrame => "race_frame",
            Step::Reveal(_) => "reveal",
        }
    }
}

pub(crate) struct SessionCore {
    pub(crate) id: u64,
    pub(crate) kind: EngineKind,
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) phase: Phase,
    pub(crate) winner: Option<Candidate>,
    engine: Engine,
    sink: Option<EventSink>,
    winner_tx: Option<oneshot::Sender<Candidate>>,
    entropy: SharedEntropy,
    cue: Option<Arc<dyn TickCue>>,
}

pub(crate) struct SessionShared {
    pub(crate) token: CancelToken,
    scheduler: Arc<dyn Scheduler>,
    core: Mutex<SessionCore>,
}

fn lock_entropy(entropy: &SharedEntropy) -> MutexGuard<'_, EntropyStreams> {
    entropy.lock().unwrap_or_else(|e| e.into_inner())
}

impl SessionCore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        kind: EngineKind,
        candidates: Vec<Candidate>,
        engine: Engine,
        sink: EventSink,
        winner_tx: oneshot::Sender<Candidate>,
        entropy: SharedEntropy,
        cue: Option<Arc<dyn TickCue>>,
    ) -> Self {
        Self {
            id,
            kind,
            candidates,
            phase: Phase::Idle,
            winner: None,
            engine,
            sink: Some(sink),
            winner_tx: Some(winner_tx),
            entropy,
            cue,
        }
    }

    fn emit(&self, event: SelectionEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    fn note(&self, commentary: Commentary) {
        self.emit(SelectionEvent::Commentary(commentary));
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(target: "selection.session", session = self.id, from = self.phase.as_str(), to = phase.as_str(), "phase_changed");
            self.phase = phase;
            self.emit(SelectionEvent::Phase(phase));
        }
    }

    /// Enter the first running phase and return the first scheduled step.
    pub(crate) fn begin(&mut self) -> Option<(Duration, Step)> {
        match &self.engine {
            Engine::Spinner { settings, .. } => {
                let delay = settings.base_delay;
                self.set_phase(Phase::Running);
                Some((delay, Step::SpinTick))
            }
            Engine::Race { settings, .. } => {
                let from = settings.countdown_from;
                self.set_phase(Phase::CountingDown);
                self.note(Commentary::new(CommentaryKind::Intro, flavor::INTRO));
                self.countdown(from)
            }
        }
    }

    fn step(&mut self, step: Step) -> Option<(Duration, Step)> {
        match step {
            Step::SpinTick => self.spin_tick(),
            Step::Countdown(n) => self.countdown(n),
            Step::RaceFrame => self.race_frame(),
            Step::Reveal(idx) => {
                self.resolve(idx);
                None
            }
        }
    }

    fn spin_tick(&mut self) -> Option<(Duration, Step)> {
        let Engine::Spinner { spinner, settings } = &mut self.engine else {
            return None;
        };
        let tick = spinner.tick();
        let reveal_delay = settings.reveal_delay;
        let interval = tick.next_delay.unwrap_or(reveal_delay);
        let title = self.candidates[tick.cursor].title.clone();
        self.emit(SelectionEvent::Spin(SpinSnapshot {
            tick: tick.tick,
            total_ticks: tick.total_ticks,
            cursor: tick.cursor,
            title,
            interval,
        }));
        if let Some(cue) = &self.cue {
            cue.tick();
        }
        if tick.tick % FLAVOR_EVERY == 0 {
            let text = flavor::loading_text(lock_entropy(&self.entropy).flavor.as_mut());
            self.note(Commentary::new(CommentaryKind::Flavor, text));
        }
        match tick.next_delay {
            Some(delay) => Some((delay, Step::SpinTick)),
            None => {
                info!(target: "selection.spinner", session = self.id, total_ticks = tick.total_ticks, cursor = tick.cursor, "spin_finished");
                Some((reveal_delay, Step::Reveal(tick.cursor)))
            }
        }
    }

    fn countdown(&mut self, n: u32) -> Option<(Duration, Step)> {
        let Engine::Race { settings, .. } = &self.engine else {
            return None;
        };
        let step = settings.countdown_step;
        let frame = settings.frame_interval;
        self.emit(SelectionEvent::Countdown(n));
        if n > 0 {
            return Some((step, Step::Countdown(n - 1)));
        }
        self.set_phase(Phase::Running);
        self.note(Commentary::new(CommentaryKind::Go, flavor::GO));
        Some((frame, Step::RaceFrame))
    }

    fn race_frame(&mut self) -> Option<(Duration, Step)> {
        let Engine::Race { race, settings } = &mut self.engine else {
            return None;
        };
        let mut streams = lock_entropy(&self.entropy);
        let outcome = race.frame(streams.outcome.as_mut());
        let snapshot = race.snapshot();
        let frame_interval = settings.frame_interval;
        let resolution_delay = settings.resolution_delay;
        let mut notes = Vec::with_capacity(outcome.incidents.len());
        for incident in &outcome.incidents {
            let title = &self.candidates[incident.racer].title;
            let (kind, text) = match incident.kind {
                IncidentKind::Boost => (CommentaryKind::Boost, flavor::boost_line(title)),
                IncidentKind::Setback => (
                    CommentaryKind::Setback,
                    flavor::setback_line(title, streams.flavor.as_mut()),
                ),
            };
            notes.push(Commentary::for_racer(kind, incident.racer, text));
        }
        drop(streams);
        for note in notes {
            self.note(note);
        }
        self.emit(SelectionEvent::Race(snapshot));
        match outcome.winner {
            Some(idx) => {
                let title = &self.candidates[idx].title;
                info!(target: "selection.race", session = self.id, frame = outcome.frame, winner = idx, title = %title, "race_finished");
                let line = flavor::winner_line(title);
                self.note(Commentary::for_racer(CommentaryKind::Winner, idx, line));
                Some((resolution_delay, Step::Reveal(idx)))
            }
            None => Some((frame_interval, Step::RaceFrame)),
        }
    }

    fn resolve(&mut self, idx: usize) {
        let candidate = self.candidates[idx].clone();
        self.winner = Some(candidate.clone());
        self.set_phase(Phase::Resolved);
        self.emit(SelectionEvent::Resolved(candidate.clone()));
        if let Some(tx) = self.winner_tx.take()
            && tx.send(candidate.clone()).is_err()
        {
            debug!(target: "selection.session", session = self.id, "winner_receiver_dropped");
        }
        self.sink = None;
        SESSIONS_RESOLVED.fetch_add(1, Ordering::Relaxed);
        info!(target: "selection.session", session = self.id, engine = self.kind.as_str(), winner = %candidate.title, "session_resolved");
    }

    /// Discard the session. Returns `false` if it was already resolved or
    /// cancelled.
    fn cancel(&mut self) -> bool {
        if self.sink.is_none() {
            return false;
        }
        self.set_phase(Phase::Idle);
        self.emit(SelectionEvent::Cancelled);
        self.sink = None;
        self.winner_tx = None;
        SESSIONS_CANCELLED.fetch_add(1, Ordering::Relaxed);
        info!(target: "selection.session", session = self.id, engine = self.kind.as_str(), "session_cancelled");
        true
    }
}

impl SessionShared {
    pub(crate) fn new(core: SessionCore, scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new(Self {
            token: CancelToken::new(),
            scheduler,
            core: Mutex::new(core),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Cancel under the session lock so no tick can interleave. Idempotent;
    /// a no-op once the session has resolved.
    pub(crate) fn cancel(&self) -> bool {
        let mut core = self.lock();
        if core.phase == Phase::Resolved {
            return false;
        }
        self.token.cancel();
        core.cancel()
    }

    /// Start ticking. Must be called once, right after construction.
    pub(crate) fn launch(self: &Arc<Self>) {
        let next = self.lock().begin();
        if let Some((delay, step)) = next {
            self.schedule(delay, step);
        }
    }

    fn schedule(self: &Arc<Self>, delay: Duration, step: Step) {
        let shared = Arc::clone(self);
        self.scheduler.schedule_after(
            delay,
            &self.token,
            Box::new(move || shared.run(step)),
        );
    }

    fn run(self: Arc<Self>, step: Step) {
        let next = {
            let mut core = self.lock();
            if self.token.is_cancelled() || !core.phase.is_active() {
                STALE_TICKS_SKIPPED.fetch_add(1, Ordering::Relaxed);
                debug!(target: "selection.session", session = core.id, step = step.as_str(), "stale_tick_skipped");
                return;
            }
            TICKS_EXECUTED.fetch_add(1, Ordering::Relaxed);
            core.step(step)
        };
        if let Some((delay, step)) = next {
            self.schedule(delay, step);
        }
    }
}
