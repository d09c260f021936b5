//! Selection lifecycle: validate input, own the current session, hand the
//! caller a handle for events, the winner and cancellation.

use crate::cue::TickCue;
use crate::error::SelectionError;
use crate::flavor;
use crate::race::Race;
use crate::session::{Engine, EntropyStreams, SessionCore, SessionShared, SharedEntropy};
use crate::settings::{RaceSettings, SpinnerSettings};
use crate::spinner::Spinner;
use core_entropy::{Entropy, SystemEntropy};
use core_events::{SESSIONS_STARTED, SelectionEvent, selection_channel};
use core_model::{Candidate, EngineKind, Phase};
use core_scheduler::Scheduler;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Owns at most one live session at a time.
pub struct SelectionController {
    scheduler: Arc<dyn Scheduler>,
    spinner: SpinnerSettings,
    race: RaceSettings,
    entropy: SharedEntropy,
    cue: Option<Arc<dyn TickCue>>,
    current: Option<Arc<SessionShared>>,
    next_id: u64,
}

impl SelectionController {
    /// Controller with OS-seeded entropy and default timings.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_entropy(
            scheduler,
            Box::new(SystemEntropy::new()),
            Box::new(SystemEntropy::new()),
        )
    }

    /// Controller drawing outcomes from `outcome` and cosmetic picks from
    /// `flavor`.
    pub fn with_entropy(
        scheduler: Arc<dyn Scheduler>,
        outcome: Box<dyn Entropy>,
        flavor: Box<dyn Entropy>,
    ) -> Self {
        Self {
            scheduler,
            spinner: SpinnerSettings::default(),
            race: RaceSettings::default(),
            entropy: Arc::new(Mutex::new(EntropyStreams::new(outcome, flavor))),
            cue: None,
            current: None,
            next_id: 1,
        }
    }

    pub fn with_spinner_settings(mut self, settings: SpinnerSettings) -> Self {
        self.spinner = settings;
        self
    }

    pub fn with_race_settings(mut self, settings: RaceSettings) -> Self {
        self.race = settings;
        self
    }

    pub fn with_tick_cue(mut self, cue: Arc<dyn TickCue>) -> Self {
        self.cue = Some(cue);
        self
    }

    /// Current lifecycle phase. A cancelled or reset session reads as `Idle`.
    pub fn phase(&self) -> Phase {
        self.current
            .as_ref()
            .map(|s| s.phase())
            .unwrap_or_default()
    }

    /// Start a session with the roulette cursor at 0.
    pub fn start(
        &mut self,
        kind: EngineKind,
        candidates: Vec<Candidate>,
    ) -> Result<SelectionHandle, SelectionError> {
        self.start_at(kind, candidates, 0)
    }

    /// Start a session. `start_index` places the roulette cursor (reduced
    /// modulo the list length) and is ignored by the race.
    pub fn start_at(
        &mut self,
        kind: EngineKind,
        candidates: Vec<Candidate>,
        start_index: usize,
    ) -> Result<SelectionHandle, SelectionError> {
        if self.phase().is_active() {
            warn!(target: "selection.session", engine = kind.as_str(), "start_rejected_already_running");
            return Err(SelectionError::AlreadyRunning);
        }
        validate(kind, &candidates)?;
        // A resolved session is implicitly reset.
        self.current = None;

        let engine = match kind {
            EngineKind::Spinner => {
                let mut streams = self.entropy.lock().unwrap_or_else(|e| e.into_inner());
                let spinner = Spinner::new(
                    candidates.len(),
                    start_index,
                    &self.spinner,
                    streams.outcome.as_mut(),
                )?;
                Engine::Spinner {
                    spinner,
                    settings: self.spinner.clone(),
                }
            }
            EngineKind::Race => Engine::Race {
                race: Race::new(candidates.len()),
                settings: self.race.clone(),
            },
        };
        let avatars = match kind {
            EngineKind::Race => {
                let mut streams = self.entropy.lock().unwrap_or_else(|e| e.into_inner());
                flavor::avatars(candidates.len(), streams.flavor.as_mut())
            }
            EngineKind::Spinner => Vec::new(),
        };

        let id = self.next_id;
        self.next_id += 1;
        let (sink, events) = selection_channel();
        let (winner_tx, winner_rx) = oneshot::channel();
        let core = SessionCore::new(
            id,
            kind,
            candidates.clone(),
            engine,
            sink,
            winner_tx,
            Arc::clone(&self.entropy),
            self.cue.clone(),
        );
        let shared = SessionShared::new(core, Arc::clone(&self.scheduler));
        SESSIONS_STARTED.fetch_add(1, Ordering::Relaxed);
        info!(target: "selection.session", session = id, engine = kind.as_str(), candidates = candidates.len(), scheduler = self.scheduler.name(), "session_started");
        shared.launch();
        self.current = Some(Arc::clone(&shared));

        Ok(SelectionHandle {
            id,
            kind,
            candidates,
            avatars,
            events,
            winner_rx: Some(winner_rx),
            resolved: None,
            shared,
        })
    }

    /// Cancel the current session, if any. Idempotent; a no-op after the
    /// session resolved. Returns `true` if this call stopped a session.
    pub fn cancel(&mut self) -> bool {
        let Some(shared) = &self.current else {
            return false;
        };
        if shared.phase() == Phase::Resolved {
            return false;
        }
        let stopped = shared.cancel();
        self.current = None;
        stopped
    }

    /// Return to `Idle`. A live session is cancelled first.
    pub fn reset(&mut self) {
        if let Some(shared) = self.current.take() {
            shared.cancel();
        }
    }
}

fn validate(kind: EngineKind, candidates: &[Candidate]) -> Result<(), SelectionError> {
    let min = kind.min_candidates();
    if candidates.len() < min {
        return Err(SelectionError::invalid(format!(
            "{} needs at least {min} candidate(s), got {}",
            kind.as_str(),
            candidates.len()
        )));
    }
    let mut seen = HashSet::with_capacity(candidates.len());
    for candidate in candidates {
        if !seen.insert(candidate.title.as_str()) {
            return Err(SelectionError::invalid(format!(
                "duplicate candidate title: {}",
                candidate.title
            )));
        }
    }
    Ok(())
}

/// Caller side of one session.
pub struct SelectionHandle {
    id: u64,
    kind: EngineKind,
    candidates: Vec<Candidate>,
    avatars: Vec<&'static str>,
    events: mpsc::Receiver<SelectionEvent>,
    winner_rx: Option<oneshot::Receiver<Candidate>>,
    resolved: Option<Candidate>,
    shared: Arc<SessionShared>,
}

impl SelectionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Race avatars, index-aligned with the candidates. Empty for the roulette.
    pub fn avatars(&self) -> &[&'static str] {
        &self.avatars
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    /// Next progress event. Returns `None` once the session has ended and all
    /// buffered events were consumed.
    pub async fn next_event(&mut self) -> Option<SelectionEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<SelectionEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the winner. Resolves exactly once per session; later calls
    /// return the same candidate. A cancelled session yields
    /// [`SelectionError::Cancelled`].
    pub async fn winner(&mut self) -> Result<Candidate, SelectionError> {
        if let Some(winner) = &self.resolved {
            return Ok(winner.clone());
        }
        let rx = self.winner_rx.take().ok_or(SelectionError::Cancelled)?;
        let winner = rx.await.map_err(|_| SelectionError::Cancelled)?;
        self.resolved = Some(winner.clone());
        Ok(winner)
    }

    /// Non-blocking variant of [`winner`](Self::winner): `None` while the
    /// session is still undecided.
    pub fn try_winner(&mut self) -> Option<Result<Candidate, SelectionError>> {
        if let Some(winner) = &self.resolved {
            return Some(Ok(winner.clone()));
        }
        let Some(rx) = self.winner_rx.as_mut() else {
            return Some(Err(SelectionError::Cancelled));
        };
        match rx.try_recv() {
            Ok(winner) => {
                self.winner_rx = None;
                self.resolved = Some(winner.clone());
                Some(Ok(winner))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.winner_rx = None;
                Some(Err(SelectionError::Cancelled))
            }
        }
    }

    /// Cancel this session. Idempotent; a no-op once resolved.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}
