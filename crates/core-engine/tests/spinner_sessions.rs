use core_engine::cue::TickCue;
use core_engine::{SelectionController, SelectionError, SelectionHandle};
use core_entropy::{ScriptedEntropy, SeededEntropy};
use core_events::SelectionEvent;
use core_model::{Candidate, CommentaryKind, EngineKind, Phase, candidates_from_titles};
use core_scheduler::ManualScheduler;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn scripted(sched: &ManualScheduler, outcome: f64) -> SelectionController {
    SelectionController::with_entropy(
        Arc::new(sched.clone()),
        Box::new(ScriptedEntropy::constant(outcome)),
        Box::new(ScriptedEntropy::constant(0.0)),
    )
}

fn drain(handle: &mut SelectionHandle) -> Vec<SelectionEvent> {
    let mut out = Vec::new();
    while let Some(ev) = handle.try_next_event() {
        out.push(ev);
    }
    out
}

fn spins(events: &[SelectionEvent]) -> Vec<(u32, usize, String)> {
    events
        .iter()
        .filter_map(|ev| match ev {
            SelectionEvent::Spin(s) => Some((s.tick, s.cursor, s.title.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn three_candidates_thirty_ticks_lands_on_c() {
    let sched = ManualScheduler::new();
    let mut ctl = scripted(&sched, 0.0);
    let mut handle = ctl
        .start(EngineKind::Spinner, candidates_from_titles(["A", "B", "C"]))
        .expect("spinner starts");
    assert_eq!(ctl.phase(), Phase::Running);

    sched.run_until_idle(1_000);
    let events = drain(&mut handle);
    let ticks = spins(&events);
    assert_eq!(ticks.len(), 30);
    assert_eq!(ticks[0], (1, 0, "A".to_string()));
    assert_eq!(ticks[29], (30, 2, "C".to_string()));

    assert_eq!(handle.winner().await, Ok(Candidate::new("C")));
    assert_eq!(ctl.phase(), Phase::Resolved);
    assert_eq!(
        events.last(),
        Some(&SelectionEvent::Resolved(Candidate::new("C")))
    );
    // Sender side is gone once resolved.
    assert_eq!(handle.next_event().await, None);
}

#[tokio::test]
async fn same_script_same_outcome() {
    let titles = ["Pho Real", "Taco Town", "Curry Up", "Wok This Way", "Bun Intended"];
    let mut winners = Vec::new();
    for _ in 0..2 {
        let sched = ManualScheduler::new();
        let mut ctl = scripted(&sched, 0.37);
        let mut handle = ctl
            .start(EngineKind::Spinner, candidates_from_titles(titles))
            .expect("spinner starts");
        sched.run_until_idle(1_000);
        let ticks = spins(&drain(&mut handle));
        // floor(0.37 * 20) = 7 -> 37 ticks -> cursor 36 % 5
        assert_eq!(ticks.len(), 37);
        winners.push(handle.winner().await.expect("resolved"));
    }
    assert_eq!(winners[0], winners[1]);
    assert_eq!(winners[0].title, titles[36 % 5]);
}

#[tokio::test]
async fn start_index_shifts_the_winner() {
    let sched = ManualScheduler::new();
    let mut ctl = scripted(&sched, 0.0);
    let mut handle = ctl
        .start_at(EngineKind::Spinner, candidates_from_titles(["A", "B", "C"]), 4)
        .expect("spinner starts");
    sched.run_until_idle(1_000);
    // start 4 % 3 = 1, winner (1 + 29) % 3 = 0
    assert_eq!(handle.winner().await, Ok(Candidate::new("A")));
}

#[tokio::test]
async fn winner_waits_for_reveal_delay() {
    let sched = ManualScheduler::new();
    let mut ctl = scripted(&sched, 0.0);
    let mut handle = ctl
        .start(EngineKind::Spinner, candidates_from_titles(["A", "B"]))
        .expect("spinner starts");

    let mut seen_final = false;
    while !seen_final {
        assert!(sched.run_next(), "spin ended before its final tick");
        seen_final = drain(&mut handle)
            .iter()
            .any(|ev| matches!(ev, SelectionEvent::Spin(s) if s.is_final()));
    }
    assert_eq!(handle.phase(), Phase::Running);
    assert!(handle.try_winner().is_none());

    sched.advance(Duration::from_millis(299));
    assert_eq!(handle.phase(), Phase::Running);
    sched.advance(Duration::from_millis(1));
    assert_eq!(handle.phase(), Phase::Resolved);
    assert_eq!(handle.try_winner(), Some(Ok(Candidate::new("B"))));
}

#[tokio::test]
async fn cancel_mid_spin_never_resolves() {
    let sched = ManualScheduler::new();
    let mut ctl = scripted(&sched, 0.5);
    let mut handle = ctl
        .start(EngineKind::Spinner, candidates_from_titles(["A", "B", "C"]))
        .expect("spinner starts");
    sched.advance(Duration::from_millis(600));
    assert!(ctl.cancel());
    assert_eq!(ctl.phase(), Phase::Idle);

    sched.run_until_idle(1_000);
    let events = drain(&mut handle);
    assert_eq!(events.last(), Some(&SelectionEvent::Cancelled));
    assert!(
        !events
            .iter()
            .any(|ev| matches!(ev, SelectionEvent::Resolved(_)))
    );
    assert_eq!(handle.winner().await, Err(SelectionError::Cancelled));
    assert_eq!(sched.pending(), 0);
}

#[tokio::test]
async fn cancel_during_reveal_delay_withholds_winner() {
    let sched = ManualScheduler::new();
    let mut ctl = scripted(&sched, 0.0);
    let mut handle = ctl
        .start(EngineKind::Spinner, candidates_from_titles(["A"]))
        .expect("spinner starts");
    while sched.pending() > 0 {
        sched.run_next();
        if drain(&mut handle)
            .iter()
            .any(|ev| matches!(ev, SelectionEvent::Spin(s) if s.is_final()))
        {
            break;
        }
    }
    assert!(handle.cancel());
    sched.run_until_idle(10);
    assert_eq!(handle.try_winner(), Some(Err(SelectionError::Cancelled)));
}

#[tokio::test]
async fn flavor_text_rotates_every_fifth_tick() {
    let sched = ManualScheduler::new();
    let mut ctl = scripted(&sched, 0.0);
    let mut handle = ctl
        .start(EngineKind::Spinner, candidates_from_titles(["A", "B", "C"]))
        .expect("spinner starts");
    sched.run_until_idle(1_000);
    let flavor = drain(&mut handle)
        .into_iter()
        .filter(|ev| matches!(ev, SelectionEvent::Commentary(c) if c.kind == CommentaryKind::Flavor))
        .count();
    assert_eq!(flavor, 6);
}

struct CountingCue(AtomicUsize);

impl TickCue for CountingCue {
    fn tick(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn tick_cue_fires_once_per_tick() {
    let sched = ManualScheduler::new();
    let cue = Arc::new(CountingCue(AtomicUsize::new(0)));
    let mut ctl = scripted(&sched, 0.0).with_tick_cue(cue.clone());
    let mut handle = ctl
        .start(EngineKind::Spinner, candidates_from_titles(["A", "B"]))
        .expect("spinner starts");
    sched.run_until_idle(1_000);
    assert!(handle.winner().await.is_ok());
    assert_eq!(cue.0.load(Ordering::SeqCst), 30);
}

#[tokio::test(start_paused = true)]
async fn tokio_scheduler_drives_a_full_spin() {
    let sched = core_scheduler::TokioScheduler::current().expect("runtime");
    let mut ctl = SelectionController::with_entropy(
        Arc::new(sched),
        Box::new(SeededEntropy::new(7)),
        Box::new(SeededEntropy::new(8)),
    );
    let titles = ["A", "B", "C", "D"];
    let mut handle = ctl
        .start(EngineKind::Spinner, candidates_from_titles(titles))
        .expect("spinner starts");
    let mut last_spin = None;
    while let Some(ev) = handle.next_event().await {
        if let SelectionEvent::Spin(s) = ev {
            last_spin = Some(s);
        }
    }
    let last = last_spin.expect("at least one tick");
    assert!(last.is_final());
    let winner = handle.winner().await.expect("resolved");
    assert_eq!(winner.title, titles[last.cursor]);
}
