//! Selection events, the bounded progress channel and session telemetry.

use core_model::{Candidate, Commentary, Phase, RaceSnapshot, SpinSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Ticks run inside scheduler tasks and must never wait on the renderer. Every event is offered with
// `try_send`; when the consumer lags and the channel is full the event is dropped and counted.
// Snapshots are superseded by the next frame so losing one is harmless. Phase, commentary and
// resolution events are rare enough that a full channel indicates a stalled consumer; those drops
// are logged at warn level. The winner itself never travels through this channel (see the oneshot
// in `core-engine`), so a dropped `Resolved` event cannot lose the outcome.
// -------------------------------------------------------------------------------------------------
pub const SELECTION_CHANNEL_CAP: usize = 256;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
pub static SESSIONS_STARTED: AtomicU64 = AtomicU64::new(0);
pub static SESSIONS_RESOLVED: AtomicU64 = AtomicU64::new(0);
pub static SESSIONS_CANCELLED: AtomicU64 = AtomicU64::new(0);
pub static TICKS_EXECUTED: AtomicU64 = AtomicU64::new(0); // spinner ticks + race frames + countdown steps
pub static STALE_TICKS_SKIPPED: AtomicU64 = AtomicU64::new(0); // ticks that fired after cancel
pub static SNAPSHOTS_DROPPED: AtomicU64 = AtomicU64::new(0);
pub static EVENTS_DROPPED: AtomicU64 = AtomicU64::new(0); // non-snapshot events lost to a full channel
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0); // receiver gone

/// Point-in-time copy of the telemetry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionTelemetry {
    pub sessions_started: u64,
    pub sessions_resolved: u64,
    pub sessions_cancelled: u64,
    pub ticks_executed: u64,
    pub stale_ticks_skipped: u64,
    pub snapshots_dropped: u64,
    pub events_dropped: u64,
    pub channel_send_failures: u64,
}

pub fn telemetry_snapshot() -> SelectionTelemetry {
    SelectionTelemetry {
        sessions_started: SESSIONS_STARTED.load(Ordering::Relaxed),
        sessions_resolved: SESSIONS_RESOLVED.load(Ordering::Relaxed),
        sessions_cancelled: SESSIONS_CANCELLED.load(Ordering::Relaxed),
        ticks_executed: TICKS_EXECUTED.load(Ordering::Relaxed),
        stale_ticks_skipped: STALE_TICKS_SKIPPED.load(Ordering::Relaxed),
        snapshots_dropped: SNAPSHOTS_DROPPED.load(Ordering::Relaxed),
        events_dropped: EVENTS_DROPPED.load(Ordering::Relaxed),
        channel_send_failures: CHANNEL_SEND_FAILURES.load(Ordering::Relaxed),
    }
}

/// Event stream consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Phase(Phase),
    /// Countdown digit (3, 2, 1, 0) before the race starts.
    Countdown(u32),
    Spin(SpinSnapshot),
    Race(RaceSnapshot),
    Commentary(Commentary),
    /// Final event of a naturally completed session.
    Resolved(Candidate),
    /// Final event of a cancelled session.
    Cancelled,
}

impl SelectionEvent {
    /// Snapshots are superseded by the next tick and may be dropped under backpressure.
    pub fn is_snapshot(&self) -> bool {
        matches!(self, SelectionEvent::Spin(_) | SelectionEvent::Race(_))
    }

    /// True for the last event a session ever emits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SelectionEvent::Resolved(_) | SelectionEvent::Cancelled)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SelectionEvent::Phase(_) => "phase",
            SelectionEvent::Countdown(_) => "countdown",
            SelectionEvent::Spin(_) => "spin",
            SelectionEvent::Race(_) => "race",
            SelectionEvent::Commentary(_) => "commentary",
            SelectionEvent::Resolved(_) => "resolved",
            SelectionEvent::Cancelled => "cancelled",
        }
    }
}

/// Create the bounded selection channel.
pub fn selection_channel() -> (EventSink, Receiver<SelectionEvent>) {
    let (tx, rx) = mpsc::channel(SELECTION_CHANNEL_CAP);
    (EventSink::new(tx), rx)
}

/// Non-blocking producer side of the selection channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<SelectionEvent>,
}

/// What happened to an offered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Dropped,
    Closed,
}

impl EventSink {
    pub fn new(tx: Sender<SelectionEvent>) -> Self {
        Self { tx }
    }

    /// Offer an event without waiting. Never blocks a tick.
    pub fn emit(&self, event: SelectionEvent) -> Delivery {
        match self.tx.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(event)) => {
                if event.is_snapshot() {
                    SNAPSHOTS_DROPPED.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(target: "selection.events", kind = event.kind(), "snapshot_dropped");
                } else {
                    EVENTS_DROPPED.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(target: "selection.events", kind = event.kind(), "event_dropped_channel_full");
                }
                Delivery::Dropped
            }
            Err(TrySendError::Closed(event)) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: "selection.events", kind = event.kind(), "receiver_closed");
                Delivery::Closed
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
