//! Animated random-selection engines.
//!
//! Two mini-games converge on exactly one winner from a fixed, title-unique
//! candidate list:
//! * [`spinner`]: a roulette cursor that decelerates over its final ticks.
//! * [`race`]: independent racers advanced per frame until one crosses the
//!   finish line.
//!
//! The engines are plain state machines. [`SelectionController`] wraps one in
//! a session driven by a [`core_scheduler::Scheduler`], streams
//! [`core_events::SelectionEvent`]s to the caller and delivers the winner
//! exactly once through [`SelectionHandle::winner`].

pub mod controller;
pub mod cue;
mod error;
pub mod flavor;
pub mod race;
mod session;
mod settings;
pub mod spinner;

pub use controller::{SelectionController, SelectionHandle};
pub use error::SelectionError;
pub use settings::{RaceSettings, SpinnerSettings};
