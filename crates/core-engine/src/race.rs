//! Battle-arena race: independent progress accumulators advanced once per
//! frame until the first one reaches the finish line.

use core_entropy::Entropy;
use core_model::RaceSnapshot;

pub const FINISH_LINE: f64 = 100.0;
pub const BOOST_ABOVE: f64 = 0.98;
pub const SETBACK_BELOW: f64 = 0.02;
pub const BOOST_SPEED: f64 = 3.0;
pub const SETBACK_SPEED: f64 = -0.5;
pub const BASE_SPEED: f64 = 0.2;
pub const SPEED_SPREAD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentKind {
    Boost,
    Setback,
}

/// A rare chaos event that replaced a racer's speed this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incident {
    pub racer: usize,
    pub kind: IncidentKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    /// 1-based frame number.
    pub frame: u64,
    pub incidents: Vec<Incident>,
    /// Set on the frame a racer first crosses the line (and afterwards).
    pub winner: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Race {
    progress: Vec<f64>,
    frame: u64,
    winner: Option<usize>,
}

/// Draw one racer's speed for this frame.
fn draw_speed(entropy: &mut dyn Entropy) -> (f64, Option<IncidentKind>) {
    let chaos = entropy.uniform();
    if chaos > BOOST_ABOVE {
        (BOOST_SPEED, Some(IncidentKind::Boost))
    } else if chaos < SETBACK_BELOW {
        (SETBACK_SPEED, Some(IncidentKind::Setback))
    } else {
        (entropy.uniform() * SPEED_SPREAD + BASE_SPEED, None)
    }
}

impl Race {
    pub fn new(racers: usize) -> Self {
        Self {
            progress: vec![0.0; racers],
            frame: 0,
            winner: None,
        }
    }

    pub fn racers(&self) -> usize {
        self.progress.len()
    }

    pub fn progress(&self) -> &[f64] {
        &self.progress
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            frame: self.frame,
            progress: self.progress.clone(),
        }
    }

    /// Advance every racer once, in index order.
    ///
    /// The first racer to reach the line this frame wins. Racers after it
    /// still apply their speed so the final snapshot is complete. Once a
    /// winner exists further calls move nothing.
    pub fn frame(&mut self, entropy: &mut dyn Entropy) -> FrameOutcome {
        if self.winner.is_some() {
            return FrameOutcome {
                frame: self.frame,
                incidents: Vec::new(),
                winner: self.winner,
            };
        }
        self.frame += 1;
        let mut incidents = Vec::new();
        for (racer, value) in self.progress.iter_mut().enumerate() {
            let (speed, incident) = draw_speed(entropy);
            if let Some(kind) = incident {
                incidents.push(Incident { racer, kind });
            }
            *value = (*value + speed).clamp(0.0, FINISH_LINE);
            if *value >= FINISH_LINE && self.winner.is_none() {
                self.winner = Some(racer);
            }
        }
        FrameOutcome {
            frame: self.frame,
            incidents,
            winner: self.winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_entropy::ScriptedEntropy;

    #[test]
    fn baseline_speed_draws_twice() {
        let mut race = Race::new(1);
        let mut e = ScriptedEntropy::cycle([0.5, 1.0 / 3.0]);
        let out = race.frame(&mut e);
        assert!(out.incidents.is_empty());
        let expected = 0.2 + 0.5 / 3.0;
        assert!((race.progress()[0] - expected).abs() < 1e-12);
        assert_eq!(e.draws(), 2);
    }

    #[test]
    fn incidents_draw_once_and_clamp() {
        let mut race = Race::new(2);
        // racer 0 boosts, racer 1 trips at zero and stays clamped.
        let mut e = ScriptedEntropy::cycle([0.99, 0.01]);
        let out = race.frame(&mut e);
        assert_eq!(
            out.incidents,
            vec![
                Incident { racer: 0, kind: IncidentKind::Boost },
                Incident { racer: 1, kind: IncidentKind::Setback },
            ]
        );
        assert_eq!(race.progress(), &[3.0, 0.0]);
        assert_eq!(e.draws(), 2);
    }

    #[test]
    fn winner_freezes_progress() {
        let mut race = Race::new(2);
        let mut e = ScriptedEntropy::constant(0.99);
        let mut last = None;
        for _ in 0..40 {
            last = race.frame(&mut e).winner;
            if last.is_some() {
                break;
            }
        }
        assert_eq!(last, Some(0));
        assert_eq!(race.frames(), 34);
        let frozen = race.snapshot();
        let again = race.frame(&mut e);
        assert_eq!(again.frame, 34);
        assert_eq!(race.snapshot(), frozen);
    }
}
