//! Conversion from the parsed config file into engine and search settings.

use core_config::{RaceConfig, SearchConfig, SpinnerConfig};
use core_engine::{RaceSettings, SpinnerSettings};
use core_model::Candidate;
use core_search::{Budget, GeminiSettings};
use std::time::Duration;
use tracing::warn;

pub fn spinner_settings(cfg: &SpinnerConfig) -> SpinnerSettings {
    SpinnerSettings {
        base_delay: Duration::from_millis(cfg.base_delay_ms),
        slowdown_factor: cfg.slowdown_factor,
        slowdown_ticks: cfg.slowdown_ticks,
        reveal_delay: Duration::from_millis(cfg.reveal_delay_ms),
    }
}

pub fn race_settings(cfg: &RaceConfig) -> RaceSettings {
    RaceSettings {
        countdown_from: cfg.countdown_from,
        countdown_step: Duration::from_millis(cfg.countdown_step_ms),
        frame_interval: Duration::from_millis(cfg.frame_interval_ms),
        resolution_delay: Duration::from_millis(cfg.resolution_delay_ms),
    }
}

pub fn gemini_settings(cfg: &SearchConfig) -> GeminiSettings {
    GeminiSettings {
        model: cfg.model.clone(),
        api_key_env: cfg.api_key_env.clone(),
        base_url: cfg.base_url.clone(),
        timeout: Duration::from_secs(cfg.timeout_seconds),
    }
}

/// Configured budget; unknown names fall back to the default.
pub fn budget(cfg: &SearchConfig) -> Budget {
    cfg.budget.parse().unwrap_or_else(|err: String| {
        warn!(target: "config", value = cfg.budget.as_str(), %err, "search_budget_unknown");
        Budget::default()
    })
}

/// Race entrants. Without explicit fighters the first `max_racers` results
/// enter. Named fighters are matched case-insensitively against the results,
/// in the order given; unknown names are skipped and extras past
/// `max_racers` stay on the bench.
pub fn pick_racers(candidates: &[Candidate], fighters: &[String], max_racers: usize) -> Vec<Candidate> {
    if fighters.is_empty() {
        return candidates.iter().take(max_racers).cloned().collect();
    }
    let mut picked: Vec<Candidate> = Vec::new();
    for name in fighters {
        let wanted = name.trim();
        let found = candidates
            .iter()
            .find(|c| c.title.eq_ignore_ascii_case(wanted));
        match found {
            Some(candidate) if !picked.contains(candidate) => picked.push(candidate.clone()),
            Some(_) => {}
            None => warn!(target: "runtime", fighter = wanted, "fighter_not_in_results"),
        }
    }
    if picked.len() > max_racers {
        warn!(target: "runtime", named = picked.len(), max_racers, "fighters_truncated");
        picked.truncate(max_racers);
    }
    picked
}
