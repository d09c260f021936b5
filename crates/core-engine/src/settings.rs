use std::time::Duration;

/// Roulette timing.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinnerSettings {
    /// Delay before the first tick and between ticks until the slowdown.
    pub base_delay: Duration,
    /// Interval multiplier applied over the final ticks. Must be > 1.
    pub slowdown_factor: f64,
    /// How many trailing ticks decelerate.
    pub slowdown_ticks: u32,
    /// Pause between the final tick and surfacing the winner.
    pub reveal_delay: Duration,
}

impl Default for SpinnerSettings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(60),
            slowdown_factor: 1.25,
            slowdown_ticks: 10,
            reveal_delay: Duration::from_millis(300),
        }
    }
}

/// Race timing.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceSettings {
    /// First countdown digit; the race starts after 0 is shown.
    pub countdown_from: u32,
    pub countdown_step: Duration,
    pub frame_interval: Duration,
    /// Pause between the winner crossing and surfacing it.
    pub resolution_delay: Duration,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_step: Duration::from_secs(1),
            frame_interval: Duration::from_millis(16),
            resolution_delay: Duration::from_millis(1500),
        }
    }
}
