//! forkfate entrypoint.
mod render;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use core_config::{Config, load_from};
use core_engine::{SelectionController, SelectionError, SelectionHandle, flavor};
use core_entropy::{Entropy, SeededEntropy, SystemEntropy};
use core_events::{SelectionEvent, telemetry_snapshot};
use core_model::{Candidate, EngineKind};
use core_scheduler::{Scheduler, TokioScheduler};
use core_search::{
    Budget, CandidateSource, Coordinates, GeminiSearch, SearchError, SearchFilters, StaticSource,
};
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalCapabilities};
use render::{NO_RESULTS, Screen};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Once};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE: &str = "forkfate.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Slot-machine roulette.
    Spin,
    /// Battle arena race.
    Race,
}

impl Mode {
    fn engine(self) -> EngineKind {
        match self {
            Mode::Spin => EngineKind::Spinner,
            Mode::Race => EngineKind::Race,
        }
    }
}

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "forkfate",
    version,
    about = "Let fate pick where you eat",
    allow_negative_numbers = true
)]
struct Args {
    /// Latitude of the search origin.
    #[arg(long, required_unless_present = "offline")]
    lat: Option<f64>,
    /// Longitude of the search origin.
    #[arg(long, required_unless_present = "offline")]
    lon: Option<f64>,
    /// Walking radius in meters (100 to 3000, rounded to the nearest 100).
    #[arg(long)]
    radius: Option<u32>,
    /// cheap, moderate or expensive.
    #[arg(long)]
    budget: Option<Budget>,
    /// Skip the search and choose among these titles.
    #[arg(long, num_args = 1.., value_name = "TITLE")]
    offline: Vec<String>,
    #[arg(long, value_enum, default_value_t = Mode::Spin)]
    mode: Mode,
    /// Race entrants, picked from the results by title.
    #[arg(long, num_args = 1.., value_name = "TITLE")]
    fighters: Vec<String>,
    /// Seed for a reproducible selection.
    #[arg(long)]
    seed: Option<u64>,
    /// Optional configuration file path (overrides discovery of `forkfate.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        // A subscriber may already be installed; dropping the guard then shuts the writer down.
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    Resolved,
    CtrlC,
    Cancelled,
    NoResults,
    SearchFailed,
    InvalidSelection,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Resolved => "resolved",
            ShutdownReason::CtrlC => "ctrl_c",
            ShutdownReason::Cancelled => "cancelled",
            ShutdownReason::NoResults => "no_results",
            ShutdownReason::SearchFailed => "search_failed",
            ShutdownReason::InvalidSelection => "invalid_selection",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }

    fn exit_status(&self) -> u8 {
        match self {
            ShutdownReason::Resolved | ShutdownReason::NoResults => 0,
            ShutdownReason::SearchFailed | ShutdownReason::ChannelClosed => 1,
            ShutdownReason::InvalidSelection => 2,
            ShutdownReason::CtrlC | ShutdownReason::Cancelled => 130,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown(reason: ShutdownReason) {
    let t = telemetry_snapshot();
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        sessions_started = t.sessions_started,
        sessions_resolved = t.sessions_resolved,
        sessions_cancelled = t.sessions_cancelled,
        ticks_executed = t.ticks_executed,
        stale_ticks_skipped = t.stale_ticks_skipped,
        snapshots_dropped = t.snapshots_dropped,
        events_dropped = t.events_dropped,
        channel_send_failures = t.channel_send_failures,
        "shutdown_complete"
    );
}

/// Outcome, flavor and presentation streams. A seed makes all three
/// reproducible; the cosmetic streams are derived so they never shift the
/// outcome.
struct EntropySet {
    outcome: Box<dyn Entropy>,
    flavor: Box<dyn Entropy>,
    presentation: Box<dyn Entropy>,
}

impl EntropySet {
    fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => {
                let base = SeededEntropy::new(seed);
                Self {
                    flavor: Box::new(base.derive(1)),
                    presentation: Box::new(base.derive(2)),
                    outcome: Box::new(base),
                }
            }
            None => Self {
                outcome: Box::new(SystemEntropy::new()),
                flavor: Box::new(SystemEntropy::new()),
                presentation: Box::new(SystemEntropy::new()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let mut app = AppStartup::new();
    app.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let mut config = load_from(args.config.clone())?;
    let clamps = config.apply_limits();
    let config_path = config.source.as_ref().map(|p| p.display().to_string());
    info!(
        target: "runtime.startup",
        config_override = args.config.is_some(),
        config_path = config_path.as_deref(),
        clamps,
        mode = args.mode.engine().as_str(),
        offline = !args.offline.is_empty(),
        seed = args.seed,
        "bootstrap_complete"
    );

    let reason = run(&args, &config).await?;
    log_shutdown(reason);
    Ok(ExitCode::from(reason.exit_status()))
}

async fn run(args: &Args, config: &Config) -> Result<ShutdownReason> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut entropy = EntropySet::new(args.seed);

    println!("{}", flavor::loading_text(entropy.presentation.as_mut()));
    let found = tokio::select! {
        biased;
        _ = &mut ctrl_c => return Ok(ShutdownReason::CtrlC),
        found = gather(args, config) => found,
    };
    let candidates = match found {
        Ok(candidates) => candidates,
        Err(err) => {
            error!(target: "runtime", %err, "search_failed");
            eprintln!("{}", err.user_message());
            return Ok(ShutdownReason::SearchFailed);
        }
    };
    if candidates.is_empty() {
        info!(target: "runtime", "search_empty");
        println!("{NO_RESULTS}");
        return Ok(ShutdownReason::NoResults);
    }
    for line in render::candidate_list(&candidates) {
        println!("{line}");
    }
    println!();

    let kind = args.mode.engine();
    let entrants = match kind {
        EngineKind::Spinner => candidates,
        EngineKind::Race => {
            settings::pick_racers(&candidates, &args.fighters, config.file.race.max_racers)
        }
    };

    let scheduler: Arc<dyn Scheduler> =
        Arc::new(TokioScheduler::current().context("no tokio runtime for the scheduler")?);
    let mut controller =
        SelectionController::with_entropy(scheduler, entropy.outcome, entropy.flavor)
            .with_spinner_settings(settings::spinner_settings(&config.file.spinner))
            .with_race_settings(settings::race_settings(&config.file.race));
    if config.file.audio.tick_cue {
        controller = controller.with_tick_cue(Arc::new(core_engine::cue::shared()));
    }
    let mut handle = match controller.start(kind, entrants) {
        Ok(handle) => handle,
        Err(err) => {
            warn!(target: "runtime", %err, "selection_rejected");
            eprintln!("{err}");
            return Ok(ShutdownReason::InvalidSelection);
        }
    };

    let caps = TerminalCapabilities::detect();
    let mut screen = Screen::new(
        kind,
        handle.candidates().to_vec(),
        handle.avatars().to_vec(),
        caps.width,
    );
    let mut backend = CrosstermBackend::new();
    let reason = if caps.supports_redraw {
        backend.set_title("forkfate")?;
        let mut guard = backend.enter_guard()?;
        let reason = watch(&mut handle, &mut screen, &mut ctrl_c, |screen, _| {
            guard.backend().draw(&screen.lines())
        })
        .await?;
        guard.backend().commit();
        reason
    } else {
        watch(&mut handle, &mut screen, &mut ctrl_c, |_, event| {
            if let Some(line) = render::narrate(event) {
                println!("{line}");
            }
            Ok(())
        })
        .await?
    };

    if reason == ShutdownReason::CtrlC {
        println!("Cancelled. Fate can wait.");
        return Ok(reason);
    }
    match handle.winner().await {
        Ok(winner) => {
            announce(&winner, entropy.presentation.as_mut());
            Ok(ShutdownReason::Resolved)
        }
        Err(SelectionError::Cancelled) => Ok(ShutdownReason::Cancelled),
        Err(err) => Err(err.into()),
    }
}

async fn gather(args: &Args, config: &Config) -> Result<Vec<Candidate>, SearchError> {
    let source: Box<dyn CandidateSource> = if args.offline.is_empty() {
        Box::new(GeminiSearch::from_env(settings::gemini_settings(
            &config.file.search,
        ))?)
    } else {
        Box::new(StaticSource::from_titles(&args.offline))
    };
    let coordinates = Coordinates::new(args.lat.unwrap_or_default(), args.lon.unwrap_or_default());
    let filters = SearchFilters::new(
        args.radius.unwrap_or(config.file.search.radius_meters),
        args.budget
            .unwrap_or_else(|| settings::budget(&config.file.search)),
    );
    info!(
        target: "runtime",
        source = source.name(),
        %coordinates,
        radius = filters.radius_meters,
        budget = filters.budget.as_str(),
        "search_start"
    );
    let results = source.search(coordinates, &filters).await?;
    if !results.text.is_empty() {
        debug!(target: "runtime", text = results.text.as_str(), "search_commentary");
    }
    Ok(results.candidates)
}

/// Pump session events into `draw` until the session ends or `interrupt`
/// fires, in which case the session is cancelled.
async fn watch<I, D>(
    handle: &mut SelectionHandle,
    screen: &mut Screen,
    interrupt: I,
    mut draw: D,
) -> Result<ShutdownReason>
where
    I: Future,
    D: FnMut(&Screen, &SelectionEvent) -> Result<()>,
{
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => {
                info!(target: "runtime", session = handle.id(), "interrupt_cancels_session");
                handle.cancel();
                return Ok(ShutdownReason::CtrlC);
            }
            event = handle.next_event() => {
                let Some(event) = event else {
                    return Ok(ShutdownReason::ChannelClosed);
                };
                screen.apply(&event);
                draw(screen, &event)?;
                match event {
                    SelectionEvent::Resolved(_) => return Ok(ShutdownReason::Resolved),
                    SelectionEvent::Cancelled => return Ok(ShutdownReason::Cancelled),
                    _ => {}
                }
            }
        }
    }
}

fn announce(winner: &Candidate, entropy: &mut dyn Entropy) {
    for line in render::winner_card(winner, flavor::winner_quote(entropy)) {
        println!("{line}");
    }
}
