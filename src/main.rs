//! Echo-Grid - Main binary
//!
//! Drives the two-household micro-market against a world-state file.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   get / set / update   ┌────────────────────┐
//! │   Simulation   │ ◄────────────────────► │  world_state.json  │
//! │  (step loop)   │                        └────────────────────┘
//! │                │ ───── LogRecord ─────► SQLite logs + console
//! └────────────────┘
//!         ▲
//!         │ watch<bool>
//!      Ctrl-C
//! ```
//!
//! Live mode steps whatever inputs other processes last wrote to the world
//! file. Replay mode (`--replay`) applies one dataset row per step and stops
//! after the last row.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use agents::{DecisionMaker, build_decision_maker};
use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};
use simulation::{DatasetFeed, MetricsHook, MetricsSnapshot, Simulation, SimulationStats};
use storage::{
    ConsoleLogSink, FallbackLogSink, JsonFileStore, SqliteLogSink, TeeLogSink, WorldStore,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::SettlementAction;

pub use config::GridConfig;

/// Echo-Grid - peer-to-peer electricity micro-market simulation
#[derive(Parser, Debug)]
#[command(name = "echo-grid")]
#[command(about = "A two-household peer-to-peer electricity micro-market")]
#[command(version)]
struct Cli {
    /// World-state JSON file
    #[arg(long, global = true, env = "WORLD_STATE_PATH")]
    world_state: Option<PathBuf>,

    /// SQLite database for the log stream
    #[arg(long, global = true, env = "LOG_DB_PATH")]
    log_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the step loop until interrupted
    Run(RunArgs),
    /// Reset the world state to its initial values
    Reset,
    /// Print the current world state as JSON
    Status {
        /// Also print the most recent log records
        #[arg(long, value_name = "N")]
        logs: Option<usize>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Replay a dataset instead of reading live inputs (defaults to --dataset)
    #[arg(long, value_name = "CSV", num_args = 0..=1)]
    replay: Option<Option<PathBuf>>,

    /// Dataset used by --replay without a value
    #[arg(long, env = "DATASET_PATH")]
    dataset: Option<PathBuf>,

    /// Use scripted agents instead of the Gemini oracle
    #[arg(long, env = "USE_MOCK_AGENTS")]
    mock: bool,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Seconds between steps
    #[arg(long, env = "LOOP_DELAY")]
    delay: Option<f64>,

    /// Seconds a settled P2P contract stays active
    #[arg(long, env = "SETTLEMENT_PAUSE")]
    settlement_pause: Option<f64>,

    /// Stop after this many steps
    #[arg(long, env = "MAX_STEPS")]
    steps: Option<u64>,

    /// Start from the demo preset (mock agents, replay, short waits)
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.command {
        Command::Run(args) if args.demo => GridConfig::demo(),
        _ => GridConfig::default(),
    };
    if let Some(path) = &cli.world_state {
        config = config.world_state_path(path);
    }
    if let Some(path) = &cli.log_db {
        config = config.log_db_path(path);
    }

    match cli.command {
        Command::Run(args) => run(apply_run_args(config, args)?).await,
        Command::Reset => reset(&config),
        Command::Status { logs } => status(&config, logs),
    }
}

/// Layer CLI/env overrides on top of the selected preset.
fn apply_run_args(mut config: GridConfig, args: RunArgs) -> Result<GridConfig> {
    if let Some(path) = args.dataset {
        config.dataset_path = path;
    }
    if let Some(replay) = args.replay {
        let path = replay.unwrap_or_else(|| config.dataset_path.clone());
        config = config.replay(path);
    }
    if args.mock {
        config = config.mock_agents(true);
    }
    if let Some(model) = args.model {
        config = config.gemini_model(model);
    }
    if let Some(delay) = args.delay {
        ensure!(
            config::secs_to_duration(delay).is_some(),
            "--delay must be a finite number of seconds, got {delay}"
        );
        config = config.step_delay_secs(delay);
    }
    if let Some(pause) = args.settlement_pause {
        ensure!(
            config::secs_to_duration(pause).is_some(),
            "--settlement-pause must be a finite number of seconds, got {pause}"
        );
        config = config.settlement_pause_secs(pause);
    }
    if let Some(steps) = args.steps {
        config = config.max_steps(steps);
    }
    Ok(config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

async fn run(config: GridConfig) -> Result<()> {
    print_banner(&config);

    let store = open_store(&config.world_state_path)?;
    let agent: Arc<dyn DecisionMaker> = Arc::from(
        build_decision_maker(&config.decision_maker_kind())
            .context("failed to build decision maker (set GEMINI_API_KEY or use --mock)")?,
    );
    let log = build_log_sink(&config.log_db_path);

    let mut sim = Simulation::new(config.simulation.clone(), store, agent, log)
        .context("invalid simulation configuration")?;
    if config.is_replay() {
        let feed = DatasetFeed::from_path(&config.dataset_path).with_context(|| {
            format!("failed to load dataset {}", config.dataset_path.display())
        })?;
        info!(rows = feed.len(), path = %config.dataset_path.display(), "dataset loaded");
        sim = sim.with_feed(feed);
    }

    let metrics = Arc::new(MetricsHook::new());
    sim.add_hook(metrics.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current step");
            let _ = shutdown_tx.send(true);
        }
    });

    let start = Instant::now();
    let stats = sim.run(shutdown_rx).await?;
    print_summary(&stats, &metrics.snapshot(), start.elapsed());
    Ok(())
}

fn reset(config: &GridConfig) -> Result<()> {
    let store = open_store(&config.world_state_path)?;
    store.reset().context("failed to reset world state")?;
    println!(
        "World state reset at {}",
        config.world_state_path.display()
    );
    Ok(())
}

fn status(config: &GridConfig, logs: Option<usize>) -> Result<()> {
    let store = open_store(&config.world_state_path)?;
    match store
        .get_full_state()
        .context("failed to read world state")?
    {
        Some(world) => println!("{}", serde_json::to_string_pretty(&world)?),
        None => eprintln!("No world state yet. Run `echo-grid reset` or `echo-grid run`."),
    }

    if let Some(limit) = logs {
        let sink = SqliteLogSink::open(&config.log_db_path).with_context(|| {
            format!("failed to open log database {}", config.log_db_path.display())
        })?;
        for record in sink.recent(limit)?.iter().rev() {
            println!("{record}");
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

fn open_store(path: &Path) -> Result<Arc<dyn WorldStore>> {
    let store = JsonFileStore::open(path)
        .with_context(|| format!("failed to open world state {}", path.display()))?;
    Ok(Arc::new(store))
}

/// SQLite plus console; console only when the database cannot be opened.
fn build_log_sink(path: &Path) -> FallbackLogSink {
    let tee = TeeLogSink::new();
    let tee = match SqliteLogSink::open(path) {
        Ok(sqlite) => tee.with(sqlite),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "log database unavailable, console only");
            tee
        }
    };
    FallbackLogSink::new(tee.with(ConsoleLogSink))
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(config: &GridConfig) {
    let sim = &config.simulation;
    let mode = if config.is_replay() {
        format!("Replay ({})", config.dataset_path.display())
    } else {
        "Live".to_string()
    };
    let agents = if config.use_mock_agents {
        "mock".to_string()
    } else {
        format!("gemini ({})", config.gemini_model)
    };
    let steps = sim
        .max_steps
        .map_or_else(|| "unbounded".to_string(), |n| n.to_string());

    eprintln!("╔═══════════════════════════════════════════════════════════════════════╗");
    eprintln!("║  Echo-Grid Micro-Market                                               ║");
    eprintln!("╠═══════════════════════════════════════════════════════════════════════╣");
    eprintln!("║  Mode:   {mode:<61}║");
    eprintln!("║  Agents: {agents:<61}║");
    eprintln!(
        "║  Delay:  {:>6.1}s  │  Contract hold: {:>5.1}s  │  Steps: {:<12}║",
        sim.step_delay.as_secs_f64(),
        sim.settlement_pause.as_secs_f64(),
        steps
    );
    eprintln!(
        "║  World:  {:<61}║",
        config.world_state_path.display().to_string()
    );
    eprintln!("╚═══════════════════════════════════════════════════════════════════════╝");
    eprintln!();
}

fn print_summary(stats: &SimulationStats, metrics: &MetricsSnapshot, elapsed: Duration) {
    eprintln!();
    eprintln!("╔═══════════════════════════════════════════════════════════════════════╗");
    eprintln!("║  Simulation Complete                                                  ║");
    eprintln!("╠═══════════════════════════════════════════════════════════════════════╣");
    eprintln!(
        "║  Steps: {:6}  │  Resets: {:3}  │  Errors: {:3}  │  Elapsed: {:8.1}s ║",
        stats.steps_completed,
        stats.resets,
        stats.step_errors,
        elapsed.as_secs_f64()
    );
    eprintln!("╠═══════════════════════════════════════════════════════════════════════╣");
    for action in SettlementAction::ALL {
        eprintln!(
            "║    {:<14} ({})  {:6}                                           ║",
            action.label(),
            action.code(),
            metrics.count(action)
        );
    }
    eprintln!("╠═══════════════════════════════════════════════════════════════════════╣");
    eprintln!(
        "║  P2P: {:8.2} kWh  │  Value: {:<14}  │  Donated: {:8.2} kWh ║",
        metrics.p2p_kwh,
        metrics.p2p_value.to_string(),
        metrics.donated_kwh
    );
    eprintln!(
        "║  Refused negotiations: {:4}  │  Undersized: {:4}  │  Fallbacks: {:4} ║",
        metrics.negotiation_refusals, metrics.undersized_trades, metrics.fallback_decisions
    );
    eprintln!("╚═══════════════════════════════════════════════════════════════════════╝");
}
