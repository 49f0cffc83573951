use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use buffer_governor::config::MIB;
use buffer_governor::estimator::BitrateEstimator;
use buffer_governor::testing::{RecordingHooks, RecoveryScript};
use buffer_governor::{
    BufferSample, EnvironmentDescriptor, Governor, GovernorConfig, GovernorHooks, MediaError,
    MediaErrorCode, NetworkState,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "governor_sim",
    about = "Deterministic buffer governance scenarios against a scripted player"
)]
struct Cli {
    /// JSON configuration file (defaults are used when absent or invalid)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log governor decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a sequence of buffer ratios and report throttle transitions
    Throttle {
        #[arg(long, value_enum, default_value_t = Network::Cellular)]
        network: Network,
        /// Buffer ratios relative to the network's ceiling
        #[arg(long, value_delimiter = ',', default_value = "0.5,0.92,0.95,0.6")]
        ratios: Vec<f64>,
        #[arg(long)]
        track_size_mb: Option<u64>,
    },
    /// Replay buffer-failure faults against scripted recovery outcomes
    Recover {
        #[arg(long, value_enum, default_value_t = Network::Cellular)]
        network: Network,
        #[arg(long, default_value_t = 30)]
        track_size_mb: u64,
        /// Playback position at the last healthy sample
        #[arg(long, default_value_t = 300.0)]
        position: f64,
        #[arg(long, value_enum, value_delimiter = ',', default_value = "fail,fail,fail")]
        outcomes: Vec<Outcome>,
        /// Override the per-attempt recovery timeout
        #[arg(long)]
        attempt_timeout_ms: Option<u64>,
    },
    /// Print the effective configuration
    Config,
    /// Monitor a scripted player and serve its diagnostics over HTTP
    #[cfg(all(feature = "debug_http", debug_assertions))]
    Serve {
        #[arg(long, value_enum, default_value_t = Network::Cellular)]
        network: Network,
        #[arg(long, default_value = "127.0.0.1:8788")]
        addr: std::net::SocketAddr,
        /// Token required on every request (header, Bearer or `?token=`)
        #[arg(long, default_value = "governor-debug")]
        token: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Network {
    Wifi,
    Cellular,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Outcome {
    Succeed,
    Fail,
    Error,
    Panic,
    Hang,
    Decline,
}

impl From<Outcome> for RecoveryScript {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Succeed => RecoveryScript::Succeed,
            Outcome::Fail => RecoveryScript::Fail,
            Outcome::Error => RecoveryScript::Error("simulated reload failure".to_string()),
            Outcome::Panic => RecoveryScript::Panic,
            Outcome::Hang => RecoveryScript::Hang,
            Outcome::Decline => RecoveryScript::Decline,
        }
    }
}

#[derive(Serialize)]
struct ThrottleStep {
    step: usize,
    ratio: f64,
    estimated_buffered_bytes: u64,
    is_throttling: bool,
    can_prefetch: bool,
}

#[derive(Serialize)]
struct RecoveryStep {
    step: usize,
    fault_handled: bool,
    recovered: bool,
    attempts: u32,
    phase: buffer_governor::RecoveryPhase,
}

#[derive(Serialize)]
struct Summary {
    throttle_starts: usize,
    throttle_ends: usize,
    recovery_calls: usize,
    exhaustions: usize,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli
        .config
        .map(GovernorConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Throttle {
            network,
            ratios,
            track_size_mb,
        } => run_throttle(config, network, &ratios, track_size_mb),
        Commands::Recover {
            network,
            track_size_mb,
            position,
            outcomes,
            attempt_timeout_ms,
        } => {
            let mut config = config;
            if let Some(timeout) = attempt_timeout_ms {
                config.recovery.attempt_timeout_ms = timeout;
            }
            run_recover(config, network, track_size_mb, position, outcomes)
        }
        Commands::Config => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
        #[cfg(all(feature = "debug_http", debug_assertions))]
        Commands::Serve {
            network,
            addr,
            token,
        } => run_serve(config, network, addr, token),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn environment(network: Network) -> EnvironmentDescriptor {
    EnvironmentDescriptor::new(true, matches!(network, Network::Cellular), "governor-sim")
}

fn attach_hooks(governor: &Governor, scripts: Vec<RecoveryScript>) -> Arc<RecordingHooks> {
    let hooks = Arc::new(RecordingHooks::with_script(scripts));
    let dyn_hooks: Arc<dyn GovernorHooks> = hooks.clone();
    governor.set_hooks(&dyn_hooks);
    hooks
}

fn run_throttle(
    config: GovernorConfig,
    network: Network,
    ratios: &[f64],
    track_size_mb: Option<u64>,
) -> Result<ExitCode> {
    let estimator = BitrateEstimator::new(&config.estimator);
    let governor = Governor::new(environment(network), config).context("building governor")?;
    let hooks = attach_hooks(&governor, Vec::new());
    governor.reset_for_new_track(track_size_mb.map(|mb| mb * MIB));

    let state = governor.get_state();
    let limit = state.thresholds.buffer_limit_bytes as f64;
    let bytes_per_sec = f64::from(estimator.bitrate_for(state.track_size_class)) / 8.0;

    for (step, ratio) in ratios.iter().copied().enumerate() {
        let buffered_end = ratio * limit / bytes_per_sec;
        governor.observe(BufferSample::playing(30.0 + step as f64, buffered_end));
        let state = governor.get_state();
        emit(&ThrottleStep {
            step,
            ratio: state.buffer_ratio,
            estimated_buffered_bytes: state.estimated_buffered_bytes,
            is_throttling: state.is_throttling,
            can_prefetch: state.prefetch.allowed,
        })?;
    }

    emit(&summary(&hooks))?;
    Ok(ExitCode::from(0))
}

fn run_recover(
    config: GovernorConfig,
    network: Network,
    track_size_mb: u64,
    position: f64,
    outcomes: Vec<Outcome>,
) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building simulation runtime")?;

    let large_track_bytes = config.thresholds.large_track_bytes;
    let estimator = BitrateEstimator::new(&config.estimator);
    let governor = Governor::new(environment(network), config).context("building governor")?;
    let steps = outcomes.len();
    let hooks = attach_hooks(
        &governor,
        outcomes.into_iter().map(RecoveryScript::from).collect(),
    );

    governor.reset_for_new_track(Some(track_size_mb * MIB));
    // Buffer just past the buffer-heavy mark so faults classify as buffer failures
    let class = governor.get_state().track_size_class;
    let bytes_per_sec = f64::from(estimator.bitrate_for(class)) / 8.0;
    let buffered_end = position + (large_track_bytes / 2 + MIB) as f64 / bytes_per_sec;
    governor.observe(BufferSample::playing(position, buffered_end));

    let fault = MediaError::new(MediaErrorCode::Network, "simulated source loss");
    let mut recovered = false;
    for step in 0..steps {
        let fault_handled = governor.handle_error(&fault, NetworkState::NoSource);
        recovered = runtime.block_on(governor.attempt_recovery());
        let state = governor.get_state();
        emit(&RecoveryStep {
            step,
            fault_handled,
            recovered,
            attempts: state.recovery.attempts,
            phase: state.recovery_phase,
        })?;
        if recovered {
            break;
        }
    }

    emit(&summary(&hooks))?;
    Ok(ExitCode::from(if recovered { 0 } else { 2 }))
}

#[cfg(all(feature = "debug_http", debug_assertions))]
fn run_serve(
    config: GovernorConfig,
    network: Network,
    addr: std::net::SocketAddr,
    token: String,
) -> Result<ExitCode> {
    use buffer_governor::http::{run_http_server, DebugHttpState};
    use buffer_governor::testing::ScriptedElement;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("building debug HTTP runtime")?;

    runtime.block_on(async move {
        let governor =
            Arc::new(Governor::new(environment(network), config).context("building governor")?);
        let element = Arc::new(ScriptedElement::new());
        element.set_position(30.0);
        element.set_buffered_end(120.0);
        governor.start_monitoring(element)?;

        let preview = token.chars().take(4).collect::<String>();
        tracing::info!(
            "[Sim] Debug HTTP server binding {} (token prefix {}***)",
            addr,
            preview
        );
        run_http_server(DebugHttpState::new(governor, token), addr).await
    })?;
    Ok(ExitCode::from(0))
}

fn summary(hooks: &RecordingHooks) -> Summary {
    Summary {
        throttle_starts: hooks.throttle_starts(),
        throttle_ends: hooks.throttle_ends(),
        recovery_calls: hooks.recovery_calls(),
        exhaustions: hooks.exhaustions(),
    }
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
