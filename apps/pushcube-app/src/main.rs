//! Cube-push task CLI.
//!
//! Provides three modes of operation:
//! - `rollout`: Run random-action episodes on the headless backend and print statistics
//! - `obs`: Reset once and print the named observation groups of one slot
//! - `config`: Print the fully merged task config as TOML
//! - `info`: Print crate versions and registered environments

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pushcube_core::config::{ControlMode, ObsMode};
use pushcube_core::error::{PushCubeError, SimError};
use pushcube_env::prelude::*;
use pushcube_env::registry::registered;
use pushcube_sim::{HeadlessScene, So100Arm};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// SO100 cube-push task runner.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run random-action episodes and print statistics.
    Rollout {
        /// Number of episodes to finish across all slots.
        #[arg(short = 'n', long, default_value_t = 4)]
        episodes: u32,

        /// Parallel scenes (overrides the config file).
        #[arg(long)]
        num_envs: Option<usize>,

        /// Random seed for scene loading, episodes and actions.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// TOML file with config overrides.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Control mode (overrides the config file).
        #[arg(long)]
        control_mode: Option<ControlMode>,

        /// Observation mode (overrides the config file).
        #[arg(long)]
        obs_mode: Option<ObsMode>,

        /// Turn every randomization off.
        #[arg(long)]
        no_randomization: bool,

        /// Report the backend as GPU-batched.
        #[arg(long)]
        gpu: bool,

        /// Greenscreen background image for the base camera.
        #[arg(long)]
        greenscreen: Option<PathBuf>,
    },

    /// Reset once and print the observation groups of one slot.
    Obs {
        /// Slot to print.
        #[arg(long, default_value_t = 0)]
        slot: usize,

        /// Random seed for scene loading and the episode.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// TOML file with config overrides.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the merged config as TOML.
    Config {
        /// TOML file with config overrides.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Rollout
// ---------------------------------------------------------------------------

/// Options for [`run_rollout`].
struct RolloutOptions {
    episodes: u32,
    num_envs: Option<usize>,
    seed: u64,
    config: Option<PathBuf>,
    control_mode: Option<ControlMode>,
    obs_mode: Option<ObsMode>,
    no_randomization: bool,
    gpu: bool,
    greenscreen: Option<PathBuf>,
}

#[derive(Default)]
struct RolloutStats {
    episodes: u32,
    successes: u32,
    total_steps: u64,
    total_return: f64,
}

fn load_config(path: Option<&Path>) -> Result<PushCubeConfig, PushCubeError> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            PushCubeConfig::from_file(path)?
        }
        None => PushCubeConfig::default(),
    };
    Ok(config)
}

fn run_rollout(options: RolloutOptions) -> Result<(), PushCubeError> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(num_envs) = options.num_envs {
        config.num_envs = num_envs;
    }
    if let Some(mode) = options.control_mode {
        config.control_mode = mode;
    }
    if let Some(mode) = options.obs_mode {
        config.obs_mode = mode;
    }
    if options.no_randomization {
        config.domain_randomization = false;
    }
    if let Some(path) = options.greenscreen {
        config = config.with_greenscreen(path);
    }
    config.validate()?;

    let num_envs = config.num_envs;
    let backend = HeadlessScene::new(num_envs).with_gpu(options.gpu);
    let mut env = make_with(PUSH_CUBE_ID, config, backend, So100Arm::new())?;
    let action_space = env.action_space();
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);

    let reset = env.reset(Some(options.seed))?;
    info!(
        num_envs,
        obs_dim = reset.first().map_or(0, |r| r.observation.len()),
        act_dim = action_space.dim(),
        "rollout started"
    );

    let mut stats = RolloutStats::default();
    while stats.episodes < options.episodes {
        let actions: Vec<_> = (0..num_envs).map(|_| action_space.sample(&mut rng)).collect();
        for (slot, result) in env.step(&actions)?.iter().enumerate() {
            if !(result.terminated || result.truncated) {
                continue;
            }
            stats.episodes += 1;
            stats.successes += u32::from(result.terminated);
            stats.total_steps += u64::from(result.info.episode_length);
            stats.total_return += f64::from(result.info.episode_reward);
            println!(
                "episode {} (slot {slot}): steps={}, return={:.3}, success={}",
                stats.episodes,
                result.info.episode_length,
                result.info.episode_reward,
                result.terminated
            );
            if stats.episodes >= options.episodes {
                break;
            }
        }
    }

    let episodes = f64::from(stats.episodes.max(1));
    println!(
        "\ntotal: episodes={}, steps={}, success_rate={:.3}, mean_return={:.3}",
        stats.episodes,
        stats.total_steps,
        f64::from(stats.successes) / episodes,
        stats.total_return / episodes
    );
    if env.env().backend().gpu_sync_count() > 0 {
        println!("gpu syncs: {}", env.env().backend().gpu_sync_count());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Obs / Config / Info
// ---------------------------------------------------------------------------

fn run_obs(slot: usize, seed: u64, path: Option<&Path>) -> Result<(), PushCubeError> {
    let config = load_config(path)?;
    let num_envs = config.num_envs;
    if slot >= num_envs {
        return Err(SimError::SlotOutOfRange { slot, num_envs }.into());
    }
    let mut env = make(PUSH_CUBE_ID, config)?;
    env.reset(Some(seed))?;
    let info = env.env().evaluate()?;
    let observation = env.env().observe(&info)?;
    for (key, values) in observation.to_dict(slot) {
        let values: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
        println!("{key:<18} [{}]", values.join(", "));
    }
    Ok(())
}

fn run_config(path: Option<&Path>) -> Result<(), PushCubeError> {
    let config = load_config(path)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn run_info() {
    println!("pushcube v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  pushcube-core        {}", env!("CARGO_PKG_VERSION"));
    println!("  pushcube-domain-rand {}", env!("CARGO_PKG_VERSION"));
    println!("  pushcube-sim         {}", env!("CARGO_PKG_VERSION"));
    println!("  pushcube-env         {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("environments:");
    for spec in registered() {
        println!(
            "  {:<20} max_episode_steps={}  {}",
            spec.id, spec.max_episode_steps, spec.description
        );
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Rollout {
            episodes,
            num_envs,
            seed,
            config,
            control_mode,
            obs_mode,
            no_randomization,
            gpu,
            greenscreen,
        }) => run_rollout(RolloutOptions {
            episodes,
            num_envs,
            seed,
            config,
            control_mode,
            obs_mode,
            no_randomization,
            gpu,
            greenscreen,
        }),
        Some(Commands::Obs { slot, seed, config }) => run_obs(slot, seed, config.as_deref()),
        Some(Commands::Config { config }) => run_config(config.as_deref()),
        Some(Commands::Info) => {
            run_info();
            Ok(())
        }
        None => {
            warn!("no subcommand given; running a default rollout");
            run_rollout(RolloutOptions {
                episodes: 4,
                num_envs: None,
                seed: 0,
                config: None,
                control_mode: None,
                obs_mode: None,
                no_randomization: false,
                gpu: false,
                greenscreen: None,
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
