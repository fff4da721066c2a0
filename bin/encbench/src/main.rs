//! ---
//! eb_section: "05-external-interfaces"
//! eb_subsection: "binary"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Command-line entrypoint for capacity sweeps and encoder probes."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use encbench_common::config::{AppConfig, EngineKind, LoadedAppConfig};
use encbench_common::logging::init_tracing;
use encbench_common::version::VersionInfo;
use tracing::info;

mod bench;
mod probe;

const DEFAULT_CONFIG_PATH: &str = "configs/encbench.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Concurrent NVENC capacity benchmark",
    long_about = None
)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, help = "Override the pipeline engine backend")]
    engine: Option<EngineArg>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Launch,
    Native,
}

impl From<EngineArg> for EngineKind {
    fn from(value: EngineArg) -> Self {
        match value {
            EngineArg::Launch => EngineKind::Launch,
            EngineArg::Native => EngineKind::Native,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Escalate batch sizes until a batch fails (default)")]
    Sweep(bench::SweepArgs),
    #[command(about = "Run a single batch of concurrent streams")]
    Batch(bench::BatchArgs),
    #[command(about = "Run one-shot ffmpeg encoder tests")]
    Probe(probe::ProbeArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return ExitCode::SUCCESS;
    }
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the selected benchmark succeeded overall.
fn run(cli: Cli) -> Result<bool> {
    let loaded = load_config(cli.config.as_deref())?;
    let mut config = loaded.config;
    if let Some(engine) = cli.engine {
        config.pipeline.engine = engine.into();
    }
    init_tracing("encbench", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using built-in defaults"),
    }

    match cli
        .command
        .unwrap_or_else(|| Commands::Sweep(bench::SweepArgs::default()))
    {
        Commands::Sweep(args) => bench::run_sweep(config, args),
        Commands::Batch(args) => bench::run_batch(config, args),
        Commands::Probe(args) => probe::run(config, args),
    }
}

/// `--config` wins over `ENCBENCH_CONFIG`, which wins over the default path.
fn load_config(explicit: Option<&Path>) -> Result<LoadedAppConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        return Ok(LoadedAppConfig {
            config: AppConfig::from_path(path)?,
            source: Some(path.to_path_buf()),
        });
    }
    AppConfig::load_with_source(&[PathBuf::from(DEFAULT_CONFIG_PATH)])
}
