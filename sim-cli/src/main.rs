//! ledger-sim: drive the contract simulator from the command line

mod config;
mod logging;
mod scenario;
mod workload;

use clap::{Parser, Subcommand};
use config::SimConfig;
use logging::{init_logging, LogFormat};
use serde::Serialize;
use sim_vm::InvariantPolicy;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ledger-sim", about = "Ledger and contract execution simulator")]
struct Cli {
    /// Path to a TOML configuration file. CLI flags override its values.
    #[arg(long, env = "LEDGER_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "LEDGER_SIM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Number of external accounts.
    #[arg(long)]
    accounts: Option<u64>,

    /// Keep running scripts after a contract invariant breaks.
    #[arg(long)]
    absorb_invariant_violations: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a fixed demonstration scenario.
    Scenario {
        #[command(subcommand)]
        which: ScenarioKind,
    },
    /// Run a seeded random workload across worker threads.
    Random {
        /// Number of calls to generate.
        #[arg(long)]
        calls: Option<usize>,

        /// Worker threads.
        #[arg(long)]
        threads: Option<usize>,

        /// RNG seed.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ScenarioKind {
    /// Delegated vote on the configured proposals.
    Ballot,
    /// Three bids, refunds and the auction end.
    Auction,
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(accounts) = self.accounts {
            config.accounts = accounts;
        }
        if self.absorb_invariant_violations {
            config.invariant_policy = InvariantPolicy::Absorb;
        }
        if let Command::Random {
            calls,
            threads,
            seed,
        } = &self.command
        {
            config.calls = calls.unwrap_or(config.calls);
            config.threads = threads.unwrap_or(config.threads);
            config.seed = seed.unwrap_or(config.seed);
        }

        config.validate()?;
        Ok(config)
    }
}

fn report<T: Serialize>(summary: &T, passed: bool) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    if passed {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Post-run checks failed");
        Ok(ExitCode::FAILURE)
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.log_format, &config.log_level)?;

    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Command::Scenario {
            which: ScenarioKind::Ballot,
        } => {
            let summary = scenario::run_ballot(&config)?;
            report(&summary, summary.passed())
        }
        Command::Scenario {
            which: ScenarioKind::Auction,
        } => {
            let summary = scenario::run_auction(&config)?;
            report(&summary, summary.passed())
        }
        Command::Random { .. } => {
            let summary = workload::run_random(&config)?;
            report(&summary, summary.passed())
        }
    }
}
