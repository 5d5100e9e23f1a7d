use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

/// A CLI for semi-honest Multi-Party Computation using the BGW protocol.
#[derive(Debug, Parser)]
#[command(name = "bgw")]
pub struct Cli {
    /// Increases the verbosity of the diagnostics, can be repeated (overridden by RUST_LOG).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Runs all parties of a circuit as tasks of this process.
    Simulate {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Runs all parties of a circuit as separate processes, connected over TCP.
    Run {
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        net: NetArgs,
    },
    /// Runs a single party, usually started by `run`.
    #[command(arg_required_else_help = true)]
    Party {
        /// The id of this party, between 1 and the number of parties of the circuit.
        #[arg(long)]
        party: usize,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        net: NetArgs,
    },
}

/// Settings shared by all ways of running a circuit.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// The example circuit to evaluate (1 to 8).
    #[arg(short, long, default_value_t = 1)]
    pub circuit: usize,
    /// Seeds the randomness of party `p` with `seed + p`, for repeatable runs.
    #[arg(long)]
    pub seed: Option<u64>,
    /// All parties are stopped after this many seconds.
    #[arg(long, default_value = "5", value_parser = parse_secs)]
    pub max_time: Duration,
}

/// Settings of the TCP transport.
#[derive(Debug, Clone, Args)]
pub struct NetArgs {
    /// Party `p` listens on port `base_port + p`.
    #[arg(long, default_value_t = 12340)]
    pub base_port: u16,
    /// Seconds each party waits for the others to start listening before connecting to them.
    #[arg(long, default_value = "2", value_parser = parse_secs)]
    pub sync_delay: Duration,
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("{s} is not a valid number of seconds"))
}
