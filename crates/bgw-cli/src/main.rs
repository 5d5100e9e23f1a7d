use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
    process::Stdio,
};

use anyhow::{Context, Error, anyhow, bail};
use bgw::{
    config::Config,
    fixtures::{self, Fixture},
    protocol::{mpc, simulate},
};
use clap::Parser;
use futures::future::join_all;
use tokio::{net::TcpListener, process::Command, time::timeout};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Cli, Commands, NetArgs, RunArgs},
    tcp::TcpChannel,
};

mod cli;
mod tcp;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Cli::parse();
    init_tracing(args.verbose);
    match args.command {
        Commands::Simulate { run } => {
            let fixture = fixtures::by_number(run.circuit)?;
            info!(circuit = fixture.name, "simulating all parties");
            let outcomes = simulate(&fixture.circuit, &fixture.private_values, &config(&run))
                .await
                .context("simulation failed")?;
            let mut failed = false;
            for (i, outcome) in outcomes.iter().enumerate() {
                println!("party {}: {outcome}", i + 1);
                failed |= !outcome.is_success();
            }
            if failed {
                bail!("the computed secret did not match the expected result");
            }
            Ok(())
        }
        Commands::Run { run, net } => launch(args.verbose, &run, &net).await,
        Commands::Party { party, run, net } => {
            let fixture = fixtures::by_number(run.circuit)?;
            run_party(party, &fixture, &run, &net).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config(run: &RunArgs) -> Config {
    Config {
        seed: run.seed,
        max_time: run.max_time,
    }
}

fn addr(net: &NetArgs, party: usize) -> Result<SocketAddr, Error> {
    let port = usize::from(net.base_port) + party;
    let port = u16::try_from(port).map_err(|_| anyhow!("port {port} is out of range"))?;
    Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
}

async fn run_party(
    party: usize,
    fixture: &Fixture,
    run: &RunArgs,
    net: &NetArgs,
) -> Result<(), Error> {
    let parties = fixture.circuit.parties();
    let own = addr(net, party)?;
    let listener = TcpListener::bind(own)
        .await
        .with_context(|| format!("party {party} could not listen on {own}"))?;
    let peers = (1..=parties)
        .map(|p| addr(net, p))
        .collect::<Result<Vec<_>, _>>()?;
    let channel = TcpChannel::new(party, listener, &peers, net.sync_delay)
        .await
        .with_context(|| format!("party {party} could not connect to the other parties"))?;
    let value = fixture
        .private_values
        .get(party.wrapping_sub(1))
        .copied()
        .ok_or_else(|| anyhow!("circuit '{}' has no party {party}", fixture.name))?;
    let mut rng = config(run).party_rng(party);
    let outcome = timeout(
        run.max_time,
        mpc(&channel, &fixture.circuit, party, value, &mut rng),
    )
    .await
    .map_err(|_| anyhow!("party {party} did not finish within {:?}", run.max_time))??;
    println!("party {party}: {outcome}");
    if !outcome.is_success() {
        bail!("party {party} computed a wrong result");
    }
    Ok(())
}

/// Starts one process per party and stops all of them after the max time.
async fn launch(verbose: u8, run: &RunArgs, net: &NetArgs) -> Result<(), Error> {
    let fixture = fixtures::by_number(run.circuit)?;
    let parties = fixture.circuit.parties();
    let exe = env::current_exe().context("could not locate the executable")?;
    info!(circuit = fixture.name, parties, "starting parties");
    let mut children = Vec::with_capacity(parties);
    for party in 1..=parties {
        let mut cmd = Command::new(&exe);
        if verbose > 0 {
            cmd.arg(format!("-{}", "v".repeat(verbose.into())));
        }
        cmd.arg("party")
            .arg("--party")
            .arg(party.to_string())
            .arg("--circuit")
            .arg(run.circuit.to_string())
            .arg("--max-time")
            .arg(run.max_time.as_secs_f64().to_string())
            .arg("--base-port")
            .arg(net.base_port.to_string())
            .arg("--sync-delay")
            .arg(net.sync_delay.as_secs_f64().to_string());
        if let Some(seed) = run.seed {
            cmd.arg("--seed").arg(seed.to_string());
        }
        let child = cmd
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("could not start party {party}"))?;
        debug!(party, pid = child.id(), "started party");
        children.push(child);
    }
    let all_exited = join_all(children.iter_mut().map(|c| c.wait()));
    let statuses = match timeout(run.max_time, all_exited).await {
        Ok(statuses) => statuses,
        Err(_) => {
            for child in &mut children {
                // the process may already have exited on its own
                let _ = child.start_kill();
            }
            bail!("the parties did not finish within {:?}", run.max_time);
        }
    };
    let mut failed = vec![];
    for (i, status) in statuses.into_iter().enumerate() {
        let status = status.with_context(|| format!("could not wait for party {}", i + 1))?;
        if !status.success() {
            failed.push(i + 1);
        }
    }
    if !failed.is_empty() {
        bail!("parties {failed:?} failed");
    }
    Ok(())
}
