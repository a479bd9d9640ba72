//! NOMAD — mobile agent platform CLI
//!
//! Usage:
//!   nomad place --port 9001
//!   nomad inject uw1-320-10 9001 TestAgent uw1-320-11 uw1-320-12
//!   nomad inject uw1-320-10 9001 test-agent uw1-320-11 uw1-320-12 --artifact scripts/test-agent.json
//!   nomad demo --agents 2

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nomad_contracts::{
    artifact::CodeArtifact,
    error::{NomadError, NomadResult},
};
use nomad_core::PlaceEvent;
use nomad_place::{inject, instantiate, HttpTransport, Place, PlaceConfig, PlaceServer};
use nomad_ref_agents::{catalog, run_tour, TourOptions};

// ── CLI definition ────────────────────────────────────────────────────────────

/// NOMAD — agents that carry their state from node to node.
#[derive(Parser)]
#[command(
    name = "nomad",
    about = "NOMAD mobile agent platform",
    long_about = "Runs a Place node, injects agents into running nodes, or runs the\n\
                  three-node tour inside one process."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Place node serving POST /place.
    Place {
        /// TOML configuration file. Flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Host name used for mailbox slots and logs.
        #[arg(long)]
        host_name: Option<String>,
        /// Socket address to listen on.
        #[arg(long)]
        listen: Option<SocketAddr>,
        /// Port to listen on, keeping the configured interface.
        #[arg(long, conflicts_with = "listen")]
        port: Option<u16>,
        /// Address other nodes reach this one by.
        #[arg(long)]
        advertise_address: Option<String>,
    },
    /// Inject a new agent into the Place at HOST:PORT.
    Inject {
        host: String,
        port: u16,
        /// Built-in type or script name.
        agent: String,
        /// Arguments handed to the new agent.
        args: Vec<String>,
        /// Agent script to ship with the agent.
        #[arg(long)]
        artifact: Option<PathBuf>,
        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,
    },
    /// Run the three-node tour in this process and print what happens.
    Demo {
        #[arg(long, default_value_t = 2)]
        agents: usize,
        /// Tour with the shipped script instead of the built-in TestAgent.
        #[arg(long)]
        scripted: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A node logs its traffic by default; one-shot commands stay quiet.
    let default_filter = match cli.command {
        Command::Place { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .compact()
        .init();

    let result = match cli.command {
        Command::Place { config, host_name, listen, port, advertise_address } => {
            run_place(config, host_name, listen, port, advertise_address).await
        }
        Command::Inject { host, port, agent, args, artifact, timeout_ms } => {
            run_inject(host, port, agent, args, artifact, timeout_ms).await
        }
        Command::Demo { agents, scripted } => run_demo(agents, scripted).await,
    };

    if let Err(e) = result {
        eprintln!("nomad: {}", e);
        std::process::exit(1);
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

async fn run_place(
    config: Option<PathBuf>,
    host_name: Option<String>,
    listen: Option<SocketAddr>,
    port: Option<u16>,
    advertise_address: Option<String>,
) -> NomadResult<()> {
    let mut config = match config {
        Some(path) => PlaceConfig::from_file(&path)?,
        None => PlaceConfig::default(),
    };
    if let Some(host_name) = host_name {
        config.host_name = host_name;
    }
    if let Some(listen) = listen {
        config.listen = listen;
    }
    if let Some(port) = port {
        config.listen.set_port(port);
    }
    if let Some(advertise_address) = advertise_address {
        config.advertise_address = advertise_address;
    }

    let transport = Arc::new(HttpTransport::new(config.transfer_timeout())?);
    let place = Place::new(config.clone(), catalog(), transport)?;
    let server = PlaceServer::bind(Arc::clone(&place), config.listen).await?;
    println!("Place is ready to accept agents on {}", server.local_addr()?);

    tokio::spawn(print_console(place));

    server
        .serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await
}

async fn run_inject(
    host: String,
    port: u16,
    agent: String,
    args: Vec<String>,
    artifact: Option<PathBuf>,
    timeout_ms: u64,
) -> NomadResult<()> {
    let artifact = match artifact {
        Some(path) => {
            let blob = std::fs::read(&path).map_err(|e| NomadError::Io {
                reason: format!("failed to read artifact '{}': {}", path.display(), e),
            })?;
            Some(CodeArtifact::new(agent.as_str(), blob))
        }
        None => None,
    };

    let (header, body) = instantiate(&catalog(), &agent, args, artifact.as_ref())?;
    let transport = HttpTransport::new(Duration::from_millis(timeout_ms))?;
    let destination = format!("{}:{}", host, port);
    let delivered = inject(&transport, &destination, artifact.as_ref(), header, body).await?;

    println!("{} injected into {}", agent, delivered);
    Ok(())
}

async fn run_demo(agents: usize, scripted: bool) -> NomadResult<()> {
    print_banner();
    let options = TourOptions { agents, scripted, ..TourOptions::default() };
    let log = run_tour(options).await?;

    for event in &log {
        if let Some(line) = describe(event) {
            println!("{}", line);
        }
    }
    println!();
    println!("Tour completed: {} agent(s), {} event(s).", agents, log.len());
    Ok(())
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Echo agents' console lines, the way a node's terminal shows them.
async fn print_console(place: Arc<Place>) {
    let mut events = place.subscribe();
    drop(place);
    loop {
        match events.recv().await {
            Ok(PlaceEvent::Said { text, .. }) => println!("{}", text),
            Ok(PlaceEvent::Failed { agent_id, entry_point, reason, .. }) => {
                println!("agent({}) failed in {}: {}", agent_id, entry_point, reason)
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "console fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn describe(event: &PlaceEvent) -> Option<String> {
    match event {
        PlaceEvent::Launched { host, agent_id, entry_point, inbox, .. } => Some(format!(
            "[{}] agent({}) arrived for {} with {} message(s) waiting",
            host,
            agent_id,
            entry_point,
            inbox.len()
        )),
        PlaceEvent::Said { host, text, .. } => Some(format!("[{}]   {}", host, text)),
        PlaceEvent::Departed { host, agent_id, destination, .. } => Some(format!(
            "[{}] agent({}) hopped to {}",
            host,
            agent_id.map_or_else(|| "?".to_string(), |id| id.to_string()),
            destination
        )),
        PlaceEvent::Completed { host, agent_id, .. } => {
            Some(format!("[{}] agent({}) finished", host, agent_id))
        }
        PlaceEvent::Failed { host, agent_id, reason, .. } => {
            Some(format!("[{}] agent({}) failed: {}", host, agent_id, reason))
        }
        PlaceEvent::Rejected { host, code_identity, rejection } => {
            Some(format!("[{}] rejected {}: {}", host, code_identity, rejection.reason))
        }
    }
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("NOMAD — Mobile Agent Platform");
    println!("Three-node tour");
    println!("=============================");
    println!();
    println!("Each agent is injected at uw1-320-10 and then:");
    println!("  [1] init  runs at uw1-320-10, hops to uw1-320-11 with \"Hello!\"");
    println!("  [2] step  runs at uw1-320-11, reads the mailbox, hops to uw1-320-12 with \"Oi!\"");
    println!("  [3] jump  runs at uw1-320-12 and reads the mailbox");
    println!();
}
