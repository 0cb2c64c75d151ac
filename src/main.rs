use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trellis_core::config::{AppConfig, GraphConfig, NodeConfig, WorkerKind};
use trellis_core::protocol::WireRecord;
use trellis_core::traits::{LlmClient, Worker};
use trellis_core::TrellisError;
use trellis_graph::{EchoWorker, Graph, GraphBuilder, Scheduler};
use trellis_llm::LlmWorker;

#[derive(Parser)]
#[command(name = "trellis", version, about = "Run agent graphs concurrently and stream every node's output")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "trellis.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the graph once on a prompt and print NDJSON records to stdout
    Run {
        /// The task handed to every entry node (read from stdin if empty)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
        /// Replace every worker with the offline echo worker
        #[arg(long)]
        offline: bool,
    },
    /// Validate the configured graph and exit
    Validate,
    /// Start the HTTP gateway
    Serve {
        /// Replace every worker with the offline echo worker
        #[arg(long)]
        offline: bool,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the record stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trellis=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "trellis", &mut io::stdout());
        return Ok(());
    }

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        warn!(path = %cli.config.display(), "No config file found, using defaults");
        AppConfig::default()
    };

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Validate => {
            let graph_config = config.graph_or_default();
            // Workers don't matter for validation.
            let graph = build_graph(&config, &graph_config.with_worker(WorkerKind::Echo))?;
            println!(
                "Graph OK: {} nodes, entry points [{}]",
                graph.len(),
                graph
                    .entry_points()
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Commands::Run { prompt, offline } => {
            let mut text = prompt.join(" ");
            if text.trim().is_empty() {
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            if text.trim().is_empty() {
                anyhow::bail!("no prompt given");
            }

            let scheduler = scheduler_for(&config, offline)?;
            let success = run_once(&scheduler, text).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Serve { offline } => {
            let gateway_config = config.gateway.clone().unwrap_or_default();
            let scheduler = scheduler_for(&config, offline)?;
            info!(bind = %gateway_config.bind, "Starting HTTP gateway");
            let server = trellis_gateway::GatewayServer::new(gateway_config, scheduler);

            let cancel = CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn scheduler_for(config: &AppConfig, offline: bool) -> anyhow::Result<Scheduler> {
    let mut graph_config = config.graph_or_default();
    if offline {
        graph_config = graph_config.with_worker(WorkerKind::Echo);
    }
    let graph = build_graph(config, &graph_config)?;
    Ok(Scheduler::new(Arc::new(graph), config.scheduler.clone()))
}

fn build_graph(config: &AppConfig, graph_config: &GraphConfig) -> anyhow::Result<Graph> {
    // One client shared by every LLM node, created on first use.
    let mut client: Option<Arc<dyn LlmClient>> = None;

    let builder = GraphBuilder::from_config(graph_config, |node| {
        make_worker(config, node, &mut client)
    })?;
    builder.build().context("invalid graph")
}

fn make_worker(
    config: &AppConfig,
    node: &NodeConfig,
    client: &mut Option<Arc<dyn LlmClient>>,
) -> trellis_core::Result<Arc<dyn Worker>> {
    match node.worker {
        WorkerKind::Echo => Ok(Arc::new(EchoWorker::new(node.name.clone()))),
        WorkerKind::Llm => {
            let model = config.model.clone().ok_or_else(|| {
                TrellisError::Config(format!(
                    "node '{}' uses the llm worker but [model] is not configured (try --offline)",
                    node.name
                ))
            })?;
            let shared = match client {
                Some(c) => c.clone(),
                None => {
                    let created = trellis_llm::create_client(&model)?;
                    *client = Some(created.clone());
                    created
                }
            };
            let mut worker = LlmWorker::new(shared, model);
            if let Some(prompt) = &node.system_prompt {
                worker = worker.with_system_prompt(prompt.clone());
            }
            Ok(Arc::new(worker))
        }
    }
}

/// Run the graph once, printing each record as a line of NDJSON.
/// Returns whether the run succeeded.
async fn run_once(scheduler: &Scheduler, task: String) -> anyhow::Result<bool> {
    let mut handle = scheduler.stream(task);

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let stdout = io::stdout();
    while let Some(event) = handle.recv().await {
        let mut out = stdout.lock();
        writeln!(out, "{}", WireRecord::from(&event).to_line()?)?;
        out.flush()?;
    }

    let report = handle.finish().await?;
    info!(
        run_id = %report.run_id,
        status = %report.status,
        elapsed_ms = report.elapsed_ms,
        "Run finished"
    );
    Ok(report.status.is_success())
}
