use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use slicknxt_core::config::AppConfig;
use slicknxt_core::event::EventBus;
use slicknxt_core::port::PortDirection;
use slicknxt_core::types::{FlowDescription, InputEvent};
use slicknxt_engine::registry::CompareMode;
use slicknxt_engine::{scheduler, Engine, FlowExecutor, Graph, LoggingMotorDriver, NodeKind};
use slicknxt_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "slicknxt", version, about = "Tick-based dataflow engine for NXT-style flows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "slicknxt.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine and the HTTP/WebSocket gateway until Ctrl-C
    Serve {
        /// Flow file loaded at boot (overrides engine.flow_file)
        #[arg(long)]
        flow: Option<PathBuf>,
        /// Start evaluating immediately
        #[arg(long)]
        start: bool,
    },
    /// Evaluate a flow for a fixed number of ticks and print the last snapshot
    Run {
        /// Flow description (JSON)
        flow: PathBuf,
        /// Number of ticks to evaluate
        #[arg(long, default_value = "1")]
        ticks: u64,
        /// External input applied before the first tick, as node.port=value
        #[arg(long = "input", value_parser = parse_input)]
        inputs: Vec<InputEvent>,
    },
    /// Check that a flow builds and can be scheduled
    Validate {
        /// Flow description (JSON)
        flow: PathBuf,
    },
    /// List node types and their ports
    Nodes,
    /// Show the effective configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// `node.port=value`, where value is JSON (`true`, `42`) or a bare string.
fn parse_input(s: &str) -> Result<InputEvent, String> {
    let (target, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected node.port=value, got '{s}'"))?;
    let (node, port) = target
        .rsplit_once('.')
        .ok_or_else(|| format!("expected node.port before '=', got '{target}'"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::from(raw));
    Ok(InputEvent::new(node, port, value))
}

fn load_flow(path: &Path) -> anyhow::Result<FlowDescription> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading flow file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing flow file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("slicknxt=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "slicknxt", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve { flow, start } => serve(config, flow, start).await?,
        Commands::Run {
            flow,
            ticks,
            inputs,
        } => run_headless(&config, &flow, ticks, inputs)?,
        Commands::Validate { flow } => validate(&flow)?,
        Commands::Nodes => print_nodes(),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

async fn serve(config: AppConfig, flow: Option<PathBuf>, start: bool) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let event_bus = Arc::new(EventBus::new(config.engine.event_capacity));
    let (engine, handle) = Engine::new(
        &config.engine,
        event_bus,
        Box::new(LoggingMotorDriver::new()),
        cancel.clone(),
    );
    let engine_task = tokio::spawn(engine.run());

    if let Some(path) = flow.or_else(|| config.engine.flow_file.clone()) {
        let desc = load_flow(&path)?;
        handle.replace_flow(desc).await?;
        info!(path = %path.display(), "Flow loaded");
    }
    if start || config.engine.autostart {
        handle.start().await?;
    }

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        cancel_clone.cancel();
    });

    let server = GatewayServer::new(config.gateway.clone(), handle);
    let result = server.run(cancel.clone()).await;
    cancel.cancel();
    if let Err(e) = engine_task.await {
        warn!(error = %e, "Engine task ended abnormally");
    }
    result
}

fn run_headless(
    config: &AppConfig,
    path: &Path,
    ticks: u64,
    inputs: Vec<InputEvent>,
) -> anyhow::Result<()> {
    let desc = load_flow(path)?;
    let mut executor = FlowExecutor::with_flow(config.engine.tick_interval(), &desc)?;
    for event in &inputs {
        executor.apply_input(event)?;
    }

    executor.start();
    for _ in 0..ticks {
        let report = executor.tick();
        for (event, err) in &report.rejected {
            warn!(node = %event.node_id, error = %err, "Input rejected");
        }
        if let Err(cycle) = report.outcome {
            error!(error = %cycle, "Evaluation stopped");
            return Err(cycle.into());
        }
    }
    executor.stop();

    match executor.last_snapshot() {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?),
        None => println!("null"),
    }
    Ok(())
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let desc = load_flow(path)?;
    let graph = Graph::from_description(&desc)?;
    println!(
        "{}: {} nodes, {} edges",
        path.display(),
        graph.node_count(),
        graph.edge_count()
    );
    let order = scheduler::topological_order(&graph)?;
    println!("Evaluation order: {}", order.join(" -> "));
    Ok(())
}

fn print_nodes() {
    let describe = |kind: NodeKind, dir: PortDirection| {
        kind.ports(dir)
            .iter()
            .map(|p| format!("{}:{}", p.name, p.port_type))
            .collect::<Vec<_>>()
            .join(", ")
    };
    for kind in NodeKind::ALL {
        println!("{:<20} {}", kind.type_tag(), kind.label());
        println!("    in:  {}", describe(kind, PortDirection::Input));
        println!("    out: {}", describe(kind, PortDirection::Output));
        let fields: Vec<String> = kind
            .fields()
            .iter()
            .map(|f| format!("{}={}{}", f.name, f.default, if f.writable { "" } else { " (fixed)" }))
            .collect();
        if !fields.is_empty() {
            println!("    fields: {}", fields.join(", "));
        }
        if kind == NodeKind::Comparator {
            println!("    mode: {} (one of >, <, ==)", CompareMode::default());
        }
    }
}
