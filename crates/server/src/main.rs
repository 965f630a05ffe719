//! Scout Server
//!
//! Axum server exposing the research pipeline over HTTP, with live progress
//! relayed to WebSocket observers. `scout run` drives one task from the
//! terminal without a server.

mod api;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scout_core::llm::ChatCompletionsModel;
use scout_core::relay::ProgressRelay;
use scout_core::swarm::{Coordinator, NoopSink, SnapshotSink, SqliteSnapshotStore, TaskStatus};
use scout_core::ScoutConfig;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::broadcast};
use tracing_subscriber::EnvFilter;

use crate::config::PersistedConfig;

#[derive(Parser, Clone)]
#[command(author, version, about = "Scout - Multi-agent company research")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Scout server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Research one company in the terminal (no server)
    Run {
        /// Company to research
        subject: String,
        /// Print the final task snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,scout_core=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn snapshot_sink() -> Arc<dyn SnapshotSink> {
    match SqliteSnapshotStore::open() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(error = %e, "snapshot store unavailable, final snapshots will not be kept");
            Arc::new(NoopSink)
        }
    }
}

fn build_coordinator(config: &ScoutConfig) -> anyhow::Result<Arc<Coordinator>> {
    let llm = ChatCompletionsModel::from_env(config.model.clone())
        .with_context(|| format!("Failed to configure {} model", config.model.provider.display_name()))?;
    config.build_coordinator(Arc::new(llm), snapshot_sink())
}

async fn serve(config: ScoutConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&config)?;
    let relay = ProgressRelay::new(coordinator.clone(), config.relay.clone());
    let app = api::router(api::AppState::new(coordinator, relay));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    tracing::info!(%addr, "scout server listening");
    tracing::info!("research: /api/v1/research, /:id, /:id/result, /:id/cancel, /:id/ws");
    tracing::info!("settings: /api/v1/config, /providers, /agents, /tools, /openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_once(config: ScoutConfig, subject: &str, json: bool) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&config)?;
    let task_id = uuid::Uuid::new_v4().to_string();

    // Subscribe before starting so the first event is not missed
    let mut events = coordinator
        .bus()
        .subscribe(&task_id)
        .context("event bus unavailable")?;
    coordinator.start_with_id(&task_id, subject).await?;

    loop {
        match events.recv().await {
            Ok(event) => {
                eprintln!("[{:>3}%] {:<22} {}", event.progress, event.stage_name, event.message);
                if event.is_terminal() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "progress output fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    drop(events);
    coordinator.bus().release(&task_id);

    let task = coordinator
        .wait(&task_id)
        .await
        .context("task disappeared before finishing")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
    } else if let Some(report) = task.report() {
        println!("{}", report.report_markdown);
    }

    match (task.status, &task.error) {
        (TaskStatus::Completed, _) => Ok(()),
        (_, Some(error)) => anyhow::bail!("research {}: {}", task.status.as_str(), error.message),
        (status, None) => anyhow::bail!("research {}", status.as_str()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    dotenvy::from_filename(".scout/.env").ok();
    init_tracing();

    let args = Args::parse();
    let config = PersistedConfig::load().await.to_runtime();

    match args.command {
        Some(CliCommand::Run { subject, json }) => run_once(config, &subject, json).await,
        Some(CliCommand::Serve { port, host }) => serve(config, &host, port).await,
        None => serve(config, "127.0.0.1", 8080).await,
    }
}
