//! calmcp - calendar and reminder tools over a JSON line protocol
//!
//! Reads one request per line on stdin:
//!   {"tool": "list_events", "arguments": {...}}
//! and writes one response per line on stdout:
//!   {"content": "...", "is_error": false}
//!
//! Logs go to stderr.

mod config;

use anyhow::{Context, Result};
use calmcp_core::protocol::{ToolRequest, ToolResponse};
use calmcp_core::store::CalendarStore;
use calmcp_core::{Engine, FileStore, call_tool};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "calmcp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store file, overriding `store_path` from the configuration
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let config = ServerConfig::load(args.config.as_deref())?;
    let settings = config.engine_settings()?;
    let store_path = args.store.unwrap_or_else(|| config.store_path());

    let store = FileStore::open(&store_path, config.consent())
        .with_context(|| format!("Failed to open store at {}", store_path.display()))?;
    let engine = Engine::new(store, settings);

    tracing::info!(
        store = %store_path.display(),
        "Starting calmcp v{}",
        env!("CARGO_PKG_VERSION")
    );

    serve(&engine, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

fn init_logging(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Answer every request line until the input closes.
async fn serve<S, R, W>(engine: &Engine<S>, input: R, mut output: W) -> Result<()>
where
    S: CalendarStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(engine, &line).await;

        output
            .write_all(format!("{}\n", response.to_line()).as_bytes())
            .await
            .context("Failed to write response")?;
        output.flush().await.context("Failed to flush stdout")?;
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}

async fn handle_line<S: CalendarStore>(engine: &Engine<S>, line: &str) -> ToolResponse {
    let request: ToolRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed request line");
            return ToolResponse::error(&format!("Failed to parse request: {e}"));
        }
    };

    tracing::debug!(tool = %request.tool, "Handling request");
    call_tool(engine, &request.tool, &request.arguments).await.into()
}
