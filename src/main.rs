//! CLI entry point for the HTTP bridge.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use http_bridge::{CallFailure, ErrorKind, HttpBridge};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::{Args, Command};

/// One line of `stdin` mode input.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries call results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = app_config::load_file_config(args.config.as_deref())?;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let settings = file_config
        .merged_with(flag_overrides(&args))
        .into_settings(&cwd)?;

    let bridge = HttpBridge::new(&settings.config, Arc::new(settings.directories))
        .context("Failed to initialize bridge")?;
    let bridge = Arc::new(bridge);

    match args.command {
        Command::Call { method, params } => run_call(&bridge, &method, params.as_deref()).await,
        Command::Stdin => run_stdin(bridge).await,
    }
}

fn flag_overrides(args: &Args) -> FileConfig {
    FileConfig {
        server_url: args.server_url.clone(),
        base_dir: args.base_dir.clone(),
        cookie_store: args.cookie_store.clone(),
        connect_timeout_secs: args.connect_timeout,
        read_timeout_secs: args.read_timeout,
        max_redirects: args.max_redirects,
        ..FileConfig::default()
    }
}

async fn run_call(bridge: &HttpBridge, method: &str, params: Option<&str>) -> Result<ExitCode> {
    let params = match params {
        Some(raw) => serde_json::from_str(raw).context("Call parameters must be valid JSON")?,
        None => Value::Null,
    };

    match bridge.call(method, &params).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            println!("{}", serde_json::to_string_pretty(&json!({ "error": failure }))?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Answers JSON-line calls until stdin closes. Calls run concurrently, so
/// replies may arrive out of order; callers match them by `id`.
async fn run_stdin(bridge: Arc<HttpBridge>) -> Result<ExitCode> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut calls = JoinSet::new();
    let mut answered = 0_usize;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        // long sessions must not accumulate finished task results
        answered += reap_finished(&mut calls)?;
        if line.trim().is_empty() {
            continue;
        }
        let bridge = Arc::clone(&bridge);
        let tx = tx.clone();
        calls.spawn(async move {
            let reply = answer(&bridge, &line).await;
            if tx.send(reply.to_string()).is_err() {
                warn!("stdout closed, dropping reply");
            }
        });
    }

    while let Some(joined) = calls.join_next().await {
        joined.context("Call task panicked")?;
        answered += 1;
    }
    drop(tx);
    writer
        .await
        .context("stdout writer task failed")?
        .context("Failed to write to stdout")?;

    info!(calls = answered, "stdin closed");
    Ok(ExitCode::SUCCESS)
}

/// Removes calls that already finished without waiting for the rest.
fn reap_finished(calls: &mut JoinSet<()>) -> Result<usize> {
    let mut reaped = 0;
    while let Some(joined) = calls.try_join_next() {
        joined.context("Call task panicked")?;
        reaped += 1;
    }
    Ok(reaped)
}

async fn answer(bridge: &HttpBridge, line: &str) -> Value {
    let envelope = match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            let failure = CallFailure {
                kind: ErrorKind::Validation,
                message: format!("Malformed call line: {e}"),
            };
            return json!({ "id": Value::Null, "error": failure });
        }
    };

    match bridge.call(&envelope.method, &envelope.params).await {
        Ok(result) => json!({ "id": envelope.id, "result": result }),
        Err(failure) => json!({ "id": envelope.id, "error": failure }),
    }
}
