mod dispatcher;
mod translate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use tracing_subscriber::EnvFilter;

use dispatcher::Dispatcher;
use trm_core::config::load_config;

/// Iterative code-refinement controller: reads newline-delimited JSON
/// requests on stdin, writes newline-delimited JSON responses on stdout.
#[derive(Parser, Debug)]
#[command(name = "trm-server", version, about)]
struct Cli {
    /// Path to a TOML file of process-wide defaults. Missing file -> built-in defaults.
    #[arg(long, default_value = "trm.toml")]
    config: PathBuf,

    /// Overrides the config file's logging level (trace/debug/info/warn/error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(log_level);

    tracing::info!(config_path = %cli.config.display(), log_level, "trm-server starting");

    let dispatcher = Arc::new(Dispatcher::new(config.defaults));
    serve_stdio(dispatcher).await
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Drives the newline-delimited JSON request/response loop over stdin/stdout.
///
/// Each line is a `{"op": "...", "args": {...}}` request; each response is
/// written as one JSON line, `{"ok": true, "result": ...}` or `{"ok": false,
/// "error": "..."}`. Every request is dispatched on its own task so a slow
/// operation (a long-running probe) never blocks unrelated sessions from
/// making progress; completions may therefore interleave out of order
/// relative to each other, though never within a single session. Stdout
/// writes are serialized behind a mutex so two concurrent completions never
/// interleave their bytes mid-line. Exits cleanly on EOF or Ctrl-C.
async fn serve_stdio(dispatcher: Arc<Dispatcher>) -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = Arc::new(AsyncMutex::new(tokio::io::stdout()));
    let mut lines = BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let dispatcher = dispatcher.clone();
                        let stdout = stdout.clone();
                        tokio::spawn(async move {
                            let response = handle_line(&dispatcher, &line).await;
                            write_response(&stdout, &response).await;
                        });
                    }
                    None => {
                        tracing::info!("stdin closed, shutting down");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl-C, shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return json!({"ok": false, "error": format!("invalid JSON request: {e}")}),
    };

    let Some(op) = request.get("op").and_then(Value::as_str) else {
        return json!({"ok": false, "error": "missing required field: op"});
    };
    let args = request.get("args").cloned().unwrap_or_else(|| json!({}));

    dispatcher.dispatch(op, args).await
}

async fn write_response(stdout: &AsyncMutex<tokio::io::Stdout>, response: &Value) {
    let mut line = match serde_json::to_string(response) {
        Ok(s) => s,
        Err(e) => json!({"ok": false, "error": format!("failed to serialize response: {e}")}).to_string(),
    };
    line.push('\n');

    let mut guard = stdout.lock().await;
    if let Err(e) = guard.write_all(line.as_bytes()).await {
        tracing::warn!(error = %e, "failed to write response to stdout");
        return;
    }
    if let Err(e) = guard.flush().await {
        tracing::warn!(error = %e, "failed to flush stdout");
    }
}
