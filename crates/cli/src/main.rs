//! procwatch CLI - Command-line interface for the procwatch daemon

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use procwatch_core::domain::{LifecycleEvent, LifecycleState, MetricSample, SupervisorConfig, TargetStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8090";

#[derive(Parser)]
#[command(name = "procwatch")]
#[command(about = "procwatch process supervisor CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "PROCWATCH_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every target with live telemetry
    Status,

    /// Start a target
    Start { id: String },

    /// Stop a target (also turns auto-restart off)
    Stop { id: String },

    /// Start every target in configuration order
    StartAll,

    /// Stop every target in reverse order and disable auto-restart
    StopAll,

    /// Turn auto-restart on or off
    AutoRestart { id: String, mode: Toggle },

    /// Show CPU/memory history
    Metrics {
        id: String,

        /// Window in seconds (max 3600)
        #[arg(short, long, default_value = "60")]
        window: usize,
    },

    /// Show lifecycle events
    Events,

    /// Tail a target's log
    Logs {
        id: String,

        /// Number of lines to tail (1-500)
        #[arg(short = 'n', long, default_value = "30")]
        lines: usize,
    },

    /// Show or replace the configuration document
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the active configuration as JSON
    Get,
    /// Validate, apply and persist a configuration file
    Replace { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct TargetList {
    targets: Vec<TargetStatus>,
}

#[derive(Deserialize)]
struct TargetResult {
    target: TargetStatus,
}

#[derive(Deserialize)]
struct BatchResult {
    succeeded: Vec<String>,
    errors: BTreeMap<String, String>,
    partial_failure: bool,
}

#[derive(Deserialize)]
struct MetricsResult {
    samples: Vec<MetricSample>,
}

#[derive(Deserialize)]
struct EventsResult {
    events: Vec<LifecycleEvent>,
}

#[derive(Deserialize)]
struct TailResult {
    log_path: Option<String>,
    lines: Vec<String>,
}

#[derive(Deserialize)]
struct ConfigResult {
    config: SupervisorConfig,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "PID")]
    pid: String,
    #[tabled(rename = "CPU %")]
    cpu: String,
    #[tabled(rename = "MEM MB")]
    memory: String,
    #[tabled(rename = "THREADS")]
    threads: u32,
    #[tabled(rename = "RESTARTS")]
    restarts: u32,
    #[tabled(rename = "AUTO")]
    auto_restart: &'static str,
}

impl From<&TargetStatus> for StatusRow {
    fn from(s: &TargetStatus) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            state: s.state.to_string(),
            pid: if s.pid == 0 { "-".into() } else { s.pid.to_string() },
            cpu: format!("{:.1}", s.cpu),
            memory: format!("{:.1}", s.memory_mb),
            threads: s.threads,
            restarts: s.restart_count,
            auto_restart: if s.auto_restart { "on" } else { "off" },
        }
    }
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "CPU %")]
    cpu: String,
    #[tabled(rename = "MEM MB")]
    memory: String,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "TIME")]
    time: String,
    #[tabled(rename = "TARGET")]
    target: String,
    #[tabled(rename = "EVENT")]
    kind: String,
}

fn format_time(epoch_ms: i64) -> String {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn call<T: serde::de::DeserializeOwned>(
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> Result<T> {
    let result = call_rpc(url, method, params).await?;
    serde_json::from_value(result).context("Unexpected response shape")
}

fn print_batch(action: &str, batch: BatchResult) {
    for id in &batch.succeeded {
        println!("  {} {}", "✓".green(), id);
    }
    for (id, err) in &batch.errors {
        println!("  {} {}: {}", "✗".red(), id, err);
    }
    println!();
    if batch.partial_failure {
        println!(
            "{}",
            format!("{} finished with {} failure(s)", action, batch.errors.len())
                .yellow()
                .bold()
        );
    } else {
        println!("{}", format!("✓ {} complete", action).green().bold());
    }
}

fn print_target(message: &str, target: &TargetStatus) {
    println!("{}", message.green().bold());
    println!();
    println!("{}", Table::new(vec![StatusRow::from(target)]));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let url = cli.rpc_url.as_str();

    match cli.command {
        Commands::Status => {
            let list: TargetList = call(url, "targets.list.v1", json!({})).await?;
            if list.targets.is_empty() {
                println!("{}", "No targets configured".yellow());
            } else {
                let rows: Vec<StatusRow> = list.targets.iter().map(StatusRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Start { id } => {
            let result: TargetResult = call(url, "targets.start.v1", json!({ "id": id })).await?;
            print_target(&format!("✓ {} started", id), &result.target);
        }

        Commands::Stop { id } => {
            let result: TargetResult = call(url, "targets.stop.v1", json!({ "id": id })).await?;
            let message = if result.target.state == LifecycleState::Stopping {
                format!("✓ {} stopping", id)
            } else {
                format!("✓ {} stopped", id)
            };
            print_target(&message, &result.target);
        }

        Commands::StartAll => {
            let batch: BatchResult = call(url, "targets.start_all.v1", json!({})).await?;
            print_batch("start-all", batch);
        }

        Commands::StopAll => {
            let batch: BatchResult = call(url, "targets.stop_all.v1", json!({})).await?;
            print_batch("stop-all", batch);
        }

        Commands::AutoRestart { id, mode } => {
            let enabled = matches!(mode, Toggle::On);
            let result: TargetResult = call(
                url,
                "targets.auto_restart.v1",
                json!({ "id": id, "enabled": enabled }),
            )
            .await?;
            let message = format!(
                "✓ auto-restart {} for {}",
                if enabled { "enabled" } else { "disabled" },
                id
            );
            print_target(&message, &result.target);
        }

        Commands::Metrics { id, window } => {
            let result: MetricsResult = call(
                url,
                "targets.metrics.v1",
                json!({ "id": id, "window_secs": window }),
            )
            .await?;
            if result.samples.is_empty() {
                println!("{}", "No samples yet".yellow());
            } else {
                let rows: Vec<MetricRow> = result
                    .samples
                    .iter()
                    .map(|s| MetricRow {
                        time: format_time(s.timestamp_ms),
                        cpu: format!("{:.1}", s.cpu),
                        memory: format!("{:.1}", s.mem_mb),
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Events => {
            let result: EventsResult = call(url, "events.list.v1", json!({})).await?;
            if result.events.is_empty() {
                println!("{}", "No events recorded".yellow());
            } else {
                let rows: Vec<EventRow> = result
                    .events
                    .iter()
                    .map(|e| EventRow {
                        time: format_time(e.timestamp_ms),
                        target: format!("{} ({})", e.target_name, e.target_id),
                        kind: e.kind.to_string(),
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Logs { id, lines } => {
            let result: TailResult =
                call(url, "logs.tail.v1", json!({ "id": id, "lines": lines })).await?;
            match result.log_path {
                Some(path) => println!("{}", format!("==> {} <==", path).cyan().bold()),
                None => println!("{}", format!("{} is a service; no log captured", id).yellow()),
            }
            for line in result.lines {
                println!("{}", line);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Get => {
                let result: ConfigResult = call(url, "config.get.v1", json!({})).await?;
                println!("{}", serde_json::to_string_pretty(&result.config)?);
            }
            ConfigAction::Replace { file } => {
                let text = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let config: SupervisorConfig =
                    serde_json::from_str(&text).context("Invalid configuration JSON")?;
                let result: ConfigResult =
                    call(url, "config.replace.v1", json!({ "config": config })).await?;
                println!(
                    "{}",
                    format!("✓ Configuration replaced ({} targets)", result.config.targets.len())
                        .green()
                        .bold()
                );
            }
        },
    }

    Ok(())
}
