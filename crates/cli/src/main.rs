//! hooklinectl - command-line client for the Hookline daemon

mod rpc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use colored::Colorize;
use rpc::RpcClient;
use serde::Deserialize;
use serde_json::json;
use std::io::Read;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9631";

#[derive(Parser)]
#[command(name = "hooklinectl")]
#[command(about = "Hookline work-queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "HOOKLINE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Admit a payload into a queue
    Admit {
        /// Queue name
        #[arg(short, long)]
        queue: String,

        /// Producer label stored with the item
        #[arg(short, long, default_value = "cli")]
        source: String,

        /// Payload as JSON string ("-" reads stdin)
        #[arg(long)]
        payload: String,

        /// Retry this many times while the queue is full
        #[arg(long, default_value = "0")]
        retries: u32,
    },

    /// Show a queue's depth
    Depth {
        queue: String,
    },

    /// Show the oldest item without removing it
    Peek {
        queue: String,
    },

    /// Drop every item in a queue
    Flush {
        queue: String,
    },

    /// Inspect and replay dead-lettered items
    #[command(subcommand)]
    Dlq(DlqCommands),

    /// Show system status
    Status,

    /// Run maintenance operations
    Maintenance {
        /// Force VACUUM even if not needed
        #[arg(long)]
        force_vacuum: bool,
    },
}

#[derive(Subcommand)]
enum DlqCommands {
    /// List entries, oldest first
    List {
        #[arg(short, long)]
        queue: Option<String>,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Re-admit entries into their original queue
    #[command(group(ArgGroup::new("target").required(true).args(["id", "queue"])))]
    Replay {
        /// A single entry
        #[arg(long)]
        id: Option<String>,

        /// Oldest entries of this queue
        #[arg(short, long)]
        queue: Option<String>,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Deserialize, Tabled)]
struct AdmitResult {
    item_id: String,
    queue: String,
    depth: u64,
}

#[derive(Deserialize, Tabled)]
struct QueueRow {
    name: String,
    depth: u64,
    max_depth: u64,
    batch_size: usize,
    dead_letters: u64,
}

#[derive(Deserialize)]
struct StatsResult {
    queues: Vec<QueueRow>,
    stored_items: i64,
    dead_letters: i64,
    active_leases: i64,
    db_size_bytes: i64,
    uptime_seconds: u64,
}

#[derive(Deserialize)]
struct ItemView {
    id: String,
    source: String,
    enqueued_at: i64,
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct DeadLetterView {
    id: String,
    queue_name: String,
    original_item: ItemView,
    error_message: String,
    failed_at: i64,
}

#[derive(Tabled)]
struct DeadLetterRow {
    id: String,
    queue: String,
    item_id: String,
    failed_at: String,
    error: String,
}

impl From<DeadLetterView> for DeadLetterRow {
    fn from(view: DeadLetterView) -> Self {
        Self {
            id: view.id,
            queue: view.queue_name,
            item_id: view.original_item.id,
            failed_at: format_millis(view.failed_at),
            error: truncate(&view.error_message, 60),
        }
    }
}

#[derive(Deserialize)]
struct DeadLetterListResult {
    total: u64,
    entries: Vec<DeadLetterView>,
}

#[derive(Deserialize)]
struct ReplayResult {
    replayed: Vec<String>,
    stopped_on_backpressure: bool,
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

fn read_payload(arg: &str) -> Result<serde_json::Value> {
    let raw = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        buf
    } else {
        arg.to_string()
    };
    serde_json::from_str(&raw).context("Invalid JSON payload")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RpcClient::new(cli.rpc_url);

    match cli.command {
        Commands::Admit {
            queue,
            source,
            payload,
            retries,
        } => {
            let params = json!({
                "queue": queue,
                "source": source,
                "payload": read_payload(&payload)?,
            });

            let result = client
                .call_with_retry("ingest.admit.v1", params, retries)
                .await?;
            let admitted: AdmitResult = serde_json::from_value(result)?;

            println!("{}", "✓ Item admitted".green().bold());
            println!();
            println!("{}", Table::new(vec![admitted]));
        }

        Commands::Depth { queue } => {
            let result = client
                .call("queue.depth.v1", json!({ "queue": queue }))
                .await?;
            println!(
                "{} {} / {}",
                format!("{}:", queue).bold(),
                result["depth"],
                result["max_depth"]
            );
        }

        Commands::Peek { queue } => {
            let result = client
                .call("queue.peek.v1", json!({ "queue": queue }))
                .await?;
            match result.get("head").filter(|h| !h.is_null()) {
                Some(head) => {
                    let item: ItemView = serde_json::from_value(head.clone())?;
                    println!("  {} {}", "Item:".bold(), item.id);
                    println!("  {} {}", "Source:".bold(), item.source);
                    println!("  {} {}", "Enqueued:".bold(), format_millis(item.enqueued_at));
                    println!("{}", serde_json::to_string_pretty(&item.payload)?);
                }
                None => println!("{}", format!("Queue {} is empty", queue).yellow()),
            }
        }

        Commands::Flush { queue } => {
            let result = client
                .call("queue.flush.v1", json!({ "queue": queue }))
                .await?;
            println!(
                "{}",
                format!("✓ Flushed {} items from {}", result["removed"], queue)
                    .green()
                    .bold()
            );
        }

        Commands::Dlq(DlqCommands::List { queue, limit }) => {
            let result = client
                .call("deadletter.list.v1", json!({ "queue": queue, "limit": limit }))
                .await?;
            let list: DeadLetterListResult = serde_json::from_value(result)?;

            if list.entries.is_empty() {
                println!("{}", "No dead-letter entries".green());
            } else {
                let shown = list.entries.len();
                let rows: Vec<DeadLetterRow> = list.entries.into_iter().map(Into::into).collect();
                println!("{}", Table::new(rows));
                println!("{} of {} entries", shown, list.total);
            }
        }

        Commands::Dlq(DlqCommands::Replay { id, queue, limit }) => {
            let params = json!({ "entry_id": id, "queue": queue, "limit": limit });
            let result = client.call("deadletter.replay.v1", params).await?;
            let report: ReplayResult = serde_json::from_value(result)?;

            println!(
                "{}",
                format!("✓ Replayed {} entries", report.replayed.len())
                    .green()
                    .bold()
            );
            for entry in &report.replayed {
                println!("  • {}", entry);
            }
            if report.stopped_on_backpressure {
                println!(
                    "{}",
                    "Stopped early: target queue is full, retry later".yellow()
                );
            }
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match client.call("admin.stats.v1", json!({})).await {
                Ok(value) => {
                    let stats: StatsResult = serde_json::from_value(value)?;
                    println!("  {} {}", "RPC URL:".bold(), client.url());
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!("  {} {} seconds", "Uptime:".bold(), stats.uptime_seconds);
                    println!();
                    println!("{}", Table::new(stats.queues));
                    println!();
                    println!("  {} {}", "Stored items:".bold(), stats.stored_items);
                    println!("  {} {}", "Dead letters:".bold(), stats.dead_letters);
                    println!("  {} {}", "Active leases:".bold(), stats.active_leases);
                    let db_mb = stats.db_size_bytes as f64 / (1024.0 * 1024.0);
                    println!("  {} {:.2} MB", "DB Size:".bold(), db_mb);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Maintenance { force_vacuum } => {
            println!("{}", "Running maintenance...".cyan().bold());
            println!();

            if force_vacuum {
                println!("  {} Force VACUUM enabled", "•".bold());
            }

            let params = json!({ "force_vacuum": force_vacuum });

            match client.call("admin.maintenance.v1", params).await {
                Ok(result) => {
                    println!("  ✓ Maintenance completed");
                    println!();
                    if result["vacuum_run"].as_bool().unwrap_or(false) {
                        println!("  {} VACUUM executed", "✓".green());
                    } else {
                        println!("  ○ VACUUM skipped (not needed)");
                    }
                    println!("  {} {} expired items", "✓".green(), result["expired_items"]);
                    println!(
                        "  {} {} expired dead letters",
                        "✓".green(),
                        result["expired_dead_letters"]
                    );
                    println!("  {} {} stale leases", "✓".green(), result["expired_leases"]);
                    println!();
                    let size_before_mb =
                        result["db_size_before"].as_i64().unwrap_or(0) as f64 / (1024.0 * 1024.0);
                    let size_after_mb =
                        result["db_size_after"].as_i64().unwrap_or(0) as f64 / (1024.0 * 1024.0);
                    println!(
                        "  {} {:.2} MB → {:.2} MB",
                        "DB Size:".bold(),
                        size_before_mb,
                        size_after_mb
                    );
                }
                Err(e) => {
                    println!("  {} Maintenance failed: {}", "✗".red(), e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlq_replay_requires_a_target() {
        assert!(Cli::try_parse_from(["hooklinectl", "dlq", "replay"]).is_err());

        let cli = Cli::try_parse_from(["hooklinectl", "dlq", "replay", "--queue", "github"]).unwrap();
        match cli.command {
            Commands::Dlq(DlqCommands::Replay { id, queue, limit }) => {
                assert_eq!(id, None);
                assert_eq!(queue.as_deref(), Some("github"));
                assert_eq!(limit, 50);
            }
            _ => panic!("expected dlq replay"),
        }
    }

    #[test]
    fn test_admit_arguments() {
        let cli = Cli::try_parse_from([
            "hooklinectl",
            "--rpc-url",
            "http://localhost:1",
            "admit",
            "-q",
            "stripe",
            "--payload",
            r#"{"id": 1}"#,
            "--retries",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.rpc_url, "http://localhost:1");
        match cli.command {
            Commands::Admit {
                queue,
                source,
                retries,
                payload,
            } => {
                assert_eq!(queue, "stripe");
                assert_eq!(source, "cli");
                assert_eq!(retries, 3);
                assert_eq!(read_payload(&payload).unwrap(), json!({"id": 1}));
            }
            _ => panic!("expected admit"),
        }
    }

    #[test]
    fn test_dead_letter_row_from_view() {
        let view: DeadLetterView = serde_json::from_value(json!({
            "id": "dl-1",
            "queue_name": "github",
            "original_item": {
                "id": "item-1",
                "source": "github",
                "enqueued_at": 0,
                "payload": {"action": "opened"}
            },
            "error_message": "boom",
            "error_context": [],
            "failed_at": 0,
            "expires_at": 1000
        }))
        .unwrap();

        let row = DeadLetterRow::from(view);
        assert_eq!(row.item_id, "item-1");
        assert_eq!(row.failed_at, "1970-01-01 00:00:00");
        assert_eq!(row.error, "boom");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
