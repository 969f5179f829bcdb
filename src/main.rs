//! Morning Digest — binary entrypoint.
//! Runs the three-stage pipeline from the command line: generate (and
//! optionally send) a digest, check dedup state, list sent digests.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use morning_digest::config::{self, Config};
use morning_digest::history::{DigestItem, HistoryStore};
use morning_digest::notify::EmailSender;
use morning_digest::pipeline::run_pipeline;

#[derive(Parser)]
#[command(name = "morning-digest", about = "Curated daily digest from noisy content streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline and write the digest HTML if enough items pass.
    Generate {
        /// Send the digest by email and record it in history.
        #[arg(long)]
        send: bool,
    },
    /// Check whether a URL was already sent.
    Sent { url: String },
    /// List recently sent digests.
    List {
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("morning_digest=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = config::load_default()?;
    let history = HistoryStore::open(HistoryStore::default_path())?;

    match cli.command {
        Command::Generate { send } => cmd_generate(&config, &history, send).await,
        Command::Sent { url } => {
            if history.has_been_sent(&url) {
                println!("Already sent: {url}");
            } else {
                println!("Not yet sent: {url}");
            }
            Ok(())
        }
        Command::List { limit } => {
            for record in history.recent(limit) {
                println!("[{}] {} — {}", record.id, record.sent_at, record.subject);
                for item in &record.items {
                    println!("    - [{}] {}", item.origin.label(), item.title);
                }
            }
            Ok(())
        }
    }
}

async fn cmd_generate(config: &Config, history: &HistoryStore, send: bool) -> Result<()> {
    let output_dir = config.output.resolve_dir();
    let result = run_pipeline(config, history, &output_dir).await;

    println!(
        "Pipeline complete: {} candidates -> {} summarized -> {} selected",
        result.candidates_found, result.candidates_summarized, result.items_selected
    );

    let Some(digest_path) = &result.digest_path else {
        if let Some(reason) = &result.skipped_reason {
            println!("Digest skipped: {reason}");
        }
        return Ok(());
    };
    println!("Digest saved: {}", digest_path.display());

    if !send {
        return Ok(());
    }

    let email_cfg = config
        .email
        .as_ref()
        .context("sending requires an [email] section in the config")?;
    let sender = EmailSender::from_config(email_cfg)?;
    let subject = format!(
        "Morning Digest - {}",
        chrono::Local::now().format("%B %d, %Y")
    );

    println!("Sending to {}...", email_cfg.to);
    match sender.send_digest(digest_path, &subject).await {
        Ok(()) => {
            let items: Vec<DigestItem> = result
                .selected
                .iter()
                .map(DigestItem::from_summarized)
                .collect();
            let id = history.record_digest(&subject, &email_cfg.to, digest_path, items)?;
            println!("Sent and recorded as digest #{id}");
        }
        Err(e) => {
            tracing::warn!(error = ?e, "digest delivery failed");
            println!("Failed to send digest: {e:#}");
        }
    }
    Ok(())
}
