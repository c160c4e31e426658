//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tidewatch_core::{Ingestor, TickOutcome};
use tidewatch_search::{SearchClientConfig, TwitterClient};
use tidewatch_shared::{
    AppConfig, IngestConfig, MentionRecord, init_config, load_config,
    resolve_bearer_token, resolve_database,
};
use tidewatch_storage::Storage;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Tidewatch: collect coastal hazard mentions from social media.
#[derive(Parser)]
#[command(
    name = "tidewatch",
    version,
    about = "Poll social-media search for hazard mentions and store each new one once.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Poll the search API until interrupted.
    Run(RunArgs),

    /// Inspect stored mentions.
    Mentions {
        #[command(subcommand)]
        action: MentionsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `tidewatch run`; each overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Search expression (defaults to the coastal hazard query).
    #[arg(long)]
    pub query: Option<String>,

    /// Seconds to wait after each tick.
    #[arg(long, env = "TIDEWATCH_INTERVAL_SECS")]
    pub interval: Option<u64>,

    /// Page size per search (the API accepts 10-100).
    #[arg(long)]
    pub max_results: Option<u32>,

    /// Tag written into each record's `source` field.
    #[arg(long)]
    pub source: Option<String>,

    /// Run a single tick and exit.
    #[arg(long)]
    pub once: bool,
}

/// Mention inspection subcommands.
#[derive(Subcommand)]
pub(crate) enum MentionsAction {
    /// List the most recent mentions, newest first.
    List {
        /// Maximum number of mentions to show.
        #[arg(short, long, default_value = "50")]
        limit: u32,

        /// Only show mentions not yet processed downstream.
        #[arg(long)]
        unprocessed: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "tidewatch=info",
        1 => "tidewatch=debug",
        _ => "tidewatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Mentions { action } => match action {
            MentionsAction::List {
                limit,
                unprocessed,
                json,
            } => cmd_mentions_list(limit, unprocessed, json).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Merge config file values with `run` flags.
fn ingest_config(config: &AppConfig, args: &RunArgs) -> Result<IngestConfig> {
    let mut ingest = IngestConfig::from(config);

    if let Some(query) = &args.query {
        if query.trim().is_empty() {
            return Err(eyre!("--query must not be empty"));
        }
        ingest.query = query.clone();
    }
    if let Some(secs) = args.interval {
        if secs == 0 {
            return Err(eyre!("--interval must be at least 1 second"));
        }
        ingest.interval = Duration::from_secs(secs);
    }
    if let Some(max) = args.max_results {
        ingest.max_results = max;
    }
    if let Some(source) = &args.source {
        if source.trim().is_empty() {
            return Err(eyre!("--source must not be empty"));
        }
        ingest.source_tag = source.clone();
    }

    Ok(ingest)
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    // Everything up to the loop is fatal on failure
    let config = load_config()?;
    let bearer_token = resolve_bearer_token(&config)?;
    let target = resolve_database(&config)?;
    let ingest = ingest_config(&config, &args)?;

    let client = TwitterClient::new(SearchClientConfig::from_config(
        &config.twitter,
        bearer_token,
    ))?;
    let storage = Storage::connect(&target).await?;
    info!("connected to mention store");

    let ingestor = Ingestor::new(client, storage, ingest);

    if args.once {
        let report = ingestor.run_once().await;
        println!(
            "fetched {} | saved {} | skipped {} | failed {}",
            report.fetched, report.inserted, report.skipped, report.failed
        );
        if let TickOutcome::SearchFailed(message) = report.outcome {
            return Err(eyre!("search failed: {message}"));
        }
        return Ok(());
    }

    let summary = ingestor.run_until(shutdown_signal()).await;
    info!(
        ticks = summary.ticks,
        inserted = summary.inserted,
        "stopped by user"
    );
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("received shutdown signal");
}

async fn cmd_mentions_list(limit: u32, unprocessed: bool, json: bool) -> Result<()> {
    let config = load_config()?;
    let target = resolve_database(&config)?;
    let storage = Storage::connect_readonly(&target).await?;

    let mentions = storage.list_recent_mentions(limit, unprocessed).await?;
    let total = storage.count_mentions().await?;
    storage.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&mentions)?);
        return Ok(());
    }

    if mentions.is_empty() {
        println!("No mentions stored yet.");
        return Ok(());
    }

    for mention in &mentions {
        println!("{}", format_mention_row(mention));
    }
    println!();
    println!("  Showing {} of {total} mentions", mentions.len());

    Ok(())
}

fn format_mention_row(mention: &MentionRecord) -> String {
    let flag = if mention.processed { "done" } else { "new " };
    let text: String = mention
        .text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .take(80)
        .collect();
    format!(
        "  [{flag}] {}  {:<20} @{:<12} {text}",
        mention.created_at.format("%Y-%m-%d %H:%M"),
        mention.external_id,
        mention.author_id,
    )
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
