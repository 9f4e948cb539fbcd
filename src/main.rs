// ABOUTME: Main entry point for the LINE concierge bot
// ABOUTME: Parses the CLI, initializes logging and config, then serves webhooks or runs operator commands

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use concierge::{
    config::Config,
    gemini::GeminiClient,
    line::{rich_menu, LineClient},
    metrics,
    sheets::SheetsClient,
    webhook::{self, WebhookState},
};
use concierge_core::{DataSyncCache, KnowledgeSource, MessageDispatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// LINE tourism concierge: events carousel, greeting, and AI answers grounded in a spreadsheet
#[derive(Parser, Debug)]
#[command(name = "concierge", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook server (default)
    Serve,
    /// Fetch the knowledge store once and print what was loaded
    Sync,
    /// Replace the bot's rich menus with a grid layout and image
    RichMenu {
        /// Layout TOML describing the buttons
        #[arg(long)]
        layout: PathBuf,
        /// PNG or JPEG menu image
        #[arg(long)]
        image: PathBuf,
    },
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\nPANIC! concierge crashed with the following error:\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Sync => sync_once().await,
        Command::RichMenu { layout, image } => install_rich_menu(&layout, &image).await,
    }
}

async fn serve() -> Result<()> {
    tracing::info!("Starting LINE concierge");

    let config = Config::load()?;
    tracing::info!(
        addr = %config.server_addr(),
        model = %config.gemini.model,
        spreadsheet = %config.sheets.spreadsheet_id,
        ttl_secs = config.cache.ttl_secs,
        grounding = config.persona.grounding.enabled,
        events_enabled = config.events.enabled,
        "Configuration loaded"
    );

    let metrics_handle =
        metrics::init_metrics().context("Failed to initialize Prometheus metrics")?;

    let source: Arc<dyn KnowledgeSource> = Arc::new(SheetsClient::new(&config.sheets)?);
    let backend = Arc::new(GeminiClient::new(&config.gemini)?);
    let line = Arc::new(LineClient::new(&config.line)?);

    let dispatcher = Arc::new(MessageDispatcher::from_config(
        &config, source, backend, line,
    ));

    // Warm the cache so the first message does not pay for the sync
    let warmup = Arc::clone(dispatcher.cache());
    tokio::spawn(async move { warmup.ensure_fresh().await });

    let state = WebhookState {
        dispatcher,
        channel_secret: config.line.channel_secret.clone(),
    };
    webhook::start_webhook_server(&config.server_addr(), state, Some(metrics_handle)).await
}

async fn sync_once() -> Result<()> {
    let config = Config::load_unvalidated()?;
    if config.sheets.spreadsheet_id.trim().is_empty() {
        anyhow::bail!(
            "sheets.spreadsheet_id is required (set in config.toml or SPREADSHEET_KEY env var)"
        );
    }
    let source: Arc<dyn KnowledgeSource> = Arc::new(SheetsClient::new(&config.sheets)?);
    let cache = DataSyncCache::new(source, &config.cache, &config.sheets);

    let summary = cache.refresh_now().await?;
    let snapshot = cache.snapshot().await;

    println!(
        "Synced {} events and {} characters of knowledge in {} ms",
        summary.events,
        summary.knowledge_chars,
        summary.elapsed.as_millis()
    );
    for event in &snapshot.events {
        println!(
            "  - {} ({})",
            event.title.as_deref().unwrap_or_default(),
            event.date.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn install_rich_menu(layout_path: &Path, image_path: &Path) -> Result<()> {
    let config = Config::load_unvalidated()?;
    if config.line.channel_access_token.trim().is_empty() {
        anyhow::bail!(
            "line.channel_access_token is required (set in config.toml or LINE_CHANNEL_ACCESS_TOKEN env var)"
        );
    }

    let layout = rich_menu::RichMenuLayout::load(layout_path)?;
    let content_type = rich_menu::image_content_type(image_path)?;
    let image = tokio::fs::read(image_path)
        .await
        .with_context(|| format!("Failed to read {}", image_path.display()))?;

    let client = LineClient::new(&config.line)?;
    let id = client.install_rich_menu(&layout, &content_type, image).await?;
    println!("Rich menu installed: {}", id);
    Ok(())
}
