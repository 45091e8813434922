//! Stock Watch - Headless Server
//!
//! Polls a watchlist of stock symbols, alerts on large drops via Telegram,
//! and serves a small JSON dashboard API.

mod api;
mod config;
mod scheduler;
mod state;

use clap::Parser;
use config::{AnalysisSettings, AppConfig};
use state::create_state;
use std::sync::Arc;
use std::time::Duration;
use stockwatch_alerts::{
    AlertNotifier, Database, DisabledNotifier, TelegramConfig, TelegramNotifier,
};
use stockwatch_engine::Analyzer;
use stockwatch_feeds::FinnhubClient;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stock Watch CLI
#[derive(Parser, Debug)]
#[command(name = "stockwatch")]
#[command(about = "Stock drop monitor with Telegram alerts", long_about = None)]
struct Args {
    /// HTTP port for the dashboard API
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Percent change at or below which an alert is sent
    #[arg(long, env = "ALERT_THRESHOLD", default_value_t = -20.0, allow_hyphen_values = true)]
    alert_threshold: f64,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_bot_token: Option<String>,

    /// Telegram chat that receives alerts
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    telegram_chat_id: Option<String>,

    /// Finnhub API key
    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true)]
    finnhub_api_key: Option<String>,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://stock_data.db")]
    database_url: String,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Seconds between scheduled analyses
    #[arg(long, default_value_t = 3600)]
    interval_secs: u64,

    /// Seconds between scheduler checks
    #[arg(long, default_value_t = 60)]
    tick_secs: u64,

    /// Pause after each symbol, in milliseconds
    #[arg(long, default_value_t = 1000)]
    symbol_delay_ms: u64,
}

impl Args {
    fn into_config(self) -> AppConfig {
        let telegram = TelegramConfig::new(
            self.telegram_bot_token.unwrap_or_default(),
            self.telegram_chat_id.unwrap_or_default(),
        );

        AppConfig {
            port: self.port,
            database_url: self.database_url,
            analysis: AnalysisSettings {
                alert_threshold: self.alert_threshold,
                interval_secs: self.interval_secs,
                tick_secs: self.tick_secs,
                symbol_delay_ms: self.symbol_delay_ms,
            },
            telegram,
            finnhub_api_key: self.finnhub_api_key,
            log_level: self.log_level,
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn build_notifier(config: &AppConfig) -> Arc<dyn AlertNotifier> {
    match &config.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(telegram)),
        None => {
            warn!("Telegram not configured, alerts will not be delivered");
            Arc::new(DisabledNotifier)
        }
    }
}

async fn run(config: AppConfig) -> Result<(), BoxError> {
    config.validate()?;

    let db = Database::connect(&config.database_url).await?;

    if !config.finnhub_configured() {
        warn!("FINNHUB_API_KEY not set, quote requests will be rejected");
    }
    let source = Arc::new(FinnhubClient::new(
        config.finnhub_api_key.clone().unwrap_or_default(),
    )?);
    let notifier = build_notifier(&config);

    let analyzer = Arc::new(
        Analyzer::load(db, source, notifier, (&config.analysis).into()).await?,
    );

    info!("📈 Stock Watch starting...");
    info!("  Port: {}", config.port);
    info!("  Watchlist: {} symbols", analyzer.watchlist().await.len());
    info!("  Alert threshold: {}%", config.analysis.alert_threshold);
    info!("  Interval: {}s", config.analysis.interval_secs);
    match &config.telegram {
        Some(telegram) => info!("  Telegram chat: {}", telegram.masked_chat_id()),
        None => info!("  Telegram chat: not configured"),
    }

    let port = config.port;
    let state = create_state(config, analyzer);
    state.start();

    let scheduler_state = state.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler::run_scheduler(scheduler_state).await;
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://0.0.0.0:{}", port);

    let app = api::create_router(state.clone());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    info!("Press Ctrl+C to stop...");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    state.stop();

    // The scheduler finishes any scheduled cycle before returning.
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task failed: {}", e);
    }
    server_handle.abort();

    // A manual cycle runs in its own task; let it finish too.
    if state.analyzer.is_running() {
        info!("Waiting for running analysis to finish...");
        while state.analyzer.is_running() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    info!("👋 Stock Watch stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);

    if let Err(e) = run(args.into_config()).await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
