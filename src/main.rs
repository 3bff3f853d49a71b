use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use paperbot::api::create_router;
use paperbot::config::AppConfig;
use paperbot::metrics::init_metrics;
use paperbot::services::TradingEngine;
use paperbot::store::Store;
use paperbot::AppState;

#[derive(Parser)]
#[command(name = "paperbot", about = "Multi-agent consensus paper-trading engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single trading tick and exit (nonzero on errors).
    Tick,
    /// Run the tick loop and query API until stopped.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    // Bad configuration prevents startup entirely, before the first tick.
    config.validate()?;
    let config = Arc::new(config);

    let store = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let store = Store::connect(url).await?;
            tracing::info!("Database connected");
            store
        }
        None => {
            tracing::info!("No DATABASE_URL — using in-memory record store");
            Store::memory()
        }
    };

    let metrics_handle = init_metrics();
    let engine = TradingEngine::new(Arc::clone(&config), store);

    match cli.command.unwrap_or(Command::Run) {
        Command::Tick => {
            let summary = engine.run_tick(Utc::now()).await;
            if summary.has_errors() {
                std::process::exit(1);
            }
        }
        Command::Run => {
            let state = AppState {
                config: Arc::clone(&config),
                engine: engine.clone(),
                metrics_handle,
            };
            let router = create_router(state);
            let addr = format!("{}:{}", config.host, config.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("API listening on {addr}");

            let server = tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!(error = %e, "API server failed");
                }
            });

            let (stop_tx, stop_rx) = watch::channel(false);
            let loop_engine = engine.clone();
            let engine_task = tokio::spawn(async move {
                loop_engine.run_until_stopped(stop_rx).await;
            });

            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutdown requested — letting the current tick finish");
            let _ = stop_tx.send(true);
            engine_task.await.ok();
            server.abort();
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
