//! `stake-pf-live`: loopback ingest + query HTTP server, plus two
//! maintenance subcommands that act directly on the store without
//! starting the listener.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stake_pf_live_core::app_state::AppState;
use stake_pf_live_core::config::Config;
use stake_pf_live_core::csv_export;
use stake_pf_live_core::events::EventBus;
use stake_pf_live_core::store::Store;

#[derive(Parser, Debug)]
#[command(name = "stake-pf-live")]
#[command(about = "Pump/Expert provable-fairness telemetry ingest and analytics core")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the loopback ingest + query HTTP server (the default).
    Serve,
    /// Stream a stream's bets as CSV, ascending by nonce.
    ExportCsv {
        /// Stream id to export.
        #[arg(long)]
        stream_id: i64,
        /// Output file path; writes to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Reclaim space left by retention pruning and stream deletion.
    Vacuum,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stake_pf_live_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::ExportCsv { stream_id, out } => export_csv(config, stream_id, out),
        Command::Vacuum => vacuum(config),
    }
}

async fn serve(config: Config) -> Result<()> {
    let store = Store::open(&config.database_path).with_context(|| {
        format!(
            "opening database at {}",
            config.database_path.display()
        )
    })?;
    let events = EventBus::new(config.event_queue_capacity);
    let port = config.port;
    let state = AppState::new(store, events, config);

    let app: Router = stake_pf_live_core::router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding ingest listener on {addr}"))?;
    info!(%addr, "stake-pf-live listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    Ok(())
}

/// Resolves once the process receives Ctrl+C or, on unix, SIGTERM - the
/// "platform lifecycle hook" design note §9 asks for, so the listening
/// socket and the database connection are dropped on every exit path.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining in-flight requests");
}

fn export_csv(config: Config, stream_id: i64, out: Option<PathBuf>) -> Result<()> {
    let store = Store::open(&config.database_path).with_context(|| {
        format!(
            "opening database at {}",
            config.database_path.display()
        )
    })?;

    match out {
        Some(path) => {
            let mut file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            csv_export::export_bets_csv(&store, stream_id, &mut file)
                .with_context(|| format!("exporting stream {stream_id}"))?;
            info!(path = %path.display(), stream_id, "exported csv");
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            csv_export::export_bets_csv(&store, stream_id, &mut handle)
                .with_context(|| format!("exporting stream {stream_id}"))?;
        }
    }
    Ok(())
}

fn vacuum(config: Config) -> Result<()> {
    let store = Store::open(&config.database_path).with_context(|| {
        format!(
            "opening database at {}",
            config.database_path.display()
        )
    })?;
    store.vacuum().context("running VACUUM")?;
    info!("vacuum complete");
    Ok(())
}
