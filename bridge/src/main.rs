//! chesslink bridge
//!
//! Connects to a bridged chess board over TCP, keeps it in sync with the
//! remote chess server, and serves a small HTTP command API:
//! 1. Broadcast the board's game to a broadcast round
//! 2. Play online games on the board
//!
//! Usage:
//!   chesslink-bridge --board 192.168.1.40:7000 --token lip_xxx

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::Parser;
use chesslink_board::{ConnectionConfig, ConnectionManager, TcpConnector};
use chesslink_bridge::build_router;
use chesslink_remote::{RemoteClient, RemoteConfig, SessionStore};
use chesslink_sync::{SyncConfig, SyncEngine, SyncEvent};
use chesslink_types::BoardDevice;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "chesslink-bridge")]
#[command(about = "Bridges a chess board to a remote chess server")]
struct Args {
    /// Board address (host:port)
    #[arg(short, long)]
    board: Option<String>,

    /// API token to sign in with at startup
    #[arg(long)]
    token: Option<String>,

    /// Path to the session database
    #[arg(long, default_value = "chesslink.db")]
    db: PathBuf,

    /// Remote server base URL
    #[arg(long, default_value = "https://lichess.org")]
    api_url: String,

    /// HTTP API port
    #[arg(long, default_value = "7070")]
    http_port: u16,

    /// Start broadcasting immediately
    #[arg(long)]
    broadcast: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("chesslink bridge starting...");
    let session = Arc::new(
        SessionStore::open(&args.db)
            .with_context(|| format!("Failed to open session database {:?}", args.db))?,
    );
    let remote_config = RemoteConfig {
        api_base_url: args.api_url.clone(),
        ..Default::default()
    };
    let remote = Arc::new(
        RemoteClient::new(remote_config, Arc::clone(&session))
            .context("Failed to build remote client")?,
    );
    let board = Arc::new(ConnectionManager::new(
        Arc::new(TcpConnector),
        ConnectionConfig::default(),
    ));
    let engine = Arc::new(SyncEngine::new(
        SyncConfig::default(),
        Arc::clone(&board),
        remote,
        Arc::clone(&session),
    ));

    if let Some(token) = &args.token {
        let username = engine.sign_in(token).await.context("Sign-in failed")?;
        info!("Signed in as {}", username);
    } else if !session.is_signed_in()? {
        warn!("Not signed in; remote features fail until POST /api/v1/session/sign-in");
    }

    if let Some(address) = &args.board {
        engine.set_target_device(Some(BoardDevice::new(address.clone())));
    }
    if args.broadcast {
        engine.start_broadcast().await?;
    }

    tokio::spawn(log_events(Arc::clone(&engine)));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.http_port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", args.http_port))?;

    println!("\n========================================");
    println!("  chesslink bridge running");
    println!("========================================");
    println!("  Board:     {}", args.board.as_deref().unwrap_or("(none)"));
    println!("  Server:    {}", args.api_url);
    println!("  HTTP Port: {}", args.http_port);
    println!("========================================\n");

    axum::serve(listener, build_router(Arc::clone(&engine)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutting down");
    engine.stop_online_game().await;
    engine.stop_broadcast();
    board.shutdown();
    Ok(())
}

async fn log_events(engine: Arc<SyncEngine>) {
    let mut events = engine.events();
    loop {
        match events.recv().await {
            Ok(SyncEvent::Failed { operation, message }) => {
                warn!("{} failed: {}", operation, message);
            }
            Ok(SyncEvent::SignedOut) => warn!("Credentials rejected, signed out"),
            Ok(SyncEvent::GameStarted(game)) => info!("Online game started: {}", game.url),
            Ok(SyncEvent::GameFinished { game_id, winner }) => {
                info!("Online game {} finished ({:?})", game_id, winner);
            }
            Ok(SyncEvent::SavedGamesUploaded { imported }) => {
                info!("Uploaded {} saved games", imported);
            }
            Ok(SyncEvent::DeviceError(message)) => warn!("Board error: {}", message),
            Err(RecvError::Lagged(skipped)) => debug!("Missed {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
