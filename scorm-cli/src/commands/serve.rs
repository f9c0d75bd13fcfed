//! Scorm serve command for running the runtime server
//!
//! The serve command runs the scorm server which provides:
//! - WebSocket runtime channel and HTTP fallback for SCORM content
//! - Admin routes for grade reporting
//! - Periodic suspend-data compaction

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use scorm_core::{StaticSessions, SystemClock, UserId};
use scorm_server::{AppState, AuthLayer, ScormServer, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{collaborators, open_store};
use crate::config::ScormConfig;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Ledger database path (overrides config)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Do not schedule compaction passes
    #[arg(long)]
    pub no_compaction: bool,
}

/// Run the serve command
pub async fn run(args: ServeArgs, config: &ScormConfig) -> Result<()> {
    let server_config = ServerConfig::new(
        args.host.unwrap_or_else(|| config.server.host.clone()),
        args.port.unwrap_or(config.server.port),
    );
    let database = args
        .database
        .unwrap_or_else(|| config.storage.database.clone());
    let mut compaction = config.compaction.clone();
    if args.no_compaction {
        compaction.enabled = false;
    }

    let store = open_store(&database)?;
    let state = Arc::new(AppState::with_components(
        store.clone(),
        store,
        collaborators(&config.reporting),
        compaction,
        Arc::new(SystemClock),
    )
    .with_admins(config.auth.admins.iter().map(|user| UserId::new(user.as_str()))));

    if config.auth.tokens.is_empty() {
        warn!("No session tokens configured; every client will be refused");
    }
    if config.auth.admins.is_empty() {
        warn!("No admins configured; reporting routes will refuse every session");
    }
    let sessions = StaticSessions::new(
        config
            .auth
            .tokens
            .iter()
            .map(|(token, user)| (token.clone(), UserId::new(user.as_str()))),
    );

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());

    info!(
        "Starting scorm server on {} with ledger {}",
        server_config.addr(),
        database.display()
    );
    ScormServer::new(server_config, state)
        .with_auth(AuthLayer::new(Arc::new(sessions)))
        .with_shutdown(shutdown)
        .run()
        .await?;

    info!("scorm server stopped");
    Ok(())
}

/// Cancel `shutdown` on the first Ctrl-C
fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}
