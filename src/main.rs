//! DAO Ballot - proposals and signed voting on top of pull requests
//!
//! Every proposal is a branch, a committed proposal file and an open change
//! request. Members vote with signed comments; the latest vote per member
//! counts, and a daily sweep merges or closes proposals whose voting window
//! has ended.

mod config;
mod error;
mod identity;
mod models;
mod notify;
mod proposal;
mod routes;
mod scheduler;
mod state;
mod store;
mod voting;

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting DAO Ballot...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    let sweep_config = settings.sweep.clone();
    let state = Arc::new(AppState::new(settings)?);

    let sweep_task = if sweep_config.enabled {
        info!(
            "🧹 Deadline sweep every {}s ({}ms between store writes)",
            sweep_config.interval_secs, sweep_config.pause_ms
        );
        Some(scheduler::spawn(
            state.sweep(),
            Duration::from_secs(sweep_config.interval_secs),
        ))
    } else {
        info!("🧹 Deadline sweep disabled");
        None
    };

    // Build the router
    let app = create_router(state);

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Queries ───");
    info!("   GET  /health                        - Liveness");
    info!("   GET  /api/proposals                 - List open proposals");
    info!("   GET  /api/proposals/{{id}}            - Proposal with live tally");
    info!("   POST /api/signatures/verify         - Look up a signature");
    info!("");
    info!("   ─── Signed Commands ───");
    info!("   POST /api/proposals                 - Create proposal");
    info!("   POST /api/proposals/{{id}}/votes      - Vote YES / NO");
    info!("   POST /api/proposals/{{id}}/comments   - Comment (not counted)");
    info!("   POST /api/proposals/{{id}}/close      - Close voting now");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = sweep_task {
        task.abort();
    }

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dao_ballot=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
