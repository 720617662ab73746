// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Opens SQLite storage, builds the Evolution client, wires the session
//! registry, assignment engine, event router and reaper, then serves the
//! HTTP/WebSocket gateway until SIGINT or SIGTERM.

use std::sync::Arc;

use switchboard_config::SwitchboardConfig;
use switchboard_core::SwitchboardError;
use switchboard_evolution::EvolutionClient;
use switchboard_gateway::{AppState, AuthConfig, ServerConfig, start_server};
use switchboard_presence::PresenceRegistry;
use switchboard_queue::{AssignmentEngine, Notices, SessionRegistry};
use switchboard_reaper::Reaper;
use switchboard_router::EventRouter;
use switchboard_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs the `switchboard serve` command.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.server.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting switchboard serve");

    let storage = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };

    let gateway = Arc::new(EvolutionClient::new(&config.evolution)?);
    if config.evolution.instances.is_empty() {
        warn!("no evolution instances configured -- idle upstream sweeps and live bot snapshots are disabled");
    }

    let presence = Arc::new(PresenceRegistry::new());
    let sessions = Arc::new(SessionRegistry::new(storage.clone()));
    let notices = Notices::new(config.routing.clone());

    let assignment = Arc::new(AssignmentEngine::new(
        sessions.clone(),
        storage.clone(),
        storage.clone(),
        storage.clone(),
        gateway.clone(),
        presence.clone(),
        notices.clone(),
    ));

    let mut router = EventRouter::new(
        assignment.clone(),
        storage.clone(),
        storage.clone(),
        gateway.clone(),
        presence.clone(),
    );
    for instance in &config.evolution.instances {
        debug!(instance = %instance.name, bot_id = %instance.bot_id, "registering gateway instance");
        router = router.with_bot(&instance.name, &instance.bot_id);
    }

    let reaper = Arc::new(Reaper::new(
        sessions,
        gateway,
        presence.clone(),
        notices,
        config.reaper.clone(),
        config.evolution.instances.clone(),
    ));

    if config.server.operator_token.is_none() {
        warn!("server.operator_token is not set -- operator endpoints and WebSocket will reject every request");
    }
    if config.server.webhook_token.is_none() {
        warn!("server.webhook_token is not set -- webhook intake is unauthenticated");
    }

    let state = AppState {
        router: Arc::new(router),
        assignment,
        presence,
        operators: storage.clone(),
        storage: storage.clone(),
        auth: AuthConfig {
            webhook_token: config.server.webhook_token.clone(),
            operator_token: config.server.operator_token.clone(),
        },
        started_at: std::time::Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.server.bind_address.clone(),
        port: config.server.port,
    };

    let cancel = install_signal_handler();

    let reaper_handle = tokio::spawn(reaper.run(cancel.clone()));

    let served = start_server(&server_config, state, cancel.clone()).await;
    // A bind failure returns before any signal; stop the reaper too.
    cancel.cancel();

    if let Err(e) = reaper_handle.await {
        warn!(error = %e, "reaper task ended abnormally");
    }
    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }
    info!("switchboard stopped");
    served
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
