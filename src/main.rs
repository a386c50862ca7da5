//! bandroom-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use bandroom_gateway::app_state::AppState;
use bandroom_gateway::auth::{AllowAll, JoinPolicy, TokenVerifier};
use bandroom_gateway::config::GatewayConfig;
use bandroom_gateway::router::{build_app, cors_layer};
use bandroom_gateway::service::RealtimeService;
use bandroom_gateway::ws::Heartbeat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting bandroom-gateway");

    if config.tokens.is_empty() {
        tracing::warn!("AUTH_TOKENS is empty, every connection will be rejected");
    }
    let verifier: Arc<dyn TokenVerifier> = Arc::new(config.tokens.clone());
    let policy: Arc<dyn JoinPolicy> = match config.room_grants.clone() {
        Some(grants) => Arc::new(grants),
        None => {
            tracing::warn!("ROOM_GRANTS not set, any identity may join any room");
            Arc::new(AllowAll)
        }
    };

    // Build the broadcast core
    let realtime = RealtimeService::new(
        verifier,
        policy,
        config.admission_timeout,
        config.outbound_buffer,
    );

    // Build application state
    let (shutdown_tx, shutdown) = watch::channel(false);
    let app_state = AppState {
        realtime,
        heartbeat: Heartbeat {
            interval: config.heartbeat_interval,
            timeout: config.heartbeat_timeout,
        },
        publish_token: config.publish_token.as_deref().map(Arc::from),
        shutdown,
    };

    let app = build_app(app_state, cors_layer(config.cors_origin.as_deref()));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("shutdown requested, closing sockets");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server error")?;

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
