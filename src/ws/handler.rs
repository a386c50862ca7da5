//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::auth::bearer_token;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Credential for clients that cannot set headers on the upgrade
    /// request (browsers).
    pub token: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The credential comes from `Authorization: Bearer` or, failing that,
/// `?token=`. Admission runs after the upgrade so a rejected client gets
/// an error frame and a close code instead of a bare HTTP status.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let credential = bearer_token(&headers).or(params.token);
    let service = state.realtime.clone();
    let heartbeat = state.heartbeat;
    let shutdown = state.shutdown.clone();

    ws.on_upgrade(move |socket| run_connection(socket, credential, service, heartbeat, shutdown))
}
