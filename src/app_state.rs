//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::service::RealtimeService;
use crate::ws::Heartbeat;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Broadcast core.
    pub realtime: RealtimeService,
    /// Keep-alive timing applied to every socket.
    pub heartbeat: Heartbeat,
    /// Bearer token required by the HTTP publish endpoint, if any.
    pub publish_token: Option<Arc<str>>,
    /// Flips to `true` when the server starts shutting down.
    pub shutdown: watch::Receiver<bool>,
}
