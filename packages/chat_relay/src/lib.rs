//! Chat Relay - server-mediated broadcast chat over websockets
//!
//! Clients connect to `/ws`, send their display name as the first text
//! frame, and every later frame is relayed to all connected clients
//! (the sender included) as `"{name}: {message}"`.
//!
//! The core (registry, broadcaster, session protocol) knows nothing about
//! HTTP; `create_routes` mounts it behind axum's websocket upgrade.

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod session;
pub mod websocket;

pub use broadcast::{Broadcaster, DeliveryReport};
pub use connection::{ConnectionHandle, ConnectionId};
pub use error::DeliveryError;
pub use hooks::{LoggingHook, MessageHook, NoopHook};
pub use hub::ChatHub;
pub use registry::Registry;
pub use session::{EndReason, Frame, SessionOutcome, SessionState, run_session};

use axum::{
    Json, Router,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::metrics::HealthStatus;

#[derive(Clone)]
pub struct RelayState {
    pub hub: Arc<ChatHub>,
}

/// Routes for the chat relay. Serve with
/// `into_make_service_with_connect_info::<SocketAddr>()` so `/ws` can see
/// the client's address.
pub fn create_routes(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn websocket_handler(
    State(state): State<RelayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let origin = addr.ip().to_string();
    ws.on_upgrade(move |socket| async move {
        websocket::handle_websocket(socket, origin, &state.hub).await
    })
}

async fn health(State(state): State<RelayState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok".to_string(),
        connections: state.hub.registry().len().await,
        metrics: state.hub.metrics().snapshot(),
    })
}
