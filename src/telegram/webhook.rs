//! Webhook listener: Telegram posts updates to `/<token>`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Update;
use crate::dispatcher::DispatchMessage;

/// Header Telegram uses to echo the configured secret.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state of the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    token: Arc<str>,
    secret: Option<Arc<str>>,
    tx: mpsc::Sender<DispatchMessage>,
}

impl WebhookState {
    #[must_use]
    pub fn new(token: &str, secret: Option<&str>, tx: mpsc::Sender<DispatchMessage>) -> Self {
        Self {
            token: Arc::from(token),
            secret: secret.map(Arc::from),
            tx,
        }
    }
}

/// Builds the webhook router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/:token", post(receive_update))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

/// Accepts one update and forwards it to the dispatcher.
pub async fn receive_update(
    State(state): State<WebhookState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if token != *state.token {
        return StatusCode::NOT_FOUND;
    }

    if let Some(secret) = &state.secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(secret.as_ref()) {
            warn!("Rejected webhook call with a wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    debug!("Webhook update {}", update.update_id);
    if state
        .tx
        .send(DispatchMessage::Update(Box::new(update)))
        .await
        .is_err()
    {
        warn!("Dispatcher is gone, dropping update");
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::OK
}

/// Serves the webhook routes on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: WebhookState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Webhook listener on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
