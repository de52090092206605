// src/api.rs
//! Status surface: `/health`, `/status` and, when a recorder is installed, `/metrics`.

use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::metrics::Metrics;
use crate::status::{StatusHandle, StatusSnapshot};

#[derive(Clone)]
pub struct ApiState {
    pub status: StatusHandle,
    pub metrics: Option<Metrics>,
}

impl ApiState {
    pub fn new(status: StatusHandle) -> Self {
        Self {
            status,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

pub fn router(state: ApiState) -> Router {
    let metrics = state.metrics.clone();
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

async fn status(State(state): State<ApiState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}

/// Bind `addr` and serve until `shutdown` flips.
pub async fn serve(
    addr: std::net::SocketAddr,
    state: ApiState,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    use anyhow::Context as _;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind status server on {addr}"))?;
    tracing::info!(addr = %addr, "status server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .context("status server")?;
    Ok(())
}

/// Run [`serve`] on its own task. A bind or serve failure is logged as soon as
/// it happens instead of waiting for the handle to be joined.
pub fn spawn_server(
    addr: std::net::SocketAddr,
    state: ApiState,
    shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let res = serve(addr, state, shutdown).await;
        if let Err(e) = &res {
            tracing::error!(addr = %addr, "status server stopped: {e:#}");
        }
        res
    })
}
