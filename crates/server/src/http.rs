//! HTTP surface.
//!
//! - `POST /predict` - recommend places for `{"Item": id, "Rating": r}`
//! - `GET /health`   - liveness plus catalog size
//!
//! The predict handler reads the raw body and validates it itself, so that
//! malformed JSON gets the same `{"error": ...}` body as every other failure.

use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{QueryLimits, ServiceConfig};
use crate::error::Result;
use crate::query::RatingQuery;
use crate::service::{RecommendationService, Recommendations};

/// State shared by all handlers; cloning is cheap
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecommendationService>,
    pub limits: QueryLimits,
}

impl AppState {
    pub fn new(service: RecommendationService, limits: QueryLimits) -> Self {
        Self {
            service: Arc::new(service),
            limits,
        }
    }
}

/// Build the router with CORS open to any origin (the browser client is
/// served from a different origin)
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle POST /predict
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Json<Recommendations>> {
    let query = RatingQuery::from_json(&body, &state.limits)?;
    let recommendations = state.service.recommend(&query).await?;
    Ok(Json(recommendations))
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "catalog_rows": state.service.catalog().len(),
    }))
}

/// Bind the listener and serve until Ctrl-C
pub async fn serve(config: &ServiceConfig, service: RecommendationService) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    let app = router(AppState::new(service, config.limits));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. If the handler could not be installed, never
/// resolves, so the server keeps running instead of stopping right after start.
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
