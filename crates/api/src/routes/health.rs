//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health: liveness plus a primary database ping.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            "unavailable"
        }
    };

    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": database,
            "service": "notifeed-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
