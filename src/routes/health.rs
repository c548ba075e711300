use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

const SERVICE_NAME: &str = "langblog";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/health/ready", get(ready))
        .route("/api/health/live", get(live))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Language blog API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/api/health",
            "ready": "/api/health/ready",
            "live": "/api/health/live",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "UP",
        "timestamp": now(),
        "uptime": state.uptime_secs(),
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Ready when a pooled connection can run a trivial query.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let database_up = match state.db.get() {
        Ok(conn) => conn
            .query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
            .is_ok(),
        Err(e) => {
            tracing::warn!("Readiness check could not get a connection: {}", e);
            false
        }
    };

    let status = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database_up { "READY" } else { "NOT_READY" },
            "checks": {
                "database": if database_up { "UP" } else { "DOWN" },
                "timestamp": now(),
            }
        })),
    )
}

async fn live(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ALIVE",
        "uptime": state.uptime_secs(),
        "timestamp": now(),
    }))
}
