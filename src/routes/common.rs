//! Liveness, pool readiness and build/catalog information routes.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    reader: &'static str,
    writer: &'static str,
}

#[derive(Serialize)]
struct VersionBody {
    name: &'static str,
    version: &'static str,
    /// Tables and views in the loaded catalog.
    entities: usize,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ping(pool: &PgPool) -> &'static str {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            "unavailable"
        }
    }
}

/// 503 unless both the reader and the writer answer.
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyBody>) {
    let reader = ping(&state.read_pool).await;
    let writer = ping(&state.write_pool).await;
    let up = reader == "ok" && writer == "ok";
    let status = if up { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(ReadyBody {
            status: if up { "ok" } else { "degraded" },
            reader,
            writer,
        }),
    )
}

async fn version(State(state): State<AppState>) -> Json<VersionBody> {
    Json(VersionBody {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        entities: state.catalog.entities().count(),
    })
}

pub fn common_routes_with_ready(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(state)
}
