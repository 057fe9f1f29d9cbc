//! Common routes: health, version, and tenancy stats for external health tooling.

use crate::connection::RegistryStats;
use crate::env::CacheStats;
use crate::state::TenancyState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Serialize)]
struct StatsBody {
    connections: RegistryStats,
    env_cache: CacheStats,
    mapped_domains: usize,
}

async fn stats(State(state): State<TenancyState>) -> Json<StatsBody> {
    Json(StatsBody {
        connections: state.connections.stats(),
        env_cache: state.env_cache.stats(),
        mapped_domains: state.mappings.len(),
    })
}

/// Common routes (no state): GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// Common routes plus GET /stats (connection registry and env cache counters).
pub fn common_routes_with_stats(state: TenancyState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/stats", get(stats))
        .with_state(state)
}
