//! Example consumer: loads the tenant mapping document and per-tenant dotenv
//! configs from disk, mounts the tenant pipeline, and serves a small
//! tenant-aware API plus the ops routes.
//!
//! Run from repo root: `cargo run -p example-consumer`

use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tenancy_sdk::{
    common_routes_with_stats, tenant_middleware, FsConfigSource, MappingRegistry, RequireTenant,
    TenancySettings, TenancyState, TenantContext,
};
use tokio::net::TcpListener;

/// What the resolved tenant looks like to its own frontend.
async fn site(RequireTenant(ctx): RequireTenant) -> Json<TenantContext> {
    Json(ctx)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tenancy_sdk=info")),
        )
        .init();

    let mapping_path =
        std::env::var("TENANCY_MAPPING_PATH").unwrap_or_else(|_| "tenants.json".into());
    let config_dir = std::env::var("TENANCY_CONFIG_DIR").unwrap_or_else(|_| "tenants".into());
    let settings = TenancySettings::from_env();

    let mappings = MappingRegistry::from_path(&mapping_path).await?;
    tracing::info!(domains = mappings.len(), "tenant mappings loaded");

    let state = TenancyState::with_postgres(
        mappings,
        Arc::new(FsConfigSource::new(config_dir)),
        settings,
    );
    let _sweeper = state.connections.spawn_sweeper();

    let app = Router::new()
        .route("/api/site", get(site))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ))
        .merge(common_routes_with_stats(state));

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
