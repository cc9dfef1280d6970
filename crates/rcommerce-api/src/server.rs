use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use rcommerce_core::jobs::clock::Clock;
use rcommerce_core::jobs::queue::DispatchQueueBackend;
use rcommerce_core::jobs::store::JobStoreBackend;
use rcommerce_core::{Config, Result};

use crate::state::AppState;

/// Run the HTTP control surface. Worker pool and Safety Sync loop are
/// started separately by the embedding binary (see `rcommerce-cli`'s
/// `serve` command), since they need a `JobLogic` this crate doesn't own.
pub async fn run<S, Q, C>(config: &Config, state: AppState<S, Q, C>) -> Result<()>
where
    S: JobStoreBackend + 'static,
    Q: DispatchQueueBackend + 'static,
    C: Clock + 'static,
{
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| rcommerce_core::Error::Config(format!("Invalid host: {}", e)))?,
        config.server.port,
    ));

    let app = build_router(state);

    info!("scheduler API listening on http://{}", addr);
    log_routes();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| rcommerce_core::Error::Network(e.to_string()))?;

    axum::serve(listener, app).await.map_err(|e| rcommerce_core::Error::Network(e.to_string()))?;

    Ok(())
}

fn build_router<S, Q, C>(state: AppState<S, Q, C>) -> Router
where
    S: JobStoreBackend + 'static,
    Q: DispatchQueueBackend + 'static,
    C: Clock + 'static,
{
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .nest("/api/v1", crate::routes::jobs::router::<S, Q, C>())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn log_routes() {
    info!("Available routes:");
    info!("  GET    /health");
    info!("  POST   /api/v1/jobs");
    info!("  GET    /api/v1/jobs");
    info!("  GET    /api/v1/jobs/upcoming");
    info!("  GET    /api/v1/jobs/:id");
    info!("  PATCH  /api/v1/jobs/:id");
    info!("  DELETE /api/v1/jobs/:id");
    info!("  POST   /api/v1/jobs/:id/pause");
    info!("  POST   /api/v1/jobs/:id/resume");
    info!("  POST   /api/v1/jobs/:id/trigger");
    info!("  GET    /api/v1/jobs/:id/executions");
    info!("  GET    /api/v1/executions/:id");
    info!("  GET    /api/v1/executions/:id/logs");
}

async fn health_check() -> &'static str {
    "OK"
}

async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "scheduler API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }
}
