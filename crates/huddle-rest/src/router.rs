//! Main application router.

use crate::{
    controllers::{group_controller, health_controller, metrics_controller},
    middleware::logging_middleware,
    state::AppState,
};
use axum::{http::HeaderValue, middleware, routing::get, Router};
use huddle_config::ServerConfig;
use huddle_service::GroupService;
use metrics_exporter_prometheus::PrometheusHandle;
use shaku::{HasComponent, Module};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Prometheus scrape configuration for the router.
#[derive(Clone)]
pub struct MetricsEndpoint {
    pub path: String,
    pub handle: PrometheusHandle,
}

/// Creates the main application router from a Shaku module.
///
/// The module must provide the `GroupService` component.
pub fn create_router<M>(
    module: &M,
    server_config: &ServerConfig,
    metrics: Option<MetricsEndpoint>,
) -> Router
where
    M: Module + HasComponent<dyn GroupService>,
{
    build_router(AppState::from_module(module), server_config, metrics)
}

/// Creates the main application router from an already assembled state.
pub fn build_router(
    state: AppState,
    server_config: &ServerConfig,
    metrics: Option<MetricsEndpoint>,
) -> Router {
    let cors = create_cors_layer(server_config);

    let api_router = Router::new()
        .nest("/groups", group_controller::router())
        .with_state(state);

    let mut router = Router::new()
        .merge(health_controller::router())
        .nest("/api/v1", api_router)
        .route("/", get(root));

    if let Some(endpoint) = metrics {
        info!("Serving Prometheus metrics at {}", endpoint.path);
        router = router.merge(metrics_controller::router(&endpoint.path, endpoint.handle));
    }

    let router = router
        .layer(middleware::from_fn(logging_middleware))
        .layer(TimeoutLayer::new(server_config.request_timeout()))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    info!("Router created with group endpoints under /api/v1/groups");
    router
}

/// Creates a CORS layer based on server configuration.
fn create_cors_layer(server_config: &ServerConfig) -> CorsLayer {
    if !server_config.cors_enabled {
        return CorsLayer::new();
    }
    if server_config.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = server_config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Root endpoint handler.
async fn root() -> &'static str {
    "Huddle API v1"
}
