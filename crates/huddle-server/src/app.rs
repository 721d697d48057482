//! Application builder.

use crate::{
    di::{build_memory_module, build_postgres_module},
    startup::print_startup_info,
};
use axum::Router;
use huddle_config::{AppConfig, DatabaseBackend};
use huddle_core::{HuddleError, HuddleResult};
use huddle_rest::{create_router, MetricsEndpoint};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::future::Future;
use tracing::info;

/// Application builder for constructing the server.
pub struct AppBuilder {
    config: Option<AppConfig>,
}

impl AppBuilder {
    /// Creates a new application builder.
    pub fn new() -> Self {
        Self { config: None }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Assembles the router for the configured backend.
    pub async fn build_router(&self) -> HuddleResult<Router> {
        let config = self.config.clone().unwrap_or_default();
        let metrics = install_metrics(&config)?;

        let router = match config.database.backend {
            DatabaseBackend::Postgres => {
                let module = build_postgres_module(&config).await?;
                create_router(module.as_ref(), &config.server, metrics)
            }
            DatabaseBackend::Memory => {
                let module = build_memory_module(&config);
                create_router(module.as_ref(), &config.server, metrics)
            }
        };
        Ok(router)
    }

    /// Builds the application and serves it until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> HuddleResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let config = self.config.clone().unwrap_or_default();
        let router = self.build_router().await?;

        let addr = config.server.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| HuddleError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        print_startup_info(&config);
        info!("Starting REST server on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| HuddleError::internal(format!("REST server error: {}", e)))?;

        info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn install_metrics(config: &AppConfig) -> HuddleResult<Option<MetricsEndpoint>> {
    if !config.observability.metrics_enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| HuddleError::Configuration(format!("Failed to install metrics recorder: {}", e)))?;
    huddle_service::metrics::register_metrics();

    Ok(Some(MetricsEndpoint {
        path: config.observability.metrics_path.clone(),
        handle,
    }))
}
