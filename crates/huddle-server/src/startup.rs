//! Server startup utilities.

use huddle_config::AppConfig;
use tracing::info;

/// Logs where the server can be reached and how it is configured.
pub fn print_startup_info(config: &AppConfig) {
    let separator = "=".repeat(60);
    let addr = config.server.addr();
    info!("{}", separator);
    info!("Huddle v{} ({})", config.app.version, config.app.environment);
    info!("REST API:  http://{}/api/v1/groups", addr);
    info!("Health:    http://{}/health", addr);
    if config.observability.metrics_enabled {
        info!("Metrics:   http://{}{}", addr, config.observability.metrics_path);
    }
    info!("Backend:   {:?}", config.database.backend);
    info!("Capacity:  {} members per group", config.group.capacity);
    info!("{}", separator);
}
