//! Configuration loader with layered sources.

use crate::{format_validation_errors, AppConfig, ConfigValidator};
use config::{Config, ConfigError, Environment, File};
use huddle_core::HuddleError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration loader with layered sources.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides
    /// 4. Environment variables with `HUDDLE__` prefix
    pub fn new(config_dir: impl Into<String>) -> Result<Self, HuddleError> {
        let config = Self::load_config(&config_dir.into())?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, HuddleError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    fn load_config(config_dir: &str) -> Result<AppConfig, HuddleError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("HUDDLE_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("HUDDLE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_error_to_huddle_error)?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(config_error_to_huddle_error)?;

        ConfigValidator::validate(&app_config)
            .map_err(|errors| HuddleError::Configuration(format_validation_errors(&errors)))?;

        Ok(app_config)
    }
}

fn config_error_to_huddle_error(err: ConfigError) -> HuddleError {
    HuddleError::Configuration(err.to_string())
}
