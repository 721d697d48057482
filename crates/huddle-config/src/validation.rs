//! Configuration validation module.
//!
//! Fails fast on invalid configuration rather than at runtime.

use crate::{AppConfig, DatabaseBackend};
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Port number is invalid (must be 1-65535).
    InvalidPort { name: String, value: u16 },
    /// Pool size configuration is invalid (min must be <= max).
    InvalidPoolSize { min: u32, max: u32 },
    /// Pool size exceeds maximum allowed.
    PoolSizeTooLarge { value: u32, maximum: u32 },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Timeout or TTL value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// Group capacity must allow at least the leader.
    InvalidCapacity { value: usize },
    /// Cache write attempts must be at least one.
    InvalidAttempts { value: u32 },
    /// Cache prefix must be non-empty.
    EmptyCachePrefix,
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Log format is invalid.
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort { name, value } => {
                write!(f, "Invalid port for {}: {} (must be 1-65535)", name, value)
            }
            Self::InvalidPoolSize { min, max } => {
                write!(
                    f,
                    "Invalid pool size: min ({}) cannot be greater than max ({})",
                    min, max
                )
            }
            Self::PoolSizeTooLarge { value, maximum } => {
                write!(f, "Pool size {} exceeds maximum allowed ({})", value, maximum)
            }
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "'{}' must be positive, got {}", name, value)
            }
            Self::InvalidCapacity { value } => {
                write!(f, "Invalid group capacity: {} (must be at least 1)", value)
            }
            Self::InvalidAttempts { value } => {
                write!(f, "Invalid cache write attempts: {} (must be at least 1)", value)
            }
            Self::EmptyCachePrefix => write!(f, "Cache prefix cannot be empty"),
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
            Self::InvalidLogFormat { value } => {
                write!(f, "Invalid log format: '{}' (valid: pretty, json)", value)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of configuration validation containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Adds an error to the result.
    fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the validation errors.
    #[must_use]
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }

    /// Converts to Result, returning Err with all errors if any exist.
    pub fn into_result(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: u32 = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];
    /// Valid log formats.
    const VALID_LOG_FORMATS: &'static [&'static str] = &["pretty", "json"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut result = ValidationResult::default();

        Self::validate_server(&config.server, &mut result);
        Self::validate_database(&config.database, &mut result);
        Self::validate_redis(&config.redis, &mut result);
        Self::validate_group(&config.group, &mut result);
        Self::validate_observability(&config.observability, &mut result);

        result.into_result()
    }

    fn validate_server(config: &crate::ServerConfig, result: &mut ValidationResult) {
        if config.port == 0 {
            result.add_error(ConfigValidationError::InvalidPort {
                name: "server.port".to_string(),
                value: config.port,
            });
        }

        if config.request_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "server.request_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    /// Validates database configuration. Skipped for the in-memory backend.
    fn validate_database(config: &crate::DatabaseConfig, result: &mut ValidationResult) {
        if config.backend == DatabaseBackend::Memory {
            return;
        }

        if config.url.is_empty() {
            result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        } else if !config.url.starts_with("postgres://") && !config.url.starts_with("postgresql://") {
            result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL must start with postgres:// or postgresql://".to_string(),
            });
        }

        if config.min_connections > config.max_connections {
            result.add_error(ConfigValidationError::InvalidPoolSize {
                min: config.min_connections,
                max: config.max_connections,
            });
        }
        if config.max_connections > Self::MAX_POOL_SIZE {
            result.add_error(ConfigValidationError::PoolSizeTooLarge {
                value: config.max_connections,
                maximum: Self::MAX_POOL_SIZE,
            });
        }

        if config.connect_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "database.connect_timeout_secs".to_string(),
                value: 0,
            });
        }
        if config.idle_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "database.idle_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_redis(config: &crate::RedisConfig, result: &mut ValidationResult) {
        if !config.enabled {
            return;
        }

        match Url::parse(&config.url) {
            Ok(url) if matches!(url.scheme(), "redis" | "rediss") => {}
            Ok(_) => result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: "URL must start with redis:// or rediss://".to_string(),
            }),
            Err(e) => result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: e.to_string(),
            }),
        }

        if config.pool_size > Self::MAX_POOL_SIZE {
            result.add_error(ConfigValidationError::PoolSizeTooLarge {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }
    }

    fn validate_group(config: &crate::GroupConfig, result: &mut ValidationResult) {
        if config.capacity < 1 {
            result.add_error(ConfigValidationError::InvalidCapacity {
                value: config.capacity,
            });
        }
        if config.cache_ttl_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "group.cache_ttl_secs".to_string(),
                value: 0,
            });
        }
        if config.transaction_timeout_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "group.transaction_timeout_ms".to_string(),
                value: 0,
            });
        }
        if config.cache_write_attempts == 0 {
            result.add_error(ConfigValidationError::InvalidAttempts {
                value: config.cache_write_attempts,
            });
        }
        if config.cache_prefix.trim().is_empty() {
            result.add_error(ConfigValidationError::EmptyCachePrefix);
        }
    }

    fn validate_observability(config: &crate::ObservabilityConfig, result: &mut ValidationResult) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }

        let format = config.log_format.to_lowercase();
        if !Self::VALID_LOG_FORMATS.contains(&format.as_str()) {
            result.add_error(ConfigValidationError::InvalidLogFormat {
                value: config.log_format.clone(),
            });
        }
    }
}

/// Formats validation errors for display.
#[must_use]
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        let config = AppConfig::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = AppConfig::default();
        config.group.capacity = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidCapacity { value: 0 })));
    }

    #[test]
    fn test_zero_ttl_and_timeout_rejected() {
        let mut config = AppConfig::default();
        config.group.cache_ttl_secs = 0;
        config.group.transaction_timeout_ms = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigValidationError::NonPositiveTimeout { name, .. } if name == "group.cache_ttl_secs"
        )));
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigValidationError::NonPositiveTimeout { name, .. } if name == "group.transaction_timeout_ms"
        )));
    }

    #[test]
    fn test_invalid_database_url() {
        let mut config = AppConfig::default();
        config.database.url = "mysql://localhost/huddle".to_string();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigValidationError::InvalidUrl { url_type, .. } if url_type == "database"
        )));
    }

    #[test]
    fn test_memory_backend_skips_database_checks() {
        let mut config = AppConfig::default();
        config.database.backend = DatabaseBackend::Memory;
        config.database.url = String::new();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_redis_url_only_when_enabled() {
        let mut config = AppConfig::default();
        config.redis.url = "http://localhost:6379".to_string();
        assert!(ConfigValidator::validate(&config).is_err());

        config.redis.enabled = false;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_pool_size() {
        let mut config = AppConfig::default();
        config.database.min_connections = 100;
        config.database.max_connections = 10;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidPoolSize { .. })));
    }

    #[test]
    fn test_invalid_log_settings() {
        let mut config = AppConfig::default();
        config.observability.log_level = "loud".to_string();
        config.observability.log_format = "xml".to_string();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_format_validation_errors() {
        let errors = vec![
            ConfigValidationError::InvalidCapacity { value: 0 },
            ConfigValidationError::EmptyCachePrefix,
        ];
        let output = format_validation_errors(&errors);
        assert!(output.contains("1. Invalid group capacity"));
        assert!(output.contains("2. Cache prefix cannot be empty"));
    }
}
