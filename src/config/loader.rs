//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{EngineError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    // Add default config file if it exists
    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    // Add environment variables with APP_ prefix
    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let mut config = AppConfig::default();

    if let Ok(cash) = std::env::var("PAPERTRADE_STARTING_CASH") {
        config.engine.starting_cash = cash
            .parse()
            .map_err(|_| EngineError::Configuration(format!("invalid starting cash: {cash}")))?;
    }
    if let Ok(wait) = std::env::var("PAPERTRADE_LOCK_WAIT_MS") {
        config.engine.lock_wait_ms = wait
            .parse()
            .map_err(|_| EngineError::Configuration(format!("invalid lock wait: {wait}")))?;
    }
    if let Ok(url) = std::env::var("PAPERTRADE_STREAM_URL") {
        config.broadcast.stream_url = url;
    }
    if let Ok(level) = std::env::var("PAPERTRADE_LOG_LEVEL") {
        config.settings.log_level = level;
    }

    Ok(config)
}
