//! Main application configuration
//!
//! This module defines the primary configuration structures for the ladder-room
//! service, including file and environment variable loading and validation.

use crate::config::queue::{LadderOrder, LadderSettings, QueueSettings};
use crate::config::rating::{RatingAlgorithm, RatingSettings};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub queue: QueueSettings,
    pub rating: RatingSettings,
    pub store: StoreSettings,
    pub results: ResultSettings,
    pub ladder: LadderSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Read chat commands from stdin
    pub console: bool,
}

/// Player store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite connection URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    /// Upper bound for any single store operation
    pub operation_timeout_ms: u64,
    pub max_connections: u32,
}

/// Match result artifact settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultSettings {
    /// Directory watched for result artifacts; watching is disabled when absent
    pub watch_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "ladder-room".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
            console: true,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            operation_timeout_ms: 5000,
            max_connections: 5,
        }
    }
}

impl Default for ResultSettings {
    fn default() -> Self {
        Self {
            watch_dir: None,
            poll_interval_ms: 1000,
        }
    }
}

/// Read and parse an environment variable if it is set
fn env_value<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text without validation
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML configuration")
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Some(name) = env_value::<String>("SERVICE_NAME")? {
            self.service.name = name;
        }
        if let Some(log_level) = env_value::<String>("LOG_LEVEL")? {
            self.service.log_level = log_level;
        }
        if let Some(port) = env_value("HEALTH_PORT")? {
            self.service.health_port = port;
        }
        if let Some(timeout) = env_value("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Queue settings
        if let Some(size) = env_value("MAX_QUEUE_SIZE")? {
            self.queue.max_queue_size = size;
        }
        if let Some(matches) = env_value("MAX_CONCURRENT_MATCHES")? {
            self.queue.max_concurrent_matches = matches;
        }
        if let Some(timeout) = env_value("RESULT_TIMEOUT_SECONDS")? {
            self.queue.result_timeout_seconds = timeout;
        }

        // Rating settings
        if let Some(algorithm) = env_value::<RatingAlgorithm>("RATING_ALGORITHM")? {
            self.rating.algorithm = algorithm;
        }
        if let Some(rating) = env_value("DEFAULT_RATING")? {
            self.rating.default_rating = rating;
        }
        if let Some(uncertainty) = env_value("DEFAULT_UNCERTAINTY")? {
            self.rating.default_uncertainty = uncertainty;
        }
        if let Some(rounds) = env_value("NUMBER_OF_ROUNDS")? {
            self.rating.number_of_rounds = rounds;
        }

        // Store settings
        if let Some(url) = env_value::<String>("DATABASE_URL")? {
            self.store.database_url = Some(url);
        }
        if let Some(timeout) = env_value("STORE_TIMEOUT_MS")? {
            self.store.operation_timeout_ms = timeout;
        }

        // Result artifact settings
        if let Some(dir) = env_value::<PathBuf>("RESULTS_WATCH_DIR")? {
            self.results.watch_dir = Some(dir);
        }
        if let Some(interval) = env_value("RESULTS_POLL_INTERVAL_MS")? {
            self.results.poll_interval_ms = interval;
        }

        if let Some(order) = env_value::<LadderOrder>("LADDER_ORDER")? {
            self.ladder.order = order;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get store operation timeout as Duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.operation_timeout_ms)
    }

    /// Get result artifact poll interval as Duration
    pub fn result_poll_interval(&self) -> Duration {
        Duration::from_millis(self.results.poll_interval_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate queue settings
    if config.queue.max_queue_size == 0 {
        return Err(anyhow!("Max queue size must be greater than 0"));
    }
    if config.queue.max_concurrent_matches == 0 {
        return Err(anyhow!("Max concurrent matches must be greater than 0"));
    }
    if config.queue.result_timeout_seconds == 0 {
        return Err(anyhow!("Result timeout must be greater than 0"));
    }
    if config.queue.expiry_check_interval_seconds == 0 {
        return Err(anyhow!("Expiry check interval must be greater than 0"));
    }

    // Validate rating settings
    if !config.rating.default_rating.is_finite() {
        return Err(anyhow!("Default rating must be a finite number"));
    }
    if config.rating.default_uncertainty <= 0.0 {
        return Err(anyhow!("Default uncertainty must be positive"));
    }
    if config.rating.number_of_rounds == 0 {
        return Err(anyhow!("Number of rounds must be greater than 0"));
    }
    if config.rating.effective_beta() <= 0.0 {
        return Err(anyhow!("Beta must be positive"));
    }
    if !(0.0..1.0).contains(&config.rating.draw_probability) {
        return Err(anyhow!("Draw probability must be in [0, 1)"));
    }
    if config.rating.dynamics < 0.0 {
        return Err(anyhow!("Dynamics must be non-negative"));
    }
    if config.rating.elo_k <= 0.0 {
        return Err(anyhow!("Elo K factor must be positive"));
    }

    // Validate store settings
    if config.store.operation_timeout_ms == 0 {
        return Err(anyhow!("Store operation timeout must be greater than 0"));
    }
    if config.store.max_connections == 0 {
        return Err(anyhow!("Store max connections must be greater than 0"));
    }
    if let Some(url) = &config.store.database_url {
        if url.is_empty() {
            return Err(anyhow!("Database URL cannot be empty"));
        }
    }

    if config.results.poll_interval_ms == 0 {
        return Err(anyhow!("Result poll interval must be greater than 0"));
    }

    Ok(())
}
