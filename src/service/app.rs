//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the player store,
//! rating engine, ladder cache and match lifecycle together and owns the
//! background tasks around them.

use crate::commands::CommandDispatcher;
use crate::config::AppConfig;
use crate::events::{BroadcastEventPublisher, FanoutEventPublisher, TracingEventPublisher};
use crate::ladder::LadderCache;
use crate::lifecycle::MatchLifecycle;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::rating::create_calculator;
use crate::results::DirectoryResultWatcher;
use crate::service::console::ConsoleTransport;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::store::{InMemoryPlayerStore, PlayerStore, SqlPlayerStore};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const METRICS_UPDATE_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Player store error: {message}")]
    Store { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Components shared with the health endpoints and background tasks
pub struct ServiceContext {
    config: AppConfig,
    store: Arc<dyn PlayerStore>,
    lifecycle: Arc<MatchLifecycle>,
    metrics_collector: Arc<MetricsCollector>,
    is_running: RwLock<bool>,
}

impl ServiceContext {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn PlayerStore>,
        lifecycle: Arc<MatchLifecycle>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config,
            store,
            lifecycle,
            metrics_collector,
            is_running: RwLock::new(false),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PlayerStore> {
        &self.store
    }

    pub fn lifecycle(&self) -> &Arc<MatchLifecycle> {
        &self.lifecycle
    }

    pub fn ladder(&self) -> &Arc<LadderCache> {
        self.lifecycle.ladder()
    }

    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        &self.metrics_collector
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }
}

/// Main application state containing all service components
pub struct AppState {
    context: Arc<ServiceContext>,

    /// Chat command entry point
    dispatcher: Arc<CommandDispatcher>,

    /// In-process event fan-out used by the console adapter
    broadcaster: BroadcastEventPublisher,

    /// Result artifact source, when a watch directory is configured
    result_watcher: Option<Arc<DirectoryResultWatcher>>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} ladder coordinator", config.service.name);

        let store = Self::initialize_store(&config).await?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let rating_calculator =
            create_calculator(&config.rating).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to initialize rating calculator: {}", e),
            })?;
        info!("Rating algorithm: {}", rating_calculator.name());

        let ladder = Arc::new(
            LadderCache::new(store.clone(), config.ladder.order, config.store_timeout())
                .with_metrics(metrics_collector.clone()),
        );

        let broadcaster = BroadcastEventPublisher::new(EVENT_CHANNEL_CAPACITY);
        let event_publisher = Arc::new(
            FanoutEventPublisher::new()
                .with(Arc::new(TracingEventPublisher::new()))
                .with(Arc::new(broadcaster.clone())),
        );

        let lifecycle = Arc::new(MatchLifecycle::new(
            config.queue.clone(),
            config.store_timeout(),
            store.clone(),
            rating_calculator,
            ladder,
            event_publisher,
            metrics_collector.clone(),
        ));

        let dispatcher = Arc::new(CommandDispatcher::new(
            lifecycle.clone(),
            metrics_collector.clone(),
        ));

        let result_watcher = match &config.results.watch_dir {
            Some(dir) => {
                let watcher = Arc::new(DirectoryResultWatcher::new(
                    dir.clone(),
                    config.result_poll_interval(),
                    config.rating.number_of_rounds,
                ));
                watcher
                    .subscribe(lifecycle.clone())
                    .map_err(|e| ServiceError::Initialization {
                        message: format!("Failed to subscribe to results: {}", e),
                    })?;
                Some(watcher)
            }
            None => {
                warn!("No results watch directory configured; matches can only expire");
                None
            }
        };

        let context = Arc::new(ServiceContext::new(
            config,
            store,
            lifecycle,
            metrics_collector.clone(),
        ));

        let health_config = HealthServerConfig {
            port: context.config().service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone())
                .with_context(context.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(Self {
            context,
            dispatcher,
            broadcaster,
            result_watcher,
            metrics_service,
            background_tasks: Vec::new(),
        })
    }

    async fn initialize_store(config: &AppConfig) -> Result<Arc<dyn PlayerStore>, ServiceError> {
        match &config.store.database_url {
            Some(url) => {
                info!("Connecting to player database");
                let store = SqlPlayerStore::connect(url, config.store.max_connections)
                    .await
                    .map_err(|e| ServiceError::Store {
                        message: format!("Failed to connect to player database: {}", e),
                    })?;
                Ok(Arc::new(store))
            }
            None => {
                warn!("No database configured; player records are kept in memory only");
                Ok(Arc::new(InMemoryPlayerStore::new()))
            }
        }
    }

    /// Start all background services
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting ladder coordinator");

        self.context.set_running(true).await;

        self.start_metrics_service().await?;
        self.start_background_tasks();

        if self.context.config().service.console {
            self.start_console();
        }

        info!("Ladder coordinator started");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of ladder coordinator");

        self.context.set_running(false).await;

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("Metrics service stopped");
        }

        let final_stats =
            self.context
                .lifecycle()
                .stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("Ladder coordinator shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        self.context.config()
    }

    pub fn context(&self) -> Arc<ServiceContext> {
        self.context.clone()
    }

    pub fn lifecycle(&self) -> Arc<MatchLifecycle> {
        self.context.lifecycle().clone()
    }

    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        self.dispatcher.clone()
    }

    pub fn broadcaster(&self) -> &BroadcastEventPublisher {
        &self.broadcaster
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        self.context.is_running().await
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = self.context.config().service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Health and metrics endpoints on port {}", port);
        Ok(())
    }

    fn start_background_tasks(&mut self) {
        let expiry_task = self.context.lifecycle().clone().start_expiry_task();
        self.background_tasks.push(expiry_task);

        if let Some(watcher) = &self.result_watcher {
            self.background_tasks.push(watcher.clone().start());
        }

        let metrics_task = {
            let context = self.context.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(METRICS_UPDATE_INTERVAL);
                let start_time = tokio::time::Instant::now();

                while context.is_running().await {
                    interval.tick().await;

                    let collector = context.metrics_collector();
                    collector
                        .service()
                        .uptime_seconds
                        .set(start_time.elapsed().as_secs() as i64);

                    match context.lifecycle().stats() {
                        Ok(stats) => collector.update_from_lifecycle_stats(&stats),
                        Err(e) => warn!("Failed to read lifecycle stats for metrics: {}", e),
                    }

                    match HealthCheck::check(&context).await {
                        Ok(health) => {
                            let status = match health.status {
                                HealthStatus::Healthy => 2,
                                HealthStatus::Degraded => 1,
                                HealthStatus::Unhealthy => 0,
                            };
                            collector.update_health_status(status);
                            for check in &health.checks {
                                collector.update_component_health(
                                    &check.name,
                                    check.status == HealthStatus::Healthy,
                                );
                            }
                            debug!("Health: {}", health.status);
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }
                }
            })
        };
        self.background_tasks.push(metrics_task);

        info!("{} background tasks running", self.background_tasks.len());
    }

    fn start_console(&mut self) {
        let console = ConsoleTransport::new(self.dispatcher.clone());

        let announcer =
            ConsoleTransport::spawn_announcer(self.broadcaster.subscribe(), tokio::io::stdout());
        self.background_tasks.push(announcer);

        let reader = tokio::spawn(async move {
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            match console.run(input, tokio::io::stdout()).await {
                Ok(handled) => info!("Console input closed after {} commands", handled),
                Err(e) => error!("Console transport failed: {}", e),
            }
        });
        self.background_tasks.push(reader);

        info!("Console chat adapter reading commands from stdin");
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        // Give aborted tasks a moment to unwind
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ChatMessage;
    use crate::types::PlayerIdentity;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.console = false;
        config.queue.max_queue_size = 2;
        config
    }

    #[tokio::test]
    async fn test_in_memory_service_wiring() {
        let app = AppState::new(test_config()).await.unwrap();
        assert!(!app.is_running().await);

        let dispatcher = app.dispatcher();
        let mut events = app.broadcaster().subscribe();

        dispatcher
            .handle(&ChatMessage::group(
                PlayerIdentity::new("u1", "alice"),
                "!joinqueue Ali",
            ))
            .await
            .unwrap();
        dispatcher
            .handle(&ChatMessage::group(
                PlayerIdentity::new("u2", "bob"),
                "!joinqueue Bobby",
            ))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert!(matches!(event, crate::types::LadderEvent::MatchStarted(_)));
        assert_eq!(app.lifecycle().stats().unwrap().matches_formed, 1);
        assert_eq!(app.context().store().player_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_rating_settings_rejected() {
        let mut config = test_config();
        config.rating.elo_k = -1.0;
        config.rating.algorithm = crate::config::RatingAlgorithm::Elo;

        assert!(matches!(
            AppState::new(config).await,
            Err(ServiceError::Configuration { .. })
        ));
    }
}
