//! Health checks
//!
//! This module provides health check functionality for the ladder
//! coordinator, including readiness and liveness probes.

use crate::lifecycle::LifecycleStats;
use crate::service::app::ServiceContext;
use crate::utils::with_store_timeout;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Lifecycle counters and gauges
    pub lifecycle: LifecycleStats,
    /// Players with a record, when the store answered
    pub registered_players: Option<usize>,
    /// Current coordinator state
    pub state: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(context: &ServiceContext) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(context).await,
            Self::check_player_store(context).await,
            Self::check_lifecycle(context),
        ];

        let status = Self::overall_status(&checks);
        let stats = Self::gather_service_stats(context).await;

        Ok(HealthCheck {
            status,
            service: context.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if context.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify commands can be served
    pub async fn readiness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if !context.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let checks = [
            Self::check_player_store(context).await,
            Self::check_lifecycle(context),
        ];
        Ok(Self::overall_status(&checks))
    }

    /// Worst component status wins
    fn overall_status(checks: &[ComponentCheck]) -> HealthStatus {
        let mut overall = HealthStatus::Healthy;
        for check in checks {
            match check.status {
                HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
                HealthStatus::Degraded => overall = HealthStatus::Degraded,
                HealthStatus::Healthy => {}
            }
        }
        overall
    }

    async fn check_service_running(context: &ServiceContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_player_store(context: &ServiceContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match with_store_timeout(
            "player_count",
            context.config().store_timeout(),
            context.store().player_count(),
        )
        .await
        {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Player store health check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Player store unreachable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "player_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_lifecycle(context: &ServiceContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match context.lifecycle().stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Unhealthy,
                Some(format!("Lifecycle unavailable: {}", e)),
            ),
        };

        ComponentCheck {
            name: "match_lifecycle".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn gather_service_stats(context: &ServiceContext) -> ServiceStats {
        let lifecycle = context.lifecycle();

        let registered_players = match with_store_timeout(
            "player_count",
            context.config().store_timeout(),
            context.store().player_count(),
        )
        .await
        {
            Ok(count) => Some(count),
            Err(e) => {
                debug!("Player count unavailable for health stats: {}", e);
                None
            }
        };

        ServiceStats {
            lifecycle: lifecycle.stats().unwrap_or_default(),
            registered_players,
            state: lifecycle
                .state()
                .map(|state| state.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::events::MockEventPublisher;
    use crate::ladder::LadderCache;
    use crate::lifecycle::MatchLifecycle;
    use crate::metrics::MetricsCollector;
    use crate::rating::create_calculator;
    use crate::store::{InMemoryPlayerStore, PlayerStore};
    use std::sync::Arc;

    fn test_context(store: Arc<dyn PlayerStore>) -> ServiceContext {
        let config = AppConfig::default();
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let ladder = Arc::new(LadderCache::new(
            store.clone(),
            config.ladder.order,
            config.store_timeout(),
        ));
        let lifecycle = Arc::new(MatchLifecycle::new(
            config.queue.clone(),
            config.store_timeout(),
            store.clone(),
            create_calculator(&config.rating).unwrap(),
            ladder,
            Arc::new(MockEventPublisher::new()),
            metrics.clone(),
        ));
        ServiceContext::new(config, store, lifecycle, metrics)
    }

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let context = test_context(Arc::new(InMemoryPlayerStore::new()));

        let health = HealthCheck::check(&context).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(
            HealthCheck::liveness_check(&context).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_running_service_is_healthy() {
        let context = test_context(Arc::new(InMemoryPlayerStore::new()));
        context.set_running(true).await;

        let health = HealthCheck::check(&context).await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 3);
        assert_eq!(health.stats.registered_players, Some(0));
        assert_eq!(health.stats.state, "Empty");
        assert_eq!(
            HealthCheck::readiness_check(&context).await.unwrap(),
            HealthStatus::Healthy
        );

        let json = health.to_json().unwrap();
        assert!(json.contains("\"status\": \"healthy\""));
    }
}
