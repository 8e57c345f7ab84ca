//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the ladder-room coordinator:
//! queue traffic, match lifecycle, ladder rebuilds and store health.

use crate::lifecycle::LifecycleStats;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the coordinator
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Match lifecycle metrics
    match_metrics: MatchMetrics,

    /// Ladder cache metrics
    ladder_metrics: LadderMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Chat commands handled, by command name
    pub commands_total: IntCounterVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Join requests by outcome (joined, already_queued, queue_full, in_match, error)
    pub joins_total: IntCounterVec,

    /// Leave requests by outcome (left, not_queued)
    pub leaves_total: IntCounterVec,

    /// Players currently waiting in the queue
    pub queue_length: IntGauge,

    /// Player records created on first join
    pub players_created_total: IntCounter,
}

/// Match lifecycle metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Total matches formed
    pub matches_formed_total: IntCounter,

    /// Total matches resolved with a result
    pub matches_resolved_total: IntCounter,

    /// Total matches expired without a result
    pub matches_expired_total: IntCounter,

    /// Matches formed and not yet finished
    pub active_matches: IntGauge,

    /// Result events by outcome (applied, ignored, invalid, failed)
    pub result_events_total: IntCounterVec,

    /// Time from formation to resolution
    pub match_duration_seconds: Histogram,
}

/// Ladder cache metrics
#[derive(Clone)]
pub struct LadderMetrics {
    /// Full rebuilds from the player store
    pub rebuilds_total: IntCounter,

    /// Rebuild duration
    pub rebuild_duration_seconds: Histogram,

    /// Entries in the last rebuilt ladder
    pub ladder_size: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Rating calculation time
    pub rating_calculation_duration: Histogram,

    /// Store failures by operation
    pub store_errors_total: IntCounterVec,

    /// Command handling duration by command
    pub command_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let ladder_metrics = LadderMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            ladder_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn ladder(&self) -> &LadderMetrics {
        &self.ladder_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh gauges from lifecycle stats
    pub fn update_from_lifecycle_stats(&self, stats: &LifecycleStats) {
        self.queue_metrics
            .queue_length
            .set(stats.queue_length as i64);
        self.match_metrics
            .active_matches
            .set(stats.active_matches as i64);
    }

    /// Record the outcome of a join request
    pub fn record_join(&self, outcome: &str, created_record: bool) {
        self.queue_metrics
            .joins_total
            .with_label_values(&[outcome])
            .inc();

        if created_record {
            self.queue_metrics.players_created_total.inc();
        }
    }

    /// Record the outcome of a leave request
    pub fn record_leave(&self, outcome: &str) {
        self.queue_metrics
            .leaves_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn set_queue_length(&self, length: usize) {
        self.queue_metrics.queue_length.set(length as i64);
    }

    /// Record a match being formed
    pub fn record_match_formed(&self) {
        self.match_metrics.matches_formed_total.inc();
        self.match_metrics.active_matches.inc();
    }

    /// Record a match being resolved after `duration` in play
    pub fn record_match_resolved(&self, duration: Duration) {
        self.match_metrics.matches_resolved_total.inc();
        self.match_metrics.active_matches.dec();
        self.match_metrics
            .match_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn record_match_expired(&self) {
        self.match_metrics.matches_expired_total.inc();
        self.match_metrics.active_matches.dec();
    }

    /// Record how a result event was handled
    pub fn record_result_event(&self, outcome: &str) {
        self.match_metrics
            .result_events_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a ladder rebuild
    pub fn record_ladder_rebuild(&self, duration: Duration, entries: usize) {
        self.ladder_metrics.rebuilds_total.inc();
        self.ladder_metrics
            .rebuild_duration_seconds
            .observe(duration.as_secs_f64());
        self.ladder_metrics.ladder_size.set(entries as i64);
    }

    /// Record rating calculation duration
    pub fn record_rating_calculation(&self, duration: Duration) {
        self.performance_metrics
            .rating_calculation_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a failed or timed out store operation
    pub fn record_store_error(&self, operation: &str) {
        self.performance_metrics
            .store_errors_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Record a handled chat command
    pub fn record_command(&self, command: &str, duration: Duration) {
        self.service_metrics
            .commands_total
            .with_label_values(&[command])
            .inc();
        self.performance_metrics
            .command_duration
            .with_label_values(&[command])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("ladder_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "ladder_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("ladder_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let commands_total = IntCounterVec::new(
            Opts::new("ladder_room_commands_total", "Chat commands handled"),
            &["command"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            commands_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounterVec::new(
            Opts::new("ladder_room_joins_total", "Join requests by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let leaves_total = IntCounterVec::new(
            Opts::new("ladder_room_leaves_total", "Leave requests by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(leaves_total.clone()))?;

        let queue_length = IntGauge::new(
            "ladder_room_queue_length",
            "Players currently waiting in queue",
        )?;
        registry.register(Box::new(queue_length.clone()))?;

        let players_created_total = IntCounter::new(
            "ladder_room_players_created_total",
            "Player records created on first join",
        )?;
        registry.register(Box::new(players_created_total.clone()))?;

        Ok(Self {
            joins_total,
            leaves_total,
            queue_length,
            players_created_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_formed_total =
            IntCounter::new("ladder_room_matches_formed_total", "Total matches formed")?;
        registry.register(Box::new(matches_formed_total.clone()))?;

        let matches_resolved_total = IntCounter::new(
            "ladder_room_matches_resolved_total",
            "Total matches resolved with a result",
        )?;
        registry.register(Box::new(matches_resolved_total.clone()))?;

        let matches_expired_total = IntCounter::new(
            "ladder_room_matches_expired_total",
            "Total matches expired without a result",
        )?;
        registry.register(Box::new(matches_expired_total.clone()))?;

        let active_matches = IntGauge::new(
            "ladder_room_active_matches",
            "Matches formed and awaiting a result",
        )?;
        registry.register(Box::new(active_matches.clone()))?;

        let result_events_total = IntCounterVec::new(
            Opts::new("ladder_room_result_events_total", "Result events by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(result_events_total.clone()))?;

        let match_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ladder_room_match_duration_seconds",
                "Time from match formation to resolution",
            )
            .buckets(vec![60.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0, 7200.0]),
        )?;
        registry.register(Box::new(match_duration_seconds.clone()))?;

        Ok(Self {
            matches_formed_total,
            matches_resolved_total,
            matches_expired_total,
            active_matches,
            result_events_total,
            match_duration_seconds,
        })
    }
}

impl LadderMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rebuilds_total = IntCounter::new(
            "ladder_room_ladder_rebuilds_total",
            "Ladder rebuilds from the player store",
        )?;
        registry.register(Box::new(rebuilds_total.clone()))?;

        let rebuild_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "ladder_room_ladder_rebuild_duration_seconds",
                "Ladder rebuild time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(rebuild_duration_seconds.clone()))?;

        let ladder_size =
            IntGauge::new("ladder_room_ladder_size", "Entries in the cached ladder")?;
        registry.register(Box::new(ladder_size.clone()))?;

        Ok(Self {
            rebuilds_total,
            rebuild_duration_seconds,
            ladder_size,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_calculation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ladder_room_rating_calculation_duration_seconds",
                "Rating calculation time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        let store_errors_total = IntCounterVec::new(
            Opts::new(
                "ladder_room_store_errors_total",
                "Player store failures by operation",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(store_errors_total.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new(
                "ladder_room_command_duration_seconds",
                "Chat command handling time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["command"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        Ok(Self {
            rating_calculation_duration,
            store_errors_total,
            command_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _queue = collector.queue();
        let _matches = collector.matches();
        let _ladder = collector.ladder();
        let _performance = collector.performance();
    }

    #[test]
    fn test_join_and_leave_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_join("joined", true);
        collector.record_join("joined", false);
        collector.record_join("already_queued", false);
        collector.record_leave("left");

        assert_eq!(
            collector
                .queue()
                .joins_total
                .with_label_values(&["joined"])
                .get(),
            2
        );
        assert_eq!(collector.queue().players_created_total.get(), 1);
    }

    #[test]
    fn test_match_lifecycle_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_match_formed();
        collector.record_match_formed();
        assert_eq!(collector.matches().active_matches.get(), 2);

        collector.record_match_resolved(Duration::from_secs(600));
        collector.record_match_expired();
        assert_eq!(collector.matches().active_matches.get(), 0);
        assert_eq!(collector.matches().matches_formed_total.get(), 2);
        assert_eq!(collector.matches().matches_resolved_total.get(), 1);
        assert_eq!(collector.matches().matches_expired_total.get(), 1);
    }

    #[test]
    fn test_ladder_and_store_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_ladder_rebuild(Duration::from_millis(3), 42);
        collector.record_store_error("insert_if_absent");
        collector.record_rating_calculation(Duration::from_nanos(1000));

        assert_eq!(collector.ladder().rebuilds_total.get(), 1);
        assert_eq!(collector.ladder().ladder_size.get(), 42);
        assert_eq!(
            collector
                .performance()
                .store_errors_total
                .with_label_values(&["insert_if_absent"])
                .get(),
            1
        );
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().unwrap();
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
