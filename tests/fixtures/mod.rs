//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ladder_room::commands::{ChatMessage, CommandDispatcher, CommandReply};
use ladder_room::config::{LadderOrder, QueueSettings, RatingSettings};
use ladder_room::error::Result;
use ladder_room::events::MockEventPublisher;
use ladder_room::ladder::LadderCache;
use ladder_room::lifecycle::MatchLifecycle;
use ladder_room::metrics::MetricsCollector;
use ladder_room::rating::create_calculator;
use ladder_room::store::{InMemoryPlayerStore, PlayerStore};
use ladder_room::types::{PlayerId, PlayerIdentity, PlayerRating, PlayerRecord};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory store that can be told to fail, slow down, and that counts calls
#[derive(Default)]
pub struct TestStore {
    inner: InMemoryPlayerStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    delay_ms: AtomicU64,
    all_records_calls: AtomicUsize,
    writes: AtomicUsize,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails
    pub fn failing() -> Self {
        let store = Self::new();
        store.set_failing_reads(true);
        store.set_failing_writes(true);
        store
    }

    /// A store whose every call takes `delay`
    pub fn slow(delay: Duration) -> Self {
        let store = Self::new();
        store.set_delay(delay);
        store
    }

    pub fn set_failing_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_failing_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of full reads, i.e. ladder rebuilds that reached the store
    pub fn all_records_calls(&self) -> usize {
        self.all_records_calls.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn before_read(&self) -> Result<()> {
        self.pause().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("simulated read failure"));
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<()> {
        self.pause().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("simulated write failure"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl PlayerStore for TestStore {
    async fn find_by_identity(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>> {
        self.before_read().await?;
        self.inner.find_by_identity(player_id).await
    }

    async fn insert_if_absent(&self, record: PlayerRecord) -> Result<bool> {
        self.before_write().await?;
        self.inner.insert_if_absent(record).await
    }

    async fn update_rating(&self, player_id: &PlayerId, rating: PlayerRating) -> Result<()> {
        self.before_write().await?;
        self.inner.update_rating(player_id, rating).await
    }

    async fn update_ratings(&self, updates: &[(PlayerId, PlayerRating)]) -> Result<()> {
        self.before_write().await?;
        self.inner.update_ratings(updates).await
    }

    async fn all_records(&self) -> Result<Vec<PlayerRecord>> {
        self.all_records_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await?;
        self.inner.all_records().await
    }

    async fn player_count(&self) -> Result<usize> {
        self.before_read().await?;
        self.inner.player_count().await
    }
}

/// A fully wired coordinator over a `TestStore`
pub struct TestSystem {
    pub store: Arc<TestStore>,
    pub publisher: Arc<MockEventPublisher>,
    pub metrics: Arc<MetricsCollector>,
    pub ladder: Arc<LadderCache>,
    pub lifecycle: Arc<MatchLifecycle>,
    pub dispatcher: Arc<CommandDispatcher>,
}

impl TestSystem {
    /// Send a group-channel message and return the reply
    pub async fn say(&self, player: &PlayerIdentity, content: &str) -> Option<CommandReply> {
        self.dispatcher
            .handle(&ChatMessage::group(player.clone(), content))
            .await
    }
}

pub fn queue_settings(max_queue_size: usize, max_concurrent_matches: usize) -> QueueSettings {
    QueueSettings {
        max_queue_size,
        max_concurrent_matches,
        ..QueueSettings::default()
    }
}

pub fn create_test_system(settings: QueueSettings, store: Arc<TestStore>) -> TestSystem {
    create_test_system_with(settings, store, Duration::from_millis(500))
}

pub fn create_test_system_with(
    settings: QueueSettings,
    store: Arc<TestStore>,
    store_timeout: Duration,
) -> TestSystem {
    let publisher = Arc::new(MockEventPublisher::new());
    let metrics = Arc::new(MetricsCollector::new().expect("metrics collector"));
    let ladder = Arc::new(
        LadderCache::new(store.clone(), LadderOrder::Descending, store_timeout)
            .with_metrics(metrics.clone()),
    );
    let lifecycle = Arc::new(MatchLifecycle::new(
        settings,
        store_timeout,
        store.clone(),
        create_calculator(&RatingSettings::default()).expect("rating calculator"),
        ladder.clone(),
        publisher.clone(),
        metrics.clone(),
    ));
    let dispatcher = Arc::new(CommandDispatcher::new(lifecycle.clone(), metrics.clone()));

    TestSystem {
        store,
        publisher,
        metrics,
        ladder,
        lifecycle,
        dispatcher,
    }
}

pub fn player(n: usize) -> PlayerIdentity {
    PlayerIdentity::new(format!("player-{}", n), format!("Player{}", n))
}

/// Fresh empty directory under the system temp dir
pub fn temp_dir(prefix: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
