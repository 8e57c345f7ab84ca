//! Match lifecycle manager
//!
//! This module provides the `MatchLifecycle` that owns the match queue and
//! every outstanding match, forms matches when the queue fills, applies
//! results through the rating engine and expires matches that never report.

use crate::config::QueueSettings;
use crate::error::{LadderError, Result};
use crate::events::EventPublisher;
use crate::ladder::LadderCache;
use crate::metrics::MetricsCollector;
use crate::queue::{MatchQueue, QueueAdd};
use crate::rating::RatingCalculator;
use crate::results::ResultListener;
use crate::store::PlayerStore;
use crate::types::{
    JoinOutcome, LeaveOutcome, LifecycleState, Match, MatchExpired, MatchOutcome, MatchResolved,
    MatchId, MatchStarted, MatchState, PlayerId, PlayerIdentity, PlayerRecord,
};
use crate::utils::{current_timestamp, generate_match_id, with_store_timeout};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Statistics about lifecycle operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStats {
    /// Total number of successful joins
    pub players_queued: u64,
    /// Total number of matches formed
    pub matches_formed: u64,
    /// Total number of matches resolved with a result
    pub matches_resolved: u64,
    /// Total number of matches expired without a result
    pub matches_expired: u64,
    /// Result events that matched no outstanding match
    pub result_events_ignored: u64,
    /// Current number of players waiting
    pub queue_length: usize,
    /// Current number of outstanding matches
    pub active_matches: usize,
}

/// State guarded by the lifecycle mutex
struct LifecycleInner {
    queue: MatchQueue,
    /// Matches not yet resolved or expired, in formation order
    outstanding: Vec<Match>,
    /// Most recent finished matches, newest last
    archive: VecDeque<Match>,
    stats: LifecycleStats,
}

impl LifecycleInner {
    fn in_outstanding_match(&self, player_id: &str) -> bool {
        self.outstanding.iter().any(|m| m.has_participant(player_id))
    }

    fn archive(&mut self, finished: Match, history_size: usize) {
        self.archive.push_back(finished);
        while self.archive.len() > history_size {
            self.archive.pop_front();
        }
    }

    fn refresh_gauges(&mut self) {
        self.stats.queue_length = self.queue.len();
        self.stats.active_matches = self.outstanding.len();
    }
}

/// The queue/match state machine
pub struct MatchLifecycle {
    inner: Mutex<LifecycleInner>,
    settings: QueueSettings,
    store_timeout: Duration,
    store: Arc<dyn PlayerStore>,
    rating_calculator: Arc<dyn RatingCalculator>,
    ladder: Arc<LadderCache>,
    event_publisher: Arc<dyn EventPublisher>,
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchLifecycle {
    /// Create a new lifecycle
    pub fn new(
        settings: QueueSettings,
        store_timeout: Duration,
        store: Arc<dyn PlayerStore>,
        rating_calculator: Arc<dyn RatingCalculator>,
        ladder: Arc<LadderCache>,
        event_publisher: Arc<dyn EventPublisher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            inner: Mutex::new(LifecycleInner {
                queue: MatchQueue::new(settings.max_queue_size),
                outstanding: Vec::new(),
                archive: VecDeque::new(),
                stats: LifecycleStats::default(),
            }),
            settings,
            store_timeout,
            store,
            rating_calculator,
            ladder,
            event_publisher,
            metrics_collector,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn ladder(&self) -> &Arc<LadderCache> {
        &self.ladder
    }

    pub fn store(&self) -> &Arc<dyn PlayerStore> {
        &self.store
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    fn lock(&self) -> Result<MutexGuard<'_, LifecycleInner>> {
        self.inner.lock().map_err(|_| {
            LadderError::Internal {
                message: "Failed to acquire lifecycle lock".to_string(),
            }
            .into()
        })
    }

    /// Run a store operation under the configured timeout, counting failures
    async fn store_op<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match with_store_timeout(operation, self.store_timeout, future).await {
            Ok(value) => Ok(value),
            Err(e) => {
                error!("Player store {} failed: {}", operation, e);
                self.metrics_collector.record_store_error(operation);
                Err(e)
            }
        }
    }

    /// Add a player to the queue.
    ///
    /// A player without a record gets one with the default rating; that
    /// requires an in-game name. The record is written before the player is
    /// queued, so a store failure leaves the queue untouched.
    pub async fn join(
        &self,
        identity: PlayerIdentity,
        in_game_name: Option<String>,
    ) -> Result<JoinOutcome> {
        if let Some(outcome) = self.join_precheck(&identity.id)? {
            self.record_join_outcome(&outcome);
            return Ok(outcome);
        }

        let created_record = match self.ensure_player_record(&identity, in_game_name).await {
            Ok(created) => created,
            Err(e) => {
                self.metrics_collector.record_join("error", false);
                return Err(e);
            }
        };

        if created_record {
            self.ladder.invalidate();
        }

        let (outcome, formed) = {
            let mut inner = self.lock()?;

            if inner.in_outstanding_match(&identity.id) {
                (JoinOutcome::InMatch, None)
            } else {
                match inner.queue.add(identity.clone()) {
                    QueueAdd::AlreadyQueued => (JoinOutcome::AlreadyQueued, None),
                    QueueAdd::Full => (JoinOutcome::QueueFull, None),
                    QueueAdd::Added(position) => {
                        inner.stats.players_queued += 1;
                        info!(
                            "Player {} joined the queue ({}/{})",
                            identity,
                            position,
                            inner.queue.capacity()
                        );

                        let formed = self.form_ready_match(&mut inner)?;
                        inner.refresh_gauges();
                        (
                            JoinOutcome::Joined {
                                position,
                                created_record,
                                formed_match: formed.clone(),
                            },
                            formed,
                        )
                    }
                }
            }
        };

        self.record_join_outcome(&outcome);

        if let Some(formed) = formed {
            self.announce_match(formed).await;
        }

        Ok(outcome)
    }

    fn join_precheck(&self, player_id: &str) -> Result<Option<JoinOutcome>> {
        let inner = self.lock()?;

        if inner.queue.contains(player_id) {
            return Ok(Some(JoinOutcome::AlreadyQueued));
        }
        if inner.in_outstanding_match(player_id) {
            return Ok(Some(JoinOutcome::InMatch));
        }
        if inner.queue.is_full() {
            return Ok(Some(JoinOutcome::QueueFull));
        }
        Ok(None)
    }

    fn record_join_outcome(&self, outcome: &JoinOutcome) {
        let (label, created) = match outcome {
            JoinOutcome::Joined { created_record, .. } => ("joined", *created_record),
            JoinOutcome::AlreadyQueued => ("already_queued", false),
            JoinOutcome::QueueFull => ("queue_full", false),
            JoinOutcome::InMatch => ("in_match", false),
        };
        self.metrics_collector.record_join(label, created);
        if let Ok(inner) = self.lock() {
            self.metrics_collector.set_queue_length(inner.queue.len());
        }
    }

    /// Look up the player's record, creating it on first join.
    /// Returns whether a record was created.
    async fn ensure_player_record(
        &self,
        identity: &PlayerIdentity,
        in_game_name: Option<String>,
    ) -> Result<bool> {
        let existing = self
            .store_op("find_by_identity", self.store.find_by_identity(&identity.id))
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let in_game_name = in_game_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LadderError::Validation {
                reason: "Please provide your in-game name: !joinqueue <in-game name>".to_string(),
            })?;

        let record = PlayerRecord::new(
            identity,
            Some(in_game_name.clone()),
            self.rating_calculator.initial_rating(),
        );
        let created = self
            .store_op("insert_if_absent", self.store.insert_if_absent(record))
            .await?;

        if created {
            info!(
                "Created player record for {} (in-game name {})",
                identity, in_game_name
            );
        }
        Ok(created)
    }

    /// Form a match if the queue is full and a match slot is free.
    /// Must be called with the lifecycle lock held.
    fn form_ready_match(&self, inner: &mut LifecycleInner) -> Result<Option<Match>> {
        if !inner.queue.is_full() {
            return Ok(None);
        }

        if inner.outstanding.len() >= self.settings.max_concurrent_matches {
            debug!(
                "Queue full but {} matches outstanding, formation deferred",
                inner.outstanding.len()
            );
            return Ok(None);
        }

        let participants = match inner.queue.take_full() {
            Ok(Some(participants)) => participants,
            Ok(None) => return Ok(None),
            Err(e) => {
                error!("Refusing to form a match: {}", e);
                return Err(e);
            }
        };

        let formed = Match {
            id: generate_match_id(),
            participants,
            formed_at: current_timestamp(),
            state: MatchState::Forming,
        };

        inner.outstanding.push(formed.clone());
        inner.stats.matches_formed += 1;
        self.metrics_collector.record_match_formed();

        let names: Vec<String> = formed.participants.iter().map(|p| p.to_string()).collect();
        info!("Formed match {} with {}", formed.id, names.join(", "));

        Ok(Some(formed))
    }

    /// Publish a freshly formed match and move it to AwaitingResult
    async fn announce_match(&self, formed: Match) {
        let event = MatchStarted {
            match_id: formed.id,
            participants: formed.participants.clone(),
            timestamp: current_timestamp(),
        };

        if let Err(e) = self.event_publisher.publish_match_started(event).await {
            warn!("Failed to publish start of match {}: {}", formed.id, e);
        }

        match self.lock() {
            Ok(mut inner) => {
                if let Some(m) = inner
                    .outstanding
                    .iter_mut()
                    .find(|m| m.id == formed.id && m.state == MatchState::Forming)
                {
                    m.state = MatchState::AwaitingResult;
                    debug!("Match {} awaiting result", formed.id);
                }
            }
            Err(e) => error!("Could not mark match {} as started: {}", formed.id, e),
        }
    }

    /// Remove a player from the queue. Participants of a formed match are
    /// not affected.
    pub fn leave(&self, player_id: &PlayerId) -> Result<LeaveOutcome> {
        let outcome = {
            let mut inner = self.lock()?;
            let outcome = inner.queue.remove(player_id);
            inner.refresh_gauges();
            self.metrics_collector.set_queue_length(inner.queue.len());
            outcome
        };

        match outcome {
            LeaveOutcome::Left => {
                info!("Player {} left the queue", player_id);
                self.metrics_collector.record_leave("left");
            }
            LeaveOutcome::NotQueued => {
                debug!("Player {} asked to leave but is not queued", player_id);
                self.metrics_collector.record_leave("not_queued");
            }
        }
        Ok(outcome)
    }

    /// Queued identities in join order
    pub fn queue_snapshot(&self) -> Result<Vec<PlayerIdentity>> {
        Ok(self.lock()?.queue.snapshot())
    }

    /// Overall coordinator state
    pub fn state(&self) -> Result<LifecycleState> {
        let inner = self.lock()?;
        let has = |state: MatchState| inner.outstanding.iter().any(|m| m.state == state);

        let state = if has(MatchState::Resolving) {
            LifecycleState::Resolving
        } else if has(MatchState::Forming) {
            LifecycleState::Forming
        } else if has(MatchState::AwaitingResult) {
            LifecycleState::AwaitingResult
        } else if !inner.queue.is_empty() {
            LifecycleState::Queuing
        } else {
            LifecycleState::Empty
        };
        Ok(state)
    }

    /// Matches formed and not yet resolved or expired
    pub fn outstanding_matches(&self) -> Result<Vec<Match>> {
        Ok(self.lock()?.outstanding.clone())
    }

    /// Finished matches, newest first
    pub fn recent_matches(&self) -> Result<Vec<Match>> {
        Ok(self.lock()?.archive.iter().rev().cloned().collect())
    }

    /// Get current lifecycle statistics
    pub fn stats(&self) -> Result<LifecycleStats> {
        let mut inner = self.lock()?;
        inner.refresh_gauges();
        Ok(inner.stats.clone())
    }

    /// Apply a match result.
    ///
    /// Returns `Ok(None)` when the result matches no outstanding match; that
    /// is logged and otherwise ignored. On any failure the match goes back
    /// to AwaitingResult so a later artifact can still resolve it.
    pub async fn handle_result(&self, outcome: MatchOutcome) -> Result<Option<MatchResolved>> {
        let target = {
            let mut inner = self.lock()?;

            let index = match find_target(&inner.outstanding, &outcome) {
                Some(index) => index,
                None => {
                    inner.stats.result_events_ignored += 1;
                    self.metrics_collector.record_result_event("ignored");
                    warn!(
                        "Result event (match {}) matches no match awaiting a result; ignoring",
                        outcome
                            .match_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "unspecified".to_string())
                    );
                    return Ok(None);
                }
            };

            let target = &mut inner.outstanding[index];
            if let Err(e) = validate_standings(target, &outcome) {
                self.metrics_collector.record_result_event("invalid");
                warn!("Result for match {} rejected: {}", target.id, e);
                return Err(e);
            }

            target.state = MatchState::Resolving;
            info!("Resolving match {}", target.id);
            target.clone()
        };

        // Covers errors, panics and cancellation of this future alike
        let mut guard = ResolvingGuard::new(&self.inner, target.id);

        match self.apply_result(&target, &outcome).await {
            Ok(resolved) => {
                let next = {
                    let mut inner = self.lock()?;
                    if let Some(index) = inner.outstanding.iter().position(|m| m.id == target.id) {
                        let mut finished = inner.outstanding.remove(index);
                        finished.state = MatchState::Resolved;
                        inner.archive(finished, self.settings.match_history_size);
                    }
                    guard.disarm();
                    inner.stats.matches_resolved += 1;
                    let next = self.form_ready_match(&mut inner)?;
                    inner.refresh_gauges();
                    next
                };

                let played = (resolved.timestamp - target.formed_at)
                    .to_std()
                    .unwrap_or_default();
                self.metrics_collector.record_match_resolved(played);
                self.metrics_collector.record_result_event("applied");
                info!(
                    "Match {} resolved (quality {:.3})",
                    target.id, resolved.match_quality
                );

                if let Err(e) = self
                    .event_publisher
                    .publish_match_resolved(resolved.clone())
                    .await
                {
                    warn!("Failed to publish resolution of match {}: {}", target.id, e);
                }

                if let Some(next) = next {
                    self.announce_match(next).await;
                }

                Ok(Some(resolved))
            }
            Err(e) => {
                drop(guard);
                self.metrics_collector.record_result_event("failed");
                error!(
                    "Failed to apply result for match {}, still awaiting a result: {}",
                    target.id, e
                );
                Err(e)
            }
        }
    }

    /// Compute and persist new ratings for a resolving match
    async fn apply_result(&self, target: &Match, outcome: &MatchOutcome) -> Result<MatchResolved> {
        let mut participants = Vec::with_capacity(target.participants.len());
        for player_id in target.participant_ids() {
            let record = self
                .store_op("find_by_identity", self.store.find_by_identity(&player_id))
                .await?
                .ok_or_else(|| {
                    LadderError::store(
                        "find_by_identity",
                        format!("no record for participant {}", player_id),
                    )
                })?;
            participants.push((player_id, record.rating));
        }

        let start = Instant::now();
        let calculation = self
            .rating_calculator
            .calculate_rating_changes(&participants, outcome)?;
        self.metrics_collector
            .record_rating_calculation(start.elapsed());

        let updates: Vec<_> = calculation
            .rating_changes
            .iter()
            .map(|change| (change.player_id.clone(), change.new_rating))
            .collect();

        let persisted = self
            .store_op("update_ratings", self.store.update_ratings(&updates))
            .await;
        // A timed out write may still have landed
        self.ladder.invalidate();
        persisted?;

        Ok(MatchResolved {
            match_id: target.id,
            rating_changes: calculation.rating_changes,
            match_quality: calculation.match_quality,
            timestamp: current_timestamp(),
        })
    }

    /// Expire matches that have waited longer than the result timeout
    pub async fn expire_stale_matches(&self) -> Result<usize> {
        self.expire_matches_at(current_timestamp()).await
    }

    /// Expire matches formed more than the result timeout before `now`
    pub async fn expire_matches_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let timeout = chrono::Duration::from_std(self.settings.result_timeout()).map_err(|e| {
            LadderError::Configuration {
                message: format!("Invalid result timeout: {}", e),
            }
        })?;

        let (expired, next) = {
            let mut inner = self.lock()?;

            let (stale, kept): (Vec<Match>, Vec<Match>) =
                inner.outstanding.drain(..).partition(|m| {
                    m.state != MatchState::Resolving && now - m.formed_at > timeout
                });
            inner.outstanding = kept;

            for m in &stale {
                let mut finished = m.clone();
                finished.state = MatchState::Expired;
                inner.archive(finished, self.settings.match_history_size);
                inner.stats.matches_expired += 1;
                self.metrics_collector.record_match_expired();
            }

            let next = if stale.is_empty() {
                None
            } else {
                self.form_ready_match(&mut inner)?
            };
            inner.refresh_gauges();
            (stale, next)
        };

        for m in &expired {
            warn!(
                "Match {} expired after waiting {}s for a result",
                m.id, self.settings.result_timeout_seconds
            );
            let event = MatchExpired {
                match_id: m.id,
                participants: m.participants.clone(),
                timestamp: current_timestamp(),
            };
            if let Err(e) = self.event_publisher.publish_match_expired(event).await {
                warn!("Failed to publish expiry of match {}: {}", m.id, e);
            }
        }

        if let Some(next) = next {
            self.announce_match(next).await;
        }

        Ok(expired.len())
    }

    /// Start the periodic result-timeout check
    pub fn start_expiry_task(self: Arc<Self>) -> JoinHandle<()> {
        let lifecycle = Arc::clone(&self);
        let period = self.settings.expiry_check_interval();

        let handle = tokio::spawn(async move {
            let mut expiry_interval = interval(period);

            loop {
                expiry_interval.tick().await;

                match lifecycle.expire_stale_matches().await {
                    Ok(0) => {}
                    Ok(count) => info!("Expired {} stale matches", count),
                    Err(e) => error!("Error during match expiry: {}", e),
                }
            }
        });

        info!("Started match expiry task (every {:?})", period);
        handle
    }
}

#[async_trait]
impl ResultListener for MatchLifecycle {
    async fn on_result(&self, outcome: MatchOutcome) -> Result<()> {
        self.handle_result(outcome).await.map(|_| ())
    }
}

/// Puts a resolving match back to AwaitingResult unless disarmed
struct ResolvingGuard<'a> {
    inner: &'a Mutex<LifecycleInner>,
    match_id: MatchId,
    armed: bool,
}

impl<'a> ResolvingGuard<'a> {
    fn new(inner: &'a Mutex<LifecycleInner>, match_id: MatchId) -> Self {
        Self {
            inner,
            match_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // Recover the state even if a panic poisoned the lock
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(m) = inner
            .outstanding
            .iter_mut()
            .find(|m| m.id == self.match_id && m.state == MatchState::Resolving)
        {
            m.state = MatchState::AwaitingResult;
            warn!("Resolution of match {} did not complete, awaiting a result again", m.id);
        }
    }
}

/// Index of the match an outcome refers to: by id when given, otherwise the
/// unique awaiting match whose participants are exactly the named players
fn find_target(outstanding: &[Match], outcome: &MatchOutcome) -> Option<usize> {
    let awaiting = |m: &Match| matches!(m.state, MatchState::Forming | MatchState::AwaitingResult);

    if let Some(match_id) = outcome.match_id {
        return outstanding
            .iter()
            .position(|m| m.id == match_id && awaiting(m));
    }

    let named: HashSet<&str> = outcome
        .standings
        .iter()
        .map(|s| s.player_id.as_str())
        .collect();

    let mut candidates = outstanding.iter().enumerate().filter(|(_, m)| {
        awaiting(m)
            && m.participants.len() == named.len()
            && m.participants.iter().all(|p| named.contains(p.id.as_str()))
    });

    match (candidates.next(), candidates.next()) {
        (Some((index, _)), None) => Some(index),
        _ => None,
    }
}

/// The outcome must rank every participant exactly once and nobody else
fn validate_standings(target: &Match, outcome: &MatchOutcome) -> Result<()> {
    let mut named = HashSet::new();
    for standing in &outcome.standings {
        if !target.has_participant(&standing.player_id) {
            return Err(LadderError::InvalidResult {
                reason: format!(
                    "{} did not play in match {}",
                    standing.player_id, target.id
                ),
            }
            .into());
        }
        if !named.insert(standing.player_id.as_str()) {
            return Err(LadderError::InvalidResult {
                reason: format!("{} ranked twice", standing.player_id),
            }
            .into());
        }
    }

    if named.len() != target.participants.len() {
        return Err(LadderError::InvalidResult {
            reason: format!(
                "{} of {} participants ranked",
                named.len(),
                target.participants.len()
            ),
        }
        .into());
    }
    Ok(())
}
