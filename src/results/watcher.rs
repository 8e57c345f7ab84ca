//! Directory-polling result source
//!
//! Polls a directory for new `*.json` result files. Files present when the
//! watcher starts belong to earlier runs and are never delivered. Each new
//! file is read once; a document that is cut off mid-write is retried on the
//! next poll, anything else malformed is logged and skipped.

use crate::error::{LadderError, Result};
use crate::results::artifact::ResultArtifact;
use crate::results::ResultListener;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Polls a directory and notifies listeners of each new result artifact
pub struct DirectoryResultWatcher {
    dir: PathBuf,
    poll_interval: Duration,
    number_of_rounds: u32,
    listeners: RwLock<Vec<Arc<dyn ResultListener>>>,
    seen: Mutex<HashSet<PathBuf>>,
}

impl DirectoryResultWatcher {
    pub fn new(dir: impl Into<PathBuf>, poll_interval: Duration, number_of_rounds: u32) -> Self {
        Self {
            dir: dir.into(),
            poll_interval,
            number_of_rounds,
            listeners: RwLock::new(Vec::new()),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Register a listener for subsequent artifacts
    pub fn subscribe(&self, listener: Arc<dyn ResultListener>) -> Result<()> {
        let mut listeners = self.listeners.write().map_err(|_| LadderError::Internal {
            message: "Failed to acquire result listeners lock".to_string(),
        })?;
        listeners.push(listener);
        Ok(())
    }

    /// Mark every result file currently in the directory as already handled
    pub async fn baseline(&self) -> Result<usize> {
        let existing = self.list_artifacts().await?;
        let mut seen = self.seen_lock()?;
        let count = existing.len();
        seen.extend(existing);
        Ok(count)
    }

    /// Deliver every result file that appeared since the last poll.
    ///
    /// Returns how many artifacts were delivered to listeners.
    pub async fn poll_once(&self) -> Result<usize> {
        let new_files: Vec<PathBuf> = {
            let files = self.list_artifacts().await?;
            let mut seen = self.seen_lock()?;
            // Forget files that were removed from the directory
            let listed: HashSet<&PathBuf> = files.iter().collect();
            seen.retain(|path| listed.contains(path));
            files
                .iter()
                .filter(|path| seen.insert((*path).clone()))
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        for path in new_files {
            if self.process_file(&path).await? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Baseline the directory, then poll it on an interval until aborted
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let watcher = Arc::clone(&self);

        tokio::spawn(async move {
            match watcher.baseline().await {
                Ok(count) => info!(
                    "Watching {} for match results ({} existing files ignored)",
                    watcher.dir.display(),
                    count
                ),
                Err(e) => warn!(
                    "Could not list {} at start-up, all files will be treated as new: {}",
                    watcher.dir.display(),
                    e
                ),
            }

            let mut poll_interval = interval(watcher.poll_interval);
            poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                poll_interval.tick().await;

                if let Err(e) = watcher.poll_once().await {
                    error!("Error polling {} for results: {}", watcher.dir.display(), e);
                }
            }
        })
    }

    /// Read, parse and dispatch one file. Returns whether it was delivered.
    async fn process_file(&self, path: &Path) -> Result<bool> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Unreadable result file {}: {}", path.display(), e);
                return Ok(false);
            }
        };

        let artifact: ResultArtifact = match serde_json::from_str(&contents) {
            Ok(artifact) => artifact,
            Err(e) if e.is_eof() => {
                debug!("Result file {} is incomplete, retrying later", path.display());
                self.seen_lock()?.remove(path);
                return Ok(false);
            }
            Err(e) => {
                warn!("Malformed result file {}: {}", path.display(), e);
                return Ok(false);
            }
        };

        let outcome = match artifact.into_outcome(self.number_of_rounds) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Rejected result file {}: {}", path.display(), e);
                return Ok(false);
            }
        };

        info!(
            "Match result available from {} ({} standings)",
            path.display(),
            outcome.standings.len()
        );

        let listeners = self
            .listeners
            .read()
            .map_err(|_| LadderError::Internal {
                message: "Failed to acquire result listeners lock".to_string(),
            })?
            .clone();

        for listener in listeners {
            if let Err(e) = listener.on_result(outcome.clone()).await {
                error!("Result listener failed for {}: {}", path.display(), e);
            }
        }

        Ok(true)
    }

    async fn list_artifacts(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            LadderError::Internal {
                message: format!("Failed to read {}: {}", self.dir.display(), e),
            }
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| LadderError::Internal {
            message: format!("Failed to read {}: {}", self.dir.display(), e),
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }

        // Oldest name first keeps delivery order stable for timestamped files
        files.sort();
        Ok(files)
    }

    fn seen_lock(&self) -> Result<std::sync::MutexGuard<'_, HashSet<PathBuf>>> {
        self.seen.lock().map_err(|_| {
            LadderError::Internal {
                message: "Failed to acquire seen files lock".to_string(),
            }
            .into()
        })
    }
}
