//! Cleanup Scheduler
//!
//! Background loop that guarantees bounded-lifetime deletion of session
//! artifacts. Wakes on a fixed interval, scans the artifact store through
//! the retention policy, deletes expired sessions from both the store and
//! the registry, and records a [`CleanupRun`] per pass.
//!
//! State machine: Stopped → Running → Stopped, nothing else. `start` is
//! idempotent and never spawns a second loop; `stop` interrupts the sleep
//! immediately but waits for an in-flight pass to finish before
//! returning, so no orphaned pass keeps running after it.
//!
//! The timer tick and [`CleanupScheduler::force_run`] both funnel through
//! one `tokio::sync::Mutex` pass token: two deletion passes never execute
//! concurrently, which would double-count statistics and race on
//! partially deleted artifacts.
//!
//! A failure deleting one session never aborts the pass; it is logged
//! with its session ID, counted in `failed`, and the pass moves on.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::registry::SessionRegistry;
use crate::retention::RetentionPolicy;
use crate::store::{ArtifactStore, FileStats, Removed};

/// Result of one execution of the deletion routine.
///
/// Not persisted; returned to the caller of `force_run` and logged by the
/// timer path.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupRun {
    pub sessions_cleaned: usize,
    pub charts_cleaned: usize,
    pub failed: usize,
    pub stats_before: FileStats,
    pub stats_after: FileStats,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
    pub message: String,
}

/// Operator-facing status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CleanupStatus {
    pub running: bool,
    pub cleanup_interval_seconds: u64,
    pub thread_alive: bool,
    pub passes_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<CleanupRun>,
    pub file_stats: FileStats,
}

/// Operator-facing configuration view
#[derive(Debug, Clone, Serialize)]
pub struct CleanupConfigView {
    pub auto_cleanup_enabled: bool,
    pub cleanup_interval_seconds: u64,
    pub ttl_seconds: i64,
    pub temp_directory: String,
}

struct LoopTask {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Owns the periodic cleanup loop and the one-pass-at-a-time token.
///
/// Passed explicitly (as `Arc<CleanupScheduler>`) to whatever control
/// surface fronts it; there is no ambient singleton.
pub struct CleanupScheduler {
    store: Arc<dyn ArtifactStore>,
    registry: Arc<SessionRegistry>,
    policy: RetentionPolicy,
    interval: Duration,
    pass_token: tokio::sync::Mutex<()>,
    task: Mutex<Option<LoopTask>>,
    last_run: RwLock<Option<CleanupRun>>,
    passes_total: AtomicU64,
}

impl CleanupScheduler {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        registry: Arc<SessionRegistry>,
        policy: RetentionPolicy,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            policy,
            interval,
            pass_token: tokio::sync::Mutex::new(()),
            task: Mutex::new(None),
            last_run: RwLock::new(None),
            passes_total: AtomicU64::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Start the periodic loop. Idempotent: calling `start` while already
    /// running is a no-op and returns `false` instead of spawning a
    /// second concurrent loop.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if let Some(existing) = task.as_ref() {
            if !existing.handle.is_finished() {
                warn!("cleanup scheduler already running, start ignored");
                return false;
            }
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                interval_secs = scheduler.interval.as_secs(),
                "cleanup loop started"
            );
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = scheduler.run_pass(Utc::now()).await {
                            // Store unavailability: log and retry next tick
                            error!(error = %e, "cleanup pass failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("cleanup loop stopped");
                        break;
                    }
                }
            }
        });

        *task = Some(LoopTask { handle, shutdown });
        true
    }

    /// Stop the periodic loop.
    ///
    /// Interrupts the sleeping wait immediately and waits for any
    /// in-flight pass to finish before returning. Safe to call from a
    /// different task than the one running the loop, and a no-op when
    /// already stopped.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(LoopTask { handle, shutdown }) = task {
            let _ = shutdown.send(true);
            if let Err(e) = handle.await {
                error!(error = %e, "cleanup loop task panicked");
            }
        }
    }

    /// Whether the periodic loop is currently running
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of completed passes since construction
    pub fn passes_total(&self) -> u64 {
        self.passes_total.load(Ordering::Relaxed)
    }

    /// Last completed pass, if any
    pub fn last_run(&self) -> Option<CleanupRun> {
        self.last_run.read().clone()
    }

    /// Execute one deletion pass at the given `now` snapshot.
    ///
    /// Serialized against the timer and other callers by the pass token.
    /// Sessions created after the snapshot are never expired by it, since
    /// expiry compares their `created_at` against this fixed `now`.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<CleanupRun> {
        let _token = self.pass_token.lock().await;
        let started = std::time::Instant::now();

        let stats_before = self.store.stats();
        let entries = self.store.list()?;

        let mut sessions_cleaned = 0usize;
        let mut charts_cleaned = 0usize;
        let mut failed = 0usize;

        for entry in entries {
            if !self.policy.is_expired(entry.created_at, now) {
                continue;
            }
            match self.store.delete(&entry.session_id) {
                Ok(removed) => {
                    if removed.upload {
                        sessions_cleaned += 1;
                    }
                    if removed.chart {
                        charts_cleaned += 1;
                    }
                    if removed.any() {
                        self.registry.remove(&entry.session_id);
                        debug!(
                            session_id = %entry.session_id,
                            created_at = %entry.created_at,
                            "expired session removed"
                        );
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        session_id = %entry.session_id,
                        error = %e,
                        "failed to delete expired session, continuing pass"
                    );
                }
            }
        }

        let stats_after = self.store.stats();
        let duration_ms = started.elapsed().as_millis() as u64;
        let message = format!(
            "removed {sessions_cleaned} session(s) and {charts_cleaned} chart file(s)"
        );
        let run = CleanupRun {
            sessions_cleaned,
            charts_cleaned,
            failed,
            stats_before,
            stats_after,
            duration_ms,
            finished_at: Utc::now(),
            message,
        };

        if sessions_cleaned > 0 || charts_cleaned > 0 || failed > 0 {
            info!(
                sessions_cleaned,
                charts_cleaned, failed, duration_ms, "cleanup pass completed"
            );
        } else {
            debug!(duration_ms, "cleanup pass completed, nothing to clean");
        }

        self.passes_total.fetch_add(1, Ordering::Relaxed);
        *self.last_run.write() = Some(run.clone());
        Ok(run)
    }

    /// Execute one pass out-of-band, subject to the same serialization as
    /// the timer. A pass with partial deletion failures still returns a
    /// summary; only total store unavailability is an error.
    pub async fn force_run(&self) -> Result<CleanupRun> {
        info!("manual cleanup triggered");
        self.run_pass(Utc::now()).await
    }

    /// Targeted deletion of one session regardless of expiry, for
    /// explicit "forget my data" requests.
    pub fn delete_session(&self, session_id: &str) -> Result<Removed> {
        let removed = self.store.delete(session_id)?;
        let was_registered = self.registry.remove(session_id);
        if !removed.any() && !was_registered {
            return Err(Error::NotFound(session_id.to_string()));
        }
        info!(session_id, "session deleted on request");
        Ok(removed)
    }

    /// Status snapshot for the control surface
    pub fn status(&self) -> CleanupStatus {
        let alive = self.is_running();
        CleanupStatus {
            running: alive,
            cleanup_interval_seconds: self.interval.as_secs(),
            thread_alive: alive,
            passes_total: self.passes_total(),
            last_run: self.last_run(),
            file_stats: self.store.stats(),
        }
    }

    /// Configuration view for the control surface
    pub fn config_view(&self) -> CleanupConfigView {
        CleanupConfigView {
            auto_cleanup_enabled: self.is_running(),
            cleanup_interval_seconds: self.interval.as_secs(),
            ttl_seconds: self.policy.ttl().num_seconds(),
            temp_directory: self.store.stats().temp_dir,
        }
    }
}
