//! Bounded analysis executor shared by on-demand requests and sweeps.
//!
//! - At most `workers` analyses compute at once; up to `queue_limit` more
//!   wait for a slot. Anything beyond is refused with
//!   [`ExecutorError::Overloaded`].
//! - Submissions for a key that is already queued or running join that
//!   execution and receive its run id.
//! - A job first resolves its target, then computes under a time budget;
//!   when the budget expires the job's timeout result is committed instead.
//! - A job can be cancelled until it starts committing. The commit phase is
//!   never interrupted, so a cancelled job never leaves a partial run.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pqa_core::analysis_status::{AnalysisKey, JobState};
use pqa_core::quality_gate::RunStatus;
use pqa_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Finished jobs kept for status lookups before the oldest are forgotten.
const MAX_FINISHED_JOBS: usize = 4096;

// ---------------------------------------------------------------------------
// Job trait
// ---------------------------------------------------------------------------

/// The work the executor schedules.
#[async_trait]
pub trait AnalysisJob: Send + Sync + 'static {
    /// What a job resolves before its time budget starts.
    type Target: Send + Sync + 'static;
    /// Result of the compute phase, handed to `commit`.
    type Computed: Send + 'static;
    type Error: std::fmt::Display + Send + 'static;

    /// Look up what the analysis runs against. Cancellable, not time-bounded.
    async fn resolve(&self, run_id: Uuid, key: AnalysisKey) -> Result<Self::Target, Self::Error>;

    /// Cancellable, time-bounded part of the analysis.
    async fn compute(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        target: &Self::Target,
    ) -> Result<Self::Computed, Self::Error>;

    /// What to commit when `compute` exceeded its budget.
    fn timed_out(&self, key: AnalysisKey, target: &Self::Target, budget: Duration)
        -> Self::Computed;

    /// Persist the result. Never cancelled once started.
    async fn commit(
        &self,
        run_id: Uuid,
        key: AnalysisKey,
        computed: Self::Computed,
    ) -> Result<RunStatus, Self::Error>;
}

// ---------------------------------------------------------------------------
// Errors and snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Analysis queue is full ({limit} analyses pending)")]
    Overloaded { limit: usize },

    #[error("Analysis {0} not found")]
    NotFound(Uuid),

    #[error("Analysis {run_id} can no longer be cancelled (state: {state})")]
    AlreadyFinished { run_id: Uuid, state: JobState },

    #[error("Analysis executor is shutting down")]
    ShuttingDown,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub key: AnalysisKey,
    pub state: JobState,
    /// Set when the job ended without committing a run.
    pub message: Option<String>,
    pub submitted_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// Result of [`AnalysisExecutor::submit`].
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub run_id: Uuid,
    pub status: JobState,
    /// `true` when the request joined an execution already in flight.
    pub joined: bool,
}

struct JobEntry {
    key: AnalysisKey,
    cancel: CancellationToken,
    committing: bool,
    state: watch::Sender<JobSnapshot>,
}

#[derive(Default)]
struct Registry {
    in_flight: HashMap<AnalysisKey, Uuid>,
    jobs: HashMap<Uuid, JobEntry>,
    finished: VecDeque<Uuid>,
    /// Jobs queued or running.
    active: usize,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct AnalysisExecutor<J: AnalysisJob> {
    job: Arc<J>,
    workers: Arc<Semaphore>,
    capacity: usize,
    timeout: Duration,
    registry: Mutex<Registry>,
    shutdown: CancellationToken,
}

impl<J: AnalysisJob> AnalysisExecutor<J> {
    pub fn new(job: Arc<J>, workers: usize, queue_limit: usize, timeout: Duration) -> Arc<Self> {
        let workers = workers.max(1);
        Arc::new(Self {
            job,
            workers: Arc::new(Semaphore::new(workers)),
            capacity: workers + queue_limit,
            timeout,
            registry: Mutex::new(Registry::default()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Schedule an analysis, or join the one already in flight for `key`.
    pub async fn submit(self: &Arc<Self>, key: AnalysisKey) -> Result<Submission, ExecutorError> {
        let mut registry = self.registry.lock().await;

        if let Some(run_id) = registry.in_flight.get(&key).copied() {
            if let Some(entry) = registry.jobs.get(&run_id) {
                let status = entry.state.borrow().state;
                tracing::debug!(%run_id, key = %key, "Joined in-flight analysis");
                return Ok(Submission {
                    run_id,
                    status,
                    joined: true,
                });
            }
        }

        if self.shutdown.is_cancelled() {
            return Err(ExecutorError::ShuttingDown);
        }
        if registry.active >= self.capacity {
            tracing::warn!(key = %key, active = registry.active, "Analysis refused: queue full");
            return Err(ExecutorError::Overloaded {
                limit: self.capacity,
            });
        }

        let run_id = Uuid::now_v7();
        let cancel = self.shutdown.child_token();
        let (state, _) = watch::channel(JobSnapshot {
            run_id,
            key,
            state: JobState::Queued,
            message: None,
            submitted_at: Utc::now(),
            finished_at: None,
        });
        registry.jobs.insert(
            run_id,
            JobEntry {
                key,
                cancel: cancel.clone(),
                committing: false,
                state,
            },
        );
        registry.in_flight.insert(key, run_id);
        registry.active += 1;
        drop(registry);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(run_id, key, cancel).await });

        tracing::info!(%run_id, key = %key, "Analysis queued");
        Ok(Submission {
            run_id,
            status: JobState::Queued,
            joined: false,
        })
    }

    /// Current state of a job still known to the executor.
    pub async fn status(&self, run_id: Uuid) -> Option<JobSnapshot> {
        let registry = self.registry.lock().await;
        registry.jobs.get(&run_id).map(|e| e.state.borrow().clone())
    }

    /// Wait until a job reaches a terminal state.
    pub async fn wait(&self, run_id: Uuid) -> Option<JobSnapshot> {
        let mut rx = {
            let registry = self.registry.lock().await;
            registry.jobs.get(&run_id)?.state.subscribe()
        };
        if rx.wait_for(|s| s.state.is_terminal()).await.is_err() {
            tracing::debug!(%run_id, "Job evicted while waiting, returning last state");
        }
        let snapshot = rx.borrow().clone();
        Some(snapshot)
    }

    /// Cancel a job that has not started committing.
    pub async fn cancel(&self, run_id: Uuid) -> Result<JobSnapshot, ExecutorError> {
        let mut registry = self.registry.lock().await;
        let entry = registry
            .jobs
            .get(&run_id)
            .ok_or(ExecutorError::NotFound(run_id))?;

        let current = entry.state.borrow().state;
        if current.is_terminal() || entry.committing {
            return Err(ExecutorError::AlreadyFinished {
                run_id,
                state: current,
            });
        }

        entry.cancel.cancel();
        let key = entry.key;
        entry.state.send_modify(|s| {
            s.state = JobState::Cancelled;
            s.finished_at = Some(Utc::now());
        });
        let snapshot = entry.state.borrow().clone();
        if registry.in_flight.get(&key) == Some(&run_id) {
            registry.in_flight.remove(&key);
        }
        tracing::info!(%run_id, key = %key, "Analysis cancelled");
        Ok(snapshot)
    }

    /// Jobs currently queued or running.
    pub async fn active(&self) -> usize {
        self.registry.lock().await.active
    }

    /// Refuse new work and cancel everything not yet committing.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn run(self: Arc<Self>, run_id: Uuid, key: AnalysisKey, cancel: CancellationToken) {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.finish(run_id, JobState::Cancelled, None).await;
                return;
            }
            permit = Arc::clone(&self.workers).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.finish(run_id, JobState::Error, Some("worker pool closed".into())).await;
                    return;
                }
            },
        };

        self.set_state(run_id, JobState::Running).await;
        tracing::debug!(%run_id, key = %key, "Analysis started");

        let work = async {
            let target = match self.job.resolve(run_id, key).await {
                Ok(target) => target,
                Err(e) => return Err(e),
            };
            match tokio::time::timeout(self.timeout, self.job.compute(run_id, key, &target)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(%run_id, key = %key, timeout_secs = self.timeout.as_secs(), "Analysis timed out");
                    Ok(self.job.timed_out(key, &target, self.timeout))
                }
            }
        };

        let computed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                drop(permit);
                self.finish(run_id, JobState::Cancelled, None).await;
                return;
            }
            result = work => match result {
                Ok(computed) => computed,
                Err(e) => {
                    drop(permit);
                    tracing::error!(%run_id, key = %key, error = %e, "Analysis failed before commit");
                    self.finish(run_id, JobState::Error, Some(e.to_string())).await;
                    return;
                }
            },
        };

        if !self.begin_commit(run_id).await {
            drop(permit);
            self.finish(run_id, JobState::Cancelled, None).await;
            return;
        }

        let result = self.job.commit(run_id, key, computed).await;
        drop(permit);
        match result {
            Ok(status) => self.finish(run_id, status.into(), None).await,
            Err(e) => {
                tracing::error!(%run_id, key = %key, error = %e, "Analysis commit failed");
                self.finish(run_id, JobState::Error, Some(e.to_string())).await;
            }
        }
    }

    async fn set_state(&self, run_id: Uuid, state: JobState) {
        let registry = self.registry.lock().await;
        if let Some(entry) = registry.jobs.get(&run_id) {
            entry.state.send_if_modified(|s| {
                if s.state.is_terminal() {
                    return false;
                }
                s.state = state;
                true
            });
        }
    }

    /// Mark the job as committing unless it was cancelled first.
    async fn begin_commit(&self, run_id: Uuid) -> bool {
        let mut registry = self.registry.lock().await;
        match registry.jobs.get_mut(&run_id) {
            Some(entry) if !entry.cancel.is_cancelled() => {
                entry.committing = true;
                true
            }
            _ => false,
        }
    }

    /// Record the terminal state and release the job's slot. Called exactly
    /// once per job.
    async fn finish(&self, run_id: Uuid, state: JobState, message: Option<String>) {
        let mut registry = self.registry.lock().await;
        registry.active = registry.active.saturating_sub(1);

        let Some(entry) = registry.jobs.get(&run_id) else {
            return;
        };
        let key = entry.key;
        entry.state.send_if_modified(|s| {
            if s.state.is_terminal() {
                return false;
            }
            s.state = state;
            s.message = message;
            s.finished_at = Some(Utc::now());
            true
        });
        if registry.in_flight.get(&key) == Some(&run_id) {
            registry.in_flight.remove(&key);
        }

        registry.finished.push_back(run_id);
        while registry.finished.len() > MAX_FINISHED_JOBS {
            if let Some(old) = registry.finished.pop_front() {
                registry.jobs.remove(&old);
            }
        }
    }
}
