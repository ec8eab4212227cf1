//! Local scheduler
//!
//! Hosts units of [`Work`] on the tokio runtime:
//! - at most `max_concurrent` jobs run at once (semaphore slots)
//! - each job runs inside a transactional window; outliving it fails the job
//! - jobs can be withdrawn while still waiting for a slot
//!
//! Job state is published through a `watch` channel so any number of
//! [`JobHandle`]s can observe or await it.

use crate::error::WorkError;
use crate::state_machine::{validate_transition, WorkState};
use async_trait::async_trait;
use audit_core::SchedulerConfig;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

/// Execution context handed to a running job
#[derive(Debug, Clone, Copy)]
pub struct WorkContext {
    /// Job being run
    pub job_id: Uuid,
    /// Transactional window reserved for this run
    pub reserved_window: Duration,
    /// When the window opened
    pub started_at: Instant,
}

impl WorkContext {
    /// Window time not yet used
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.reserved_window.saturating_sub(self.started_at.elapsed())
    }
}

/// A schedulable unit of work
#[async_trait]
pub trait Work: Send + Sync + 'static {
    /// Stable job identifier
    fn id(&self) -> Uuid;

    /// Human-readable job name
    fn name(&self) -> &str;

    /// Execute once inside `ctx`'s window
    ///
    /// # Errors
    /// Any error fails the job
    async fn run(&self, ctx: WorkContext) -> Result<(), WorkError>;
}

#[derive(Debug)]
struct JobShared {
    state: Mutex<WorkState>,
    failure: Mutex<Option<Arc<WorkError>>>,
    tx: watch::Sender<WorkState>,
}

impl JobShared {
    fn new() -> (Arc<Self>, watch::Receiver<WorkState>) {
        let (tx, rx) = watch::channel(WorkState::Scheduled);
        let shared = Arc::new(Self {
            state: Mutex::new(WorkState::Scheduled),
            failure: Mutex::new(None),
            tx,
        });
        (shared, rx)
    }

    fn transition(&self, to: WorkState) -> Result<(), WorkError> {
        let mut state = self.state.lock();
        validate_transition(*state, to)?;
        *state = to;
        self.tx.send_replace(to);
        Ok(())
    }

    fn fail(&self, error: WorkError) -> Result<(), WorkError> {
        *self.failure.lock() = Some(Arc::new(error));
        self.transition(WorkState::Failed)
    }
}

/// Observer and control handle for one submitted job
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: Uuid,
    name: String,
    shared: Arc<JobShared>,
    rx: watch::Receiver<WorkState>,
}

impl JobHandle {
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> WorkState {
        *self.rx.borrow()
    }

    /// Error that failed the job, if any
    #[must_use]
    pub fn failure(&self) -> Option<Arc<WorkError>> {
        self.shared.failure.lock().clone()
    }

    /// Wait for a terminal state
    pub async fn wait(&self) -> WorkState {
        let mut rx = self.rx.clone();
        let waited = rx.wait_for(|state| state.is_terminal()).await.map(|state| *state);
        match waited {
            Ok(state) => state,
            Err(_) => *rx.borrow(),
        }
    }

    /// Withdraw the job if it has not started
    ///
    /// Returns whether the job is now canceled. A running job is never
    /// interrupted.
    pub fn cancel(&self) -> bool {
        let canceled = self.shared.transition(WorkState::Canceled).is_ok();
        if canceled {
            tracing::info!(job_id = %self.id, job = %self.name, "job canceled");
        }
        canceled
    }
}

/// Job counts by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub scheduled: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
}

/// In-process scheduler on the tokio runtime
#[derive(Debug)]
pub struct LocalScheduler {
    transaction_timeout: Duration,
    max_concurrent: usize,
    slots: Arc<Semaphore>,
    jobs: DashMap<Uuid, JobHandle>,
}

impl LocalScheduler {
    /// Create scheduler
    ///
    /// # Errors
    /// - `WorkError::NoConcurrency` if `max_concurrent` is zero
    pub fn new(max_concurrent: usize, transaction_timeout: Duration) -> Result<Self, WorkError> {
        if max_concurrent == 0 {
            return Err(WorkError::NoConcurrency);
        }
        Ok(Self {
            transaction_timeout,
            max_concurrent,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            jobs: DashMap::new(),
        })
    }

    /// Create scheduler from configuration
    ///
    /// # Errors
    /// As [`new`](Self::new)
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, WorkError> {
        Self::new(config.max_concurrent, config.transaction_timeout())
    }

    #[inline]
    #[must_use]
    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }

    #[inline]
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Queue `work`; it starts as soon as a slot is free
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `WorkError::DuplicateJob` if a job with the same id was submitted
    pub fn submit(&self, work: Arc<dyn Work>) -> Result<JobHandle, WorkError> {
        let id = work.id();
        let (shared, rx) = JobShared::new();
        let handle = JobHandle {
            id,
            name: work.name().to_string(),
            shared: Arc::clone(&shared),
            rx,
        };

        match self.jobs.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(WorkError::DuplicateJob(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handle.clone());
            }
        }

        tracing::info!(job_id = %id, job = %handle.name, "job scheduled");
        tokio::spawn(drive(
            work,
            shared,
            Arc::clone(&self.slots),
            self.transaction_timeout,
        ));
        Ok(handle)
    }

    /// Handle for a submitted job
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<JobHandle> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    /// Snapshot of job counts
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        for entry in &self.jobs {
            match entry.value().state() {
                WorkState::Scheduled => stats.scheduled += 1,
                WorkState::Running => stats.running += 1,
                WorkState::Completed => stats.completed += 1,
                WorkState::Failed => stats.failed += 1,
                WorkState::Canceled => stats.canceled += 1,
            }
        }
        stats
    }

    /// Wait until every submitted job is terminal
    pub async fn drain(&self) -> Vec<(Uuid, WorkState)> {
        let handles: Vec<JobHandle> = self.jobs.iter().map(|e| e.value().clone()).collect();
        let states = futures::future::join_all(handles.iter().map(JobHandle::wait)).await;
        handles.iter().map(JobHandle::id).zip(states).collect()
    }

    /// Drop a terminal job from the registry
    ///
    /// Returns its final state, or `None` if the job is unknown or still
    /// live. Handles already given out keep working.
    pub fn forget(&self, id: Uuid) -> Option<WorkState> {
        self.jobs
            .remove_if(&id, |_, handle| handle.state().is_terminal())
            .map(|(_, handle)| handle.state())
    }

    /// Drop every terminal job from the registry; returns how many went
    pub fn prune(&self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, handle| !handle.state().is_terminal());
        let pruned = before.saturating_sub(self.jobs.len());
        tracing::debug!(pruned, "terminal jobs pruned");
        pruned
    }

    /// Stop handing out slots; queued jobs are canceled
    pub fn shutdown(&self) {
        self.slots.close();
        tracing::info!("scheduler shut down");
    }
}

async fn drive(
    work: Arc<dyn Work>,
    shared: Arc<JobShared>,
    slots: Arc<Semaphore>,
    window: Duration,
) {
    let id = work.id();
    let Ok(_slot) = slots.acquire_owned().await else {
        if shared.transition(WorkState::Canceled).is_ok() {
            tracing::info!(job_id = %id, "job canceled by shutdown");
        }
        return;
    };

    if shared.transition(WorkState::Running).is_err() {
        // canceled while waiting for a slot
        return;
    }

    let ctx = WorkContext {
        job_id: id,
        reserved_window: window,
        started_at: Instant::now(),
    };
    let runner = Arc::clone(&work);
    let mut task = tokio::spawn(async move { runner.run(ctx).await });

    let outcome = match tokio::time::timeout(window, &mut task).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(join)) => Err(WorkError::Aborted(join.to_string())),
        Err(_) => {
            task.abort();
            Err(WorkError::TransactionTimeout { window })
        }
    };

    let elapsed_ms = u64::try_from(ctx.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    let recorded = match outcome {
        Ok(()) => {
            tracing::info!(job_id = %id, job = work.name(), elapsed_ms, "job completed");
            shared.transition(WorkState::Completed)
        }
        Err(e) => {
            tracing::error!(
                job_id = %id,
                job = work.name(),
                elapsed_ms,
                transient = e.is_transient(),
                error = %e,
                "job failed"
            );
            shared.fail(e)
        }
    };
    if let Err(e) = recorded {
        tracing::error!(job_id = %id, error = %e, "job state not recorded");
    }
}
