//! Audit job
//!
//! [`AuditJob`] is the schedulable wrapper around one report run. It derives
//! its processing budget from the scheduler window so the run always leaves
//! time to write the status cell and publish:
//!
//! `budget = min(timeout, remaining_window - max(safety_margin, MIN_SAFETY_MARGIN))`
//!
//! The budget is therefore always strictly shorter than a non-empty window.
//!
//! Deadline and row-ceiling interruptions complete the job normally; only
//! engine, I/O and publisher errors fail it.

use crate::error::WorkError;
use crate::publisher::ResultPublisher;
use crate::scheduler::{Work, WorkContext};
use async_trait::async_trait;
use audit_core::{AuditArtifact, AuditReportBuilder, JobConfig, NodeId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Default requested budget
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time kept back from the scheduler window
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Smallest margin ever kept back, whatever the job asks for
pub const MIN_SAFETY_MARGIN: Duration = Duration::from_millis(250);

/// One scheduled audit report
#[derive(Debug, Clone)]
pub struct AuditJob {
    id: Uuid,
    name: String,
    repository: String,
    root: NodeId,
    destination: PathBuf,
    builder: AuditReportBuilder,
    publisher: Arc<dyn ResultPublisher>,
    timeout: Duration,
    safety_margin: Duration,
}

impl AuditJob {
    /// Create job with default timeout and safety margin
    pub fn new(
        name: impl Into<String>,
        repository: impl Into<String>,
        root: NodeId,
        destination: impl Into<PathBuf>,
        builder: AuditReportBuilder,
        publisher: Arc<dyn ResultPublisher>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            repository: repository.into(),
            root,
            destination: destination.into(),
            builder,
            publisher,
            timeout: DEFAULT_JOB_TIMEOUT,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    /// With requested processing budget
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With time kept back from the scheduler window
    #[inline]
    #[must_use]
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// With timeout and safety margin from configuration
    #[inline]
    #[must_use]
    pub fn with_config(self, config: &JobConfig) -> Self {
        self.with_timeout(config.timeout())
            .with_safety_margin(config.safety_margin())
    }

    #[inline]
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Processing budget for a run with `window` left
    #[must_use]
    pub fn effective_budget(&self, window: Duration) -> Duration {
        let margin = self.safety_margin.max(MIN_SAFETY_MARGIN);
        self.timeout.min(window.saturating_sub(margin))
    }

    /// Render, save and publish once
    ///
    /// # Errors
    /// - `WorkError::Audit` if the engine or the artifact write fails
    /// - `WorkError::Aborted` if the render thread panics
    /// - `WorkError::Publish` if delivery fails
    pub async fn execute(&self, ctx: WorkContext) -> Result<AuditArtifact, WorkError> {
        let budget = self.effective_budget(ctx.remaining());
        tracing::info!(
            root = %self.root,
            budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            window_ms = u64::try_from(ctx.reserved_window.as_millis()).unwrap_or(u64::MAX),
            "audit job started"
        );

        let builder = self.builder.clone();
        let root = self.root;
        let destination = self.destination.clone();
        let span = tracing::Span::current();
        let artifact = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            builder.render_to(root, budget, &destination)
        })
        .await
        .map_err(|e| WorkError::Aborted(e.to_string()))??;

        self.publisher.publish(&artifact).await?;
        tracing::info!(
            status = %artifact.status,
            path = %artifact.path.display(),
            "audit job published"
        );
        Ok(artifact)
    }
}

#[async_trait]
impl Work for AuditJob {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: WorkContext) -> Result<(), WorkError> {
        let span = tracing::info_span!(
            "audit_job",
            job_id = %self.id,
            job = %self.name,
            repository = %self.repository,
        );
        self.execute(ctx).instrument(span).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::ChannelPublisher;
    use audit_core::{
        AccessControlEntry, AcceptsAllContent, InMemoryTree, ProcessorStatus,
        ReportLayoutSettings,
    };
    use std::time::Instant;

    fn job(dir: &Path) -> (AuditJob, tokio::sync::mpsc::Receiver<AuditArtifact>) {
        let mut tree = InMemoryTree::new();
        let root = tree.add_root("/default-domain");
        tree.push_ace(root, AccessControlEntry::grant("members", "Read"))
            .unwrap();
        let builder = AuditReportBuilder::new(
            Arc::new(tree),
            Arc::new(ReportLayoutSettings::new()),
            Arc::new(AcceptsAllContent),
        )
        .unwrap();
        let (publisher, rx) = ChannelPublisher::new(4);
        let job = AuditJob::new(
            "nightly",
            "default",
            root,
            dir.join("nightly.json"),
            builder,
            Arc::new(publisher),
        );
        (job, rx)
    }

    fn ctx(window: Duration) -> WorkContext {
        ctx_started(window, Instant::now())
    }

    fn ctx_started(window: Duration, started_at: Instant) -> WorkContext {
        WorkContext {
            job_id: Uuid::nil(),
            reserved_window: window,
            started_at,
        }
    }

    #[test]
    fn budget_is_bounded_by_window_minus_margin() {
        let dir = tempfile::tempdir().unwrap();
        let (job, _rx) = job(dir.path());
        let job = job
            .with_timeout(Duration::from_secs(60))
            .with_safety_margin(Duration::from_secs(5));

        assert_eq!(job.effective_budget(Duration::from_secs(600)), Duration::from_secs(60));
        assert_eq!(job.effective_budget(Duration::from_secs(30)), Duration::from_secs(25));
        assert_eq!(job.effective_budget(Duration::from_secs(3)), Duration::ZERO);
    }

    #[test]
    fn budget_stays_below_window() {
        let dir = tempfile::tempdir().unwrap();
        let (job, _rx) = job(dir.path());
        let job = job
            .with_timeout(Duration::MAX)
            .with_safety_margin(Duration::ZERO);

        let window = Duration::from_secs(1);
        assert_eq!(job.effective_budget(window), window - MIN_SAFETY_MARGIN);
        assert_eq!(job.effective_budget(Duration::MAX), Duration::MAX - MIN_SAFETY_MARGIN);
        assert_eq!(job.effective_budget(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (job, _rx) = job(dir.path());
        assert_eq!(job.timeout(), DEFAULT_JOB_TIMEOUT);

        let config = JobConfig {
            timeout_secs: 12,
            safety_margin_ms: 250,
        };
        let job = job.with_config(&config);
        assert_eq!(job.timeout(), Duration::from_secs(12));
        assert_eq!(job.effective_budget(Duration::from_secs(1)), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn execute_publishes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let (job, mut rx) = job(dir.path());

        let artifact = job.execute(ctx(Duration::from_secs(60))).await.unwrap();

        assert_eq!(artifact.status, ProcessorStatus::Ok);
        assert_eq!(artifact.path, dir.path().join("nightly.json"));
        assert_eq!(rx.recv().await, Some(artifact));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn budget_comes_from_remaining_window() {
        let dir = tempfile::tempdir().unwrap();
        let (job, mut rx) = job(dir.path());
        let job = job.with_safety_margin(Duration::from_millis(500));
        let started_at = Instant::now()
            .checked_sub(Duration::from_secs(9))
            .unwrap_or_else(Instant::now);

        let artifact = job
            .execute(ctx_started(Duration::from_secs(10), started_at))
            .await
            .unwrap();

        assert!(artifact.report.budget <= Duration::from_millis(500));
        assert_eq!(rx.recv().await.map(|a| a.status), Some(artifact.status));
    }

    #[tokio::test]
    async fn window_smaller_than_margin_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (job, mut rx) = job(dir.path());

        let artifact = job.execute(ctx(Duration::from_secs(1))).await.unwrap();

        assert_eq!(artifact.status, ProcessorStatus::ErrorTooLongProcess);
        assert_eq!(rx.recv().await.map(|a| a.status), Some(ProcessorStatus::ErrorTooLongProcess));
    }
}
