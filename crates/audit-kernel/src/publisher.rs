//! Result publishers
//!
//! A publisher receives a finished [`AuditArtifact`] exactly once and
//! delivers it somewhere. Publishers never modify the artifact file.

use crate::error::PublishError;
use async_trait::async_trait;
use audit_core::{AuditArtifact, ProcessorStatus};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivery capability for finished artifacts
#[async_trait]
pub trait ResultPublisher: Send + Sync + Debug {
    /// Deliver `artifact`
    ///
    /// # Errors
    /// - `PublishError` if delivery fails
    async fn publish(&self, artifact: &AuditArtifact) -> Result<(), PublishError>;
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr, PublishError> {
    path.file_name()
        .ok_or_else(|| PublishError::InvalidArtifact(path.to_path_buf()))
}

/// Copies artifacts into a directory
#[derive(Debug, Clone)]
pub struct FileSystemPublisher {
    target_dir: PathBuf,
}

impl FileSystemPublisher {
    /// Publish into `target_dir` (created on first use)
    #[inline]
    #[must_use]
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Where `artifact` ends up once published
    ///
    /// # Errors
    /// - `PublishError::InvalidArtifact` if the artifact path has no file name
    pub fn destination_for(&self, artifact: &AuditArtifact) -> Result<PathBuf, PublishError> {
        Ok(self.target_dir.join(file_name(&artifact.path)?))
    }
}

#[async_trait]
impl ResultPublisher for FileSystemPublisher {
    async fn publish(&self, artifact: &AuditArtifact) -> Result<(), PublishError> {
        let destination = self.destination_for(artifact)?;
        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .map_err(|e| PublishError::io(&self.target_dir, e))?;
        let bytes = tokio::fs::copy(&artifact.path, &destination)
            .await
            .map_err(|e| PublishError::io(&artifact.path, e))?;
        tracing::info!(
            destination = %destination.display(),
            bytes,
            status = %artifact.status,
            "artifact published to file system"
        );
        Ok(())
    }
}

/// Outgoing mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

/// Mail transport
#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    /// Hand `message` to the transport
    ///
    /// # Errors
    /// - `PublishError::Mailer` if the transport refuses it
    async fn send(&self, message: EmailMessage) -> Result<(), PublishError>;
}

/// Mailer that keeps messages in memory
#[derive(Debug, Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl OutboxMailer {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far
    #[must_use]
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), PublishError> {
        self.sent.lock().push(message);
        Ok(())
    }
}

/// Mails artifacts as attachments
#[derive(Debug, Clone)]
pub struct EmailPublisher {
    mailer: Arc<dyn Mailer>,
    recipients: Vec<String>,
    subject_prefix: String,
}

impl EmailPublisher {
    /// Create publisher
    ///
    /// # Errors
    /// - `PublishError::NoRecipients` if `recipients` is empty
    pub fn new<I, S>(mailer: Arc<dyn Mailer>, recipients: I) -> Result<Self, PublishError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let recipients: Vec<String> = recipients.into_iter().map(Into::into).collect();
        if recipients.is_empty() {
            return Err(PublishError::NoRecipients);
        }
        Ok(Self {
            mailer,
            recipients,
            subject_prefix: "ACL audit".to_string(),
        })
    }

    /// With a different subject prefix
    #[inline]
    #[must_use]
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    fn body(artifact: &AuditArtifact) -> String {
        let report = &artifact.report;
        let outcome = match artifact.status {
            ProcessorStatus::Ok => "The report covers the whole document tree.",
            ProcessorStatus::ErrorTooLongProcess => {
                "The report is partial: the processing time budget ran out."
            }
            ProcessorStatus::ErrorTooManyDocuments => {
                "The report is partial: the sheet row limit was reached."
            }
        };
        format!(
            "{outcome}\n\nStatus: {}\nDocuments: {}\nRows: {}\nFiltered entries: {}\nElapsed: {}ms\n",
            artifact.status,
            report.nodes_visited,
            report.rows_written,
            report.entries_filtered,
            report.elapsed.as_millis(),
        )
    }
}

#[async_trait]
impl ResultPublisher for EmailPublisher {
    async fn publish(&self, artifact: &AuditArtifact) -> Result<(), PublishError> {
        let attachment_name = file_name(&artifact.path)?.to_string_lossy().into_owned();
        let attachment = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| PublishError::io(&artifact.path, e))?;

        let message = EmailMessage {
            recipients: self.recipients.clone(),
            subject: format!("{} [{}]", self.subject_prefix, artifact.status),
            body: Self::body(artifact),
            attachment_name,
            attachment,
        };
        self.mailer.send(message).await?;
        tracing::info!(
            recipients = self.recipients.len(),
            status = %artifact.status,
            "artifact mailed"
        );
        Ok(())
    }
}

/// Sends artifacts over an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<AuditArtifact>,
}

impl ChannelPublisher {
    /// Create publisher and its receiving end
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditArtifact>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultPublisher for ChannelPublisher {
    async fn publish(&self, artifact: &AuditArtifact) -> Result<(), PublishError> {
        self.tx
            .send(artifact.clone())
            .await
            .map_err(|_| PublishError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::ProcessorReport;
    use std::time::Duration;

    fn artifact(dir: &Path, status: ProcessorStatus) -> AuditArtifact {
        let path = dir.join("audit-42.json");
        std::fs::write(&path, b"{\"schema\":\"test\"}").unwrap();
        AuditArtifact {
            path,
            status,
            report: ProcessorReport {
                status,
                nodes_visited: 3,
                rows_written: 7,
                entries_filtered: 1,
                next_row: 9,
                budget: Duration::from_secs(10),
                elapsed: Duration::from_millis(12),
                remaining: Duration::from_millis(9_988),
            },
        }
    }

    #[tokio::test]
    async fn file_system_copies_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path(), ProcessorStatus::Ok);
        let target = dir.path().join("published").join("nested");
        let publisher = FileSystemPublisher::new(&target);

        publisher.publish(&artifact).await.unwrap();

        let copied = std::fs::read(target.join("audit-42.json")).unwrap();
        assert_eq!(copied, std::fs::read(&artifact.path).unwrap());
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn file_system_reports_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = artifact(dir.path(), ProcessorStatus::Ok);
        artifact.path = dir.path().join("gone.json");

        let err = FileSystemPublisher::new(dir.path().join("out"))
            .publish(&artifact)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Io { .. }));
    }

    #[tokio::test]
    async fn email_carries_status_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path(), ProcessorStatus::ErrorTooManyDocuments);
        let outbox = Arc::new(OutboxMailer::new());
        let publisher = EmailPublisher::new(outbox.clone(), ["security@example.org"]).unwrap();

        publisher.publish(&artifact).await.unwrap();

        let sent = outbox.messages();
        assert_eq!(sent.len(), 1);
        let message = &sent[0];
        assert_eq!(message.recipients, ["security@example.org"]);
        assert!(message.subject.contains("ERROR_TOO_MANY_DOCUMENTS"));
        assert!(message.body.contains("row limit"));
        assert_eq!(message.attachment_name, "audit-42.json");
        assert_eq!(message.attachment, std::fs::read(&artifact.path).unwrap());
    }

    #[test]
    fn email_needs_recipients() {
        let outbox: Arc<dyn Mailer> = Arc::new(OutboxMailer::new());
        assert!(matches!(
            EmailPublisher::new(outbox, Vec::<String>::new()),
            Err(PublishError::NoRecipients)
        ));
    }

    #[tokio::test]
    async fn channel_delivers_and_detects_closed_receiver() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path(), ProcessorStatus::Ok);
        let (publisher, mut rx) = ChannelPublisher::new(1);

        publisher.publish(&artifact).await.unwrap();
        assert_eq!(rx.recv().await, Some(artifact.clone()));

        drop(rx);
        assert!(matches!(
            publisher.publish(&artifact).await,
            Err(PublishError::ChannelClosed)
        ));
    }
}
