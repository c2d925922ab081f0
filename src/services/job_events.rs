//! Live import status events
//!
//! `NatsJobEvents` publishes each checkpoint on
//! `contacts.import.status.<job_id>` so UIs can follow progress without
//! polling. `LogJobEvents` is used when no NATS server is configured.
//! Publishing is best-effort: callers log failures and carry on.

use anyhow::Result;
use async_nats::Client;
use async_trait::async_trait;
use tracing::debug;

use crate::types::ImportJobStatusUpdate;

pub const STATUS_PREFIX: &str = "contacts.import.status";

#[async_trait]
pub trait JobEvents: Send + Sync {
    async fn publish_status(&self, update: &ImportJobStatusUpdate) -> Result<()>;
}

pub fn status_subject(update: &ImportJobStatusUpdate) -> String {
    format!("{}.{}", STATUS_PREFIX, update.job_id)
}

pub struct NatsJobEvents {
    client: Client,
}

impl NatsJobEvents {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobEvents for NatsJobEvents {
    async fn publish_status(&self, update: &ImportJobStatusUpdate) -> Result<()> {
        let payload = serde_json::to_vec(update)?;
        self.client.publish(status_subject(update), payload.into()).await?;
        Ok(())
    }
}

pub struct LogJobEvents;

#[async_trait]
impl JobEvents for LogJobEvents {
    async fn publish_status(&self, update: &ImportJobStatusUpdate) -> Result<()> {
        debug!(
            job_id = %update.job_id,
            status = update.status.as_str(),
            processed = update.progress.processed,
            successful = update.progress.successful,
            failed = update.progress.failed,
            "Import status"
        );
        Ok(())
    }
}

// =============================================================================
// RecordingJobEvents: captures updates in memory (tests)
// =============================================================================

#[cfg(test)]
#[derive(Default)]
pub struct RecordingJobEvents {
    pub updates: parking_lot::Mutex<Vec<ImportJobStatusUpdate>>,
}

#[cfg(test)]
impl RecordingJobEvents {
    pub fn updates(&self) -> Vec<ImportJobStatusUpdate> {
        self.updates.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl JobEvents for RecordingJobEvents {
    async fn publish_status(&self, update: &ImportJobStatusUpdate) -> Result<()> {
        self.updates.lock().push(update.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImportJobState, ImportProgress};
    use uuid::Uuid;

    #[test]
    fn test_status_subject_includes_job_id() {
        let job_id = Uuid::new_v4();
        let update = ImportJobStatusUpdate::new(job_id, ImportJobState::Processing, &ImportProgress::default());
        assert_eq!(status_subject(&update), format!("contacts.import.status.{}", job_id));
    }

    #[tokio::test]
    async fn test_log_events_never_fail() {
        let update = ImportJobStatusUpdate::new(Uuid::nil(), ImportJobState::Failed, &ImportProgress::default());
        assert!(LogJobEvents.publish_status(&update).await.is_ok());
    }
}
