//! Contact import orchestrator
//!
//! Runs one import job from `pending` to a terminal state:
//! - streams the uploaded CSV through the parser (blocking pool, bounded channel)
//! - flushes valid rows to the batch writer every `batch_size` rows
//! - writes throttled progress checkpoints to the job record
//! - finalizes as `completed`, `failed` or `cancelled`
//!
//! Batches flushed before a fatal error stay committed; there is no
//! job-wide rollback.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::defaults::{
    DEFAULT_IMPORT_BATCH_SIZE, DEFAULT_PARSER_CHANNEL_CAPACITY, DEFAULT_PROGRESS_INTERVAL_MS,
};
use crate::services::batch_writer::BatchWriter;
use crate::services::csv_parser::spawn_file_parser;
use crate::services::import_store::ImportStore;
use crate::services::job_events::JobEvents;
use crate::services::running_jobs::{JobGuard, RunningJobs};
use crate::types::{
    ImportJob, ImportJobPatch, ImportJobState, ImportJobStatusUpdate, ImportProgress,
    NewContact, NewNotification,
};

/// Tunables for one processor instance
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub progress_interval: Duration,
    pub channel_capacity: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_IMPORT_BATCH_SIZE,
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            channel_capacity: DEFAULT_PARSER_CHANNEL_CAPACITY,
        }
    }
}

/// Terminal state and final counters of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub status: ImportJobState,
    pub progress: ImportProgress,
}

enum StreamEnd {
    Finished,
    Cancelled,
}

pub struct ImportProcessor {
    store: Arc<dyn ImportStore>,
    events: Arc<dyn JobEvents>,
    running: RunningJobs,
    settings: ImportSettings,
}

impl ImportProcessor {
    pub fn new(
        store: Arc<dyn ImportStore>,
        events: Arc<dyn JobEvents>,
        running: RunningJobs,
        settings: ImportSettings,
    ) -> Self {
        Self {
            store,
            events,
            running,
            settings,
        }
    }

    pub fn running_jobs(&self) -> &RunningJobs {
        &self.running
    }

    /// Schedule `job` on the runtime and return immediately
    pub fn spawn(self: &Arc<Self>, job: ImportJob) -> JoinHandle<()> {
        let processor = Arc::clone(self);
        tokio::spawn(async move {
            let job_id = job.id;
            if let Err(e) = processor.run(job).await {
                error!(job_id = %job_id, error = %format!("{:#}", e), "Import job could not be run");
            }
        })
    }

    /// Run `job` to a terminal state.
    ///
    /// Pipeline failures end as a `failed` outcome; `Err` is returned only
    /// when the job record itself cannot be claimed or written.
    pub async fn run(&self, job: ImportJob) -> Result<ImportOutcome> {
        let Some(guard) = self.running.register(job.id, job.user_id) else {
            bail!("Import job {} is already running", job.id);
        };
        let started = Instant::now();

        info!(
            job_id = %job.id,
            user_id = %job.user_id,
            file_name = %job.file_name,
            file_size = job.file_size,
            "Starting contact import"
        );

        let claimed = self
            .store
            .update_import_job(job.id, ImportJobPatch::status(ImportJobState::Processing))
            .await
            .context("Failed to mark import job as processing")?;
        if !claimed {
            bail!("Import job {} is missing or already finished", job.id);
        }

        let mut progress = ImportProgress::default();
        self.publish(job.id, ImportJobState::Processing, &progress).await;

        let outcome = match self.stream_rows(&job, &guard, &mut progress).await {
            Ok(StreamEnd::Finished) => self.complete(&job, progress).await?,
            Ok(StreamEnd::Cancelled) => self.cancel(&job, progress).await?,
            Err(e) => self.fail(&job, progress, e).await?,
        };

        info!(
            job_id = %job.id,
            status = outcome.status.as_str(),
            processed = outcome.progress.processed,
            successful = outcome.progress.successful,
            failed = outcome.progress.failed,
            duplicates = outcome.progress.duplicates,
            duration_ms = started.elapsed().as_millis() as u64,
            "Contact import finished"
        );

        Ok(outcome)
    }

    async fn stream_rows(
        &self,
        job: &ImportJob,
        guard: &JobGuard,
        progress: &mut ImportProgress,
    ) -> Result<StreamEnd> {
        if self.cancel_requested(job.id, guard).await {
            return Ok(StreamEnd::Cancelled);
        }

        let batch_size = self.settings.batch_size.max(1);
        let writer = BatchWriter::new(Arc::clone(&self.store), job.user_id, job.list_id);
        let (mut lines, parser) =
            spawn_file_parser(PathBuf::from(&job.file_path), self.settings.channel_capacity);

        let mut batch: Vec<NewContact> = Vec::with_capacity(batch_size);
        let mut last_checkpoint = Instant::now();

        while let Some(line) = lines.recv().await {
            let line = line?;
            progress.bytes_processed = line.bytes_read;

            match line.outcome {
                Ok(row) => batch.push(row.into_contact(job.user_id)),
                Err(row_error) => {
                    debug!(job_id = %job.id, row = line.row, error = %row_error, "Skipping invalid row");
                    progress.record_row_error(&row_error);
                }
            }

            if guard.is_cancelled() {
                return Ok(StreamEnd::Cancelled);
            }

            if batch.len() >= batch_size {
                if self.cancel_requested(job.id, guard).await {
                    return Ok(StreamEnd::Cancelled);
                }
                self.flush(job.id, &writer, &mut batch, progress).await?;
            }

            if last_checkpoint.elapsed() >= self.settings.progress_interval {
                self.checkpoint(job, progress).await;
                last_checkpoint = Instant::now();
                if self.cancel_requested(job.id, guard).await {
                    return Ok(StreamEnd::Cancelled);
                }
            }
        }

        parser.await.context("CSV parser task failed")?;
        self.flush(job.id, &writer, &mut batch, progress).await?;

        Ok(StreamEnd::Finished)
    }

    async fn flush(
        &self,
        job_id: Uuid,
        writer: &BatchWriter,
        batch: &mut Vec<NewContact>,
        progress: &mut ImportProgress,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let outcome = writer.write(batch).await?;
        progress.record_batch(outcome.written, outcome.inserted);
        batch.clear();

        debug!(
            job_id = %job_id,
            written = outcome.written,
            inserted = outcome.inserted,
            linked = outcome.linked,
            "Flushed contact batch"
        );
        Ok(())
    }

    /// Best-effort progress write; failures are logged and the run continues
    async fn checkpoint(&self, job: &ImportJob, progress: &mut ImportProgress) {
        progress.clamp_bytes(file_size(job));

        if let Err(e) = self
            .store
            .update_import_job(job.id, ImportJobPatch::progress(progress))
            .await
        {
            warn!(job_id = %job.id, error = %e, "Failed to write import checkpoint");
        }
        self.publish(job.id, ImportJobState::Processing, progress).await;
    }

    async fn cancel_requested(&self, job_id: Uuid, guard: &JobGuard) -> bool {
        if guard.is_cancelled() {
            return true;
        }
        match self.store.is_cancel_requested(job_id).await {
            Ok(requested) => requested,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to read cancellation flag");
                false
            }
        }
    }

    async fn complete(&self, job: &ImportJob, mut progress: ImportProgress) -> Result<ImportOutcome> {
        // The whole file has been consumed at this point
        progress.bytes_processed = file_size(job);

        self.finish(job, ImportJobState::Completed, &progress).await?;

        if let Err(e) = tokio::fs::remove_file(&job.file_path).await {
            warn!(job_id = %job.id, path = %job.file_path, error = %e, "Failed to delete uploaded file");
        }

        if progress.successful > 0 {
            let notification =
                NewNotification::import_completed(job.user_id, progress.successful, &job.file_name);
            if let Err(e) = self.store.create_notification(notification).await {
                warn!(job_id = %job.id, error = %e, "Failed to create import notification");
            }
        }

        Ok(ImportOutcome {
            status: ImportJobState::Completed,
            progress,
        })
    }

    async fn cancel(&self, job: &ImportJob, mut progress: ImportProgress) -> Result<ImportOutcome> {
        progress.clamp_bytes(file_size(job));
        info!(job_id = %job.id, processed = progress.processed, "Contact import cancelled");

        self.finish(job, ImportJobState::Cancelled, &progress).await?;

        Ok(ImportOutcome {
            status: ImportJobState::Cancelled,
            progress,
        })
    }

    async fn fail(
        &self,
        job: &ImportJob,
        mut progress: ImportProgress,
        error: anyhow::Error,
    ) -> Result<ImportOutcome> {
        let message = format!("{:#}", error);
        warn!(
            job_id = %job.id,
            error = %message,
            processed = progress.processed,
            successful = progress.successful,
            "Contact import failed"
        );

        progress.clamp_bytes(file_size(job));
        progress.error_sample = Some(message);

        self.finish(job, ImportJobState::Failed, &progress).await?;

        Ok(ImportOutcome {
            status: ImportJobState::Failed,
            progress,
        })
    }

    async fn finish(&self, job: &ImportJob, status: ImportJobState, progress: &ImportProgress) -> Result<()> {
        self.store
            .update_import_job(job.id, ImportJobPatch::finished(status, progress))
            .await
            .with_context(|| format!("Failed to finalize import job as {}", status.as_str()))?;
        self.publish(job.id, status, progress).await;
        Ok(())
    }

    async fn publish(&self, job_id: Uuid, status: ImportJobState, progress: &ImportProgress) {
        let update = ImportJobStatusUpdate::new(job_id, status, progress);
        if let Err(e) = self.events.publish_status(&update).await {
            warn!(job_id = %job_id, error = %e, "Failed to publish import status");
        }
    }
}

fn file_size(job: &ImportJob) -> u64 {
    job.file_size.max(0) as u64
}
