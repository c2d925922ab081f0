//! Contact import job types
//!
//! The job record is the only channel between the submission endpoint,
//! the background orchestrator and polling clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::contact::RowError;

// ==========================================================================
// Tests First (TDD)
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_terminal_states() {
        assert!(!ImportJobState::Pending.is_terminal());
        assert!(!ImportJobState::Processing.is_terminal());
        assert!(ImportJobState::Completed.is_terminal());
        assert!(ImportJobState::Failed.is_terminal());
        assert!(ImportJobState::Cancelled.is_terminal());
    }

    #[test]
    fn test_job_state_serializes_lowercase() {
        let json = serde_json::to_string(&ImportJobState::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn test_import_job_hides_file_path() {
        let job = ImportJob {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            list_id: None,
            file_name: "contacts.csv".to_string(),
            file_path: "/srv/uploads/secret.csv".to_string(),
            file_size: 120,
            status: ImportJobState::Pending,
            bytes_processed: 0,
            processed: 0,
            successful: 0,
            failed: 0,
            duplicates: 0,
            error_sample: None,
            cancel_requested: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("fileName"));
        assert!(json.contains("bytesProcessed"));
        assert!(!json.contains("secret.csv"));
    }

    #[test]
    fn test_first_row_error_is_kept() {
        let mut progress = ImportProgress::default();
        progress.record_row_error(&RowError::missing_email(2));
        progress.record_row_error(&RowError::missing_email(5));

        assert_eq!(progress.processed, 2);
        assert_eq!(progress.failed, 2);
        assert_eq!(progress.error_sample.as_deref(), Some("Row 2: missing email address"));
    }

    #[test]
    fn test_batch_with_duplicates_keeps_counter_invariant() {
        let mut progress = ImportProgress::default();
        progress.record_batch(10, 7);

        assert_eq!(progress.processed, 10);
        assert_eq!(progress.successful, 7);
        assert_eq!(progress.failed, 3);
        assert_eq!(progress.duplicates, 3);
        assert_eq!(progress.processed, progress.successful + progress.failed);
    }

    #[test]
    fn test_clamp_bytes_to_file_size() {
        let mut progress = ImportProgress {
            bytes_processed: 130,
            ..Default::default()
        };
        progress.clamp_bytes(120);
        assert_eq!(progress.bytes_processed, 120);
    }

    #[test]
    fn test_patch_from_progress_carries_counters() {
        let progress = ImportProgress {
            bytes_processed: 64,
            processed: 3,
            successful: 2,
            failed: 1,
            duplicates: 0,
            error_sample: Some("Row 2: missing email address".to_string()),
        };
        let patch = ImportJobPatch::progress(&progress);
        assert_eq!(patch.status, None);
        assert_eq!(patch.processed, Some(3));
        assert_eq!(patch.bytes_processed, Some(64));
        assert_eq!(patch.error_sample.as_deref(), Some("Row 2: missing email address"));
    }

    #[test]
    fn test_status_update_serializes_camel_case() {
        let update = ImportJobStatusUpdate::new(
            Uuid::nil(),
            ImportJobState::Completed,
            &ImportProgress::default(),
        );
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("jobId"));
        assert!(json.contains("bytesProcessed"));
        assert!(json.contains("\"completed\""));
    }
}

// ==========================================================================
// Job record
// ==========================================================================

/// Lifecycle state of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "import_job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImportJobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ImportJobState {
    /// Terminal states are never mutated again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ImportJobState::Completed | ImportJobState::Failed | ImportJobState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImportJobState::Pending => "pending",
            ImportJobState::Processing => "processing",
            ImportJobState::Completed => "completed",
            ImportJobState::Failed => "failed",
            ImportJobState::Cancelled => "cancelled",
        }
    }
}

/// Persistent record of one import run
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Target list; imported contacts are linked to it when present
    pub list_id: Option<Uuid>,

    // Provenance of the uploaded file
    pub file_name: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_size: i64,

    pub status: ImportJobState,

    // Counters, non-decreasing while processing
    pub bytes_processed: i64,
    pub processed: i64,
    pub successful: i64,
    pub failed: i64,
    /// Rows skipped because the contact already existed (subset of `failed`)
    pub duplicates: i64,

    /// First fatal or row-level error encountered
    pub error_sample: Option<String>,
    pub cancel_requested: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields needed to create a job record in `pending` state
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub user_id: Uuid,
    pub list_id: Option<Uuid>,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
}

/// Merge-patch for a job record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportJobPatch {
    pub status: Option<ImportJobState>,
    pub bytes_processed: Option<i64>,
    pub processed: Option<i64>,
    pub successful: Option<i64>,
    pub failed: Option<i64>,
    pub duplicates: Option<i64>,
    pub error_sample: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportJobPatch {
    pub fn status(status: ImportJobState) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Checkpoint patch carrying the current counters
    pub fn progress(progress: &ImportProgress) -> Self {
        Self {
            bytes_processed: Some(progress.bytes_processed as i64),
            processed: Some(progress.processed as i64),
            successful: Some(progress.successful as i64),
            failed: Some(progress.failed as i64),
            duplicates: Some(progress.duplicates as i64),
            error_sample: progress.error_sample.clone(),
            ..Default::default()
        }
    }

    /// Terminal patch: counters plus final status and completion time
    pub fn finished(status: ImportJobState, progress: &ImportProgress) -> Self {
        Self {
            status: Some(status),
            completed_at: Some(Utc::now()),
            ..Self::progress(progress)
        }
    }
}

// ==========================================================================
// In-flight progress
// ==========================================================================

/// Counters accumulated by one orchestrator run.
///
/// `processed` only counts settled rows (row errors immediately, valid rows
/// once their batch is flushed), so `processed == successful + failed`
/// holds at every checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub bytes_processed: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub error_sample: Option<String>,
}

impl ImportProgress {
    pub fn record_row_error(&mut self, error: &RowError) {
        self.processed += 1;
        self.failed += 1;
        if self.error_sample.is_none() {
            self.error_sample = Some(error.to_string());
        }
    }

    /// Settle a flushed batch of `written` rows of which `inserted` were persisted
    pub fn record_batch(&mut self, written: u64, inserted: u64) {
        let skipped = written.saturating_sub(inserted);
        self.processed += written;
        self.successful += inserted;
        self.failed += skipped;
        self.duplicates += skipped;
    }

    pub fn clamp_bytes(&mut self, file_size: u64) {
        self.bytes_processed = self.bytes_processed.min(file_size);
    }
}

// ==========================================================================
// Events and responses
// ==========================================================================

/// Live status update published at checkpoints and on termination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobStatusUpdate {
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: ImportJobState,
    #[serde(flatten)]
    pub progress: ImportProgress,
}

impl ImportJobStatusUpdate {
    pub fn new(job_id: Uuid, status: ImportJobState, progress: &ImportProgress) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            status,
            progress: progress.clone(),
        }
    }
}

/// Response when an import job is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobSubmitResponse {
    pub job_id: Uuid,
}

/// Response when cancellation of an import job is requested
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelImportResponse {
    pub job_id: Uuid,
    pub cancel_requested: bool,
}
