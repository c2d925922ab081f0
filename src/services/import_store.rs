//! Persistence seam for the import pipeline.
//!
//! `ImportStore` is the only interface the orchestrator and the submission
//! endpoint use to reach storage. `PgImportStore` is the production
//! implementation; tests use `InMemoryImportStore`.
//!
//! The trait is object-safe so callers can hold `Arc<dyn ImportStore>`.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::types::{
    ContactBatchResult, ContactList, ImportJob, ImportJobPatch, NewContact, NewImportJob,
    NewNotification,
};

#[async_trait]
pub trait ImportStore: Send + Sync {
    /// Insert a job in `pending` state with zeroed counters
    async fn create_import_job(&self, job: NewImportJob) -> Result<ImportJob>;

    /// Merge-patch status, counters and error sample.
    /// Returns `false` when the job is missing or already terminal.
    async fn update_import_job(&self, job_id: Uuid, patch: ImportJobPatch) -> Result<bool>;

    /// Ownership-scoped read
    async fn get_import_job(&self, job_id: Uuid, user_id: Uuid) -> Result<Option<ImportJob>>;

    /// Flag a non-terminal job for cancellation. Returns `false` if nothing was flagged.
    async fn request_cancel(&self, job_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn is_cancel_requested(&self, job_id: Uuid) -> Result<bool>;

    /// Bulk insert; returns persisted count and ids in input order
    async fn create_contacts_batch(&self, rows: &[NewContact]) -> Result<ContactBatchResult>;

    /// Bulk link; returns number of new memberships
    async fn add_contacts_to_list(&self, list_id: Uuid, contact_ids: &[Uuid], user_id: Uuid) -> Result<u64>;

    async fn create_contact_list(&self, user_id: Uuid, name: &str) -> Result<ContactList>;

    async fn contact_list_exists(&self, list_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn create_notification(&self, notification: NewNotification) -> Result<()>;
}

// =============================================================================
// PgImportStore: PostgreSQL via sqlx
// =============================================================================

pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn create_import_job(&self, job: NewImportJob) -> Result<ImportJob> {
        queries::import_job::create_import_job(&self.pool, &job).await
    }

    async fn update_import_job(&self, job_id: Uuid, patch: ImportJobPatch) -> Result<bool> {
        queries::import_job::update_import_job(&self.pool, job_id, &patch).await
    }

    async fn get_import_job(&self, job_id: Uuid, user_id: Uuid) -> Result<Option<ImportJob>> {
        queries::import_job::get_import_job(&self.pool, job_id, user_id).await
    }

    async fn request_cancel(&self, job_id: Uuid, user_id: Uuid) -> Result<bool> {
        queries::import_job::request_cancel(&self.pool, job_id, user_id).await
    }

    async fn is_cancel_requested(&self, job_id: Uuid) -> Result<bool> {
        queries::import_job::is_cancel_requested(&self.pool, job_id).await
    }

    async fn create_contacts_batch(&self, rows: &[NewContact]) -> Result<ContactBatchResult> {
        queries::contact::create_contacts_batch(&self.pool, rows).await
    }

    async fn add_contacts_to_list(&self, list_id: Uuid, contact_ids: &[Uuid], user_id: Uuid) -> Result<u64> {
        queries::contact::add_contacts_to_list(&self.pool, list_id, contact_ids, user_id).await
    }

    async fn create_contact_list(&self, user_id: Uuid, name: &str) -> Result<ContactList> {
        queries::contact::create_contact_list(&self.pool, user_id, name).await
    }

    async fn contact_list_exists(&self, list_id: Uuid, user_id: Uuid) -> Result<bool> {
        queries::contact::contact_list_exists(&self.pool, list_id, user_id).await
    }

    async fn create_notification(&self, notification: NewNotification) -> Result<()> {
        queries::notification::create_notification(&self.pool, &notification).await?;
        Ok(())
    }
}

// =============================================================================
// InMemoryImportStore: captures everything in memory (tests)
// =============================================================================

#[cfg(test)]
pub use fake::InMemoryImportStore;
