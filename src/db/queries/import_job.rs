//! Import job record queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{ImportJob, ImportJobPatch, NewImportJob};

const JOB_COLUMNS: &str = r#"
    id, user_id, list_id, file_name, file_path, file_size, status,
    bytes_processed, processed, successful, failed, duplicates,
    error_sample, cancel_requested, created_at, updated_at, completed_at
"#;

/// Insert a job record in `pending` state with zeroed counters
pub async fn create_import_job(pool: &PgPool, job: &NewImportJob) -> Result<ImportJob> {
    let sql = format!(
        r#"
        INSERT INTO import_jobs (
            id, user_id, list_id, file_name, file_path, file_size,
            status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', NOW(), NOW())
        RETURNING {}
        "#,
        JOB_COLUMNS
    );

    let created = sqlx::query_as::<_, ImportJob>(&sql)
        .bind(Uuid::new_v4())
        .bind(job.user_id)
        .bind(job.list_id)
        .bind(&job.file_name)
        .bind(&job.file_path)
        .bind(job.file_size)
        .fetch_one(pool)
        .await?;

    Ok(created)
}

/// Merge-patch a job record. Terminal records are left untouched.
pub async fn update_import_job(pool: &PgPool, job_id: Uuid, patch: &ImportJobPatch) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = COALESCE($2, status),
            bytes_processed = COALESCE($3, bytes_processed),
            processed = COALESCE($4, processed),
            successful = COALESCE($5, successful),
            failed = COALESCE($6, failed),
            duplicates = COALESCE($7, duplicates),
            error_sample = COALESCE($8, error_sample),
            completed_at = COALESCE($9, completed_at),
            updated_at = NOW()
        WHERE id = $1
          AND status NOT IN ('completed', 'failed', 'cancelled')
        "#,
    )
    .bind(job_id)
    .bind(patch.status)
    .bind(patch.bytes_processed)
    .bind(patch.processed)
    .bind(patch.successful)
    .bind(patch.failed)
    .bind(patch.duplicates)
    .bind(&patch.error_sample)
    .bind(patch.completed_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Ownership-scoped read used by polling clients
pub async fn get_import_job(pool: &PgPool, job_id: Uuid, user_id: Uuid) -> Result<Option<ImportJob>> {
    let sql = format!(
        "SELECT {} FROM import_jobs WHERE id = $1 AND user_id = $2",
        JOB_COLUMNS
    );

    let job = sqlx::query_as::<_, ImportJob>(&sql)
        .bind(job_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(job)
}

/// Flag a non-terminal job for cooperative cancellation
pub async fn request_cancel(pool: &PgPool, job_id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET cancel_requested = TRUE, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
          AND status IN ('pending', 'processing')
        "#,
    )
    .bind(job_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_cancel_requested(pool: &PgPool, job_id: Uuid) -> Result<bool> {
    let flag: Option<bool> = sqlx::query_scalar(
        "SELECT cancel_requested FROM import_jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(flag.unwrap_or(false))
}
