//! Contact import endpoints
//!
//! - `POST /api/contacts/import` spools the upload, creates a pending job and
//!   hands it to the orchestrator (202)
//! - `GET /api/contacts/import/:id` returns the job record
//! - `POST /api/contacts/import/:id/cancel` requests cooperative cancellation

use std::path::{Path, PathBuf};

use axum::{
    extract::{multipart::Field, Multipart, Path as UrlPath, State},
    http::StatusCode,
    Json,
};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::types::{CancelImportResponse, ImportJob, ImportJobSubmitResponse, NewImportJob};

const DEFAULT_FILE_NAME: &str = "contacts.csv";

/// Upload written to `UPLOAD_DIR`
#[derive(Debug)]
struct SpooledUpload {
    path: PathBuf,
    file_name: String,
    size: u64,
}

/// Multipart fields of an import submission
#[derive(Debug, Default)]
struct ImportForm {
    upload: Option<SpooledUpload>,
    list_id: Option<String>,
    create_new_list: bool,
    new_list_name: Option<String>,
}

impl ImportForm {
    async fn discard(self) {
        if let Some(upload) = self.upload {
            remove_quietly(&upload.path).await;
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/contacts/import
pub async fn submit_import(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ImportJobSubmitResponse>)> {
    let mut form = ImportForm::default();
    if let Err(e) = read_form(&mut multipart, &state, &mut form).await {
        form.discard().await;
        return Err(e);
    }

    let Some(upload) = form.upload.take() else {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    };

    let job = match create_job(&state, user_id, &form, &upload).await {
        Ok(job) => job,
        Err(e) => {
            remove_quietly(&upload.path).await;
            return Err(e);
        }
    };

    info!(
        job_id = %job.id,
        user_id = %user_id,
        file_name = %job.file_name,
        file_size = job.file_size,
        list_id = ?job.list_id,
        "Contact import accepted"
    );

    let job_id = job.id;
    state.processor.spawn(job);

    Ok((StatusCode::ACCEPTED, Json(ImportJobSubmitResponse { job_id })))
}

/// GET /api/contacts/import/:id
pub async fn get_import(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<ImportJob>> {
    let job = find_job(&state, &id, user_id).await?;
    Ok(Json(job))
}

/// POST /api/contacts/import/:id/cancel
pub async fn cancel_import(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<(StatusCode, Json<CancelImportResponse>)> {
    let job = find_job(&state, &id, user_id).await?;
    if job.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Import job is already {}",
            job.status.as_str()
        )));
    }

    if !state.store.request_cancel(job.id, user_id).await? {
        // Finished between the read and the flag write
        return Err(ApiError::Conflict("Import job has already finished".to_string()));
    }

    match state.processor.running_jobs().cancel(&job.id, user_id) {
        Ok(true) => info!(job_id = %job.id, "Cancelled running import"),
        Ok(false) => info!(job_id = %job.id, "Cancellation flagged for import not running here"),
        Err(e) => warn!(job_id = %job.id, error = ?e, "Could not trip local cancellation token"),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(CancelImportResponse {
            job_id: job.id,
            cancel_requested: true,
        }),
    ))
}

// =============================================================================
// Helpers
// =============================================================================

async fn find_job(state: &AppState, id: &str, user_id: Uuid) -> ApiResult<ImportJob> {
    let not_found = || ApiError::NotFound("Import job not found".to_string());
    let job_id = Uuid::parse_str(id).map_err(|_| not_found())?;
    state
        .store
        .get_import_job(job_id, user_id)
        .await?
        .ok_or_else(not_found)
}

async fn read_form(multipart: &mut Multipart, state: &AppState, form: &mut ImportForm) -> ApiResult<()> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if form.upload.is_some() {
                    return Err(ApiError::BadRequest("Only one file may be uploaded".to_string()));
                }
                form.upload = Some(spool_upload(field, &state.upload_dir, state.max_upload_bytes).await?);
            }
            "listId" => form.list_id = non_blank(field.text().await?),
            "createNewList" => form.create_new_list = field.text().await?.trim().eq_ignore_ascii_case("true"),
            "newListName" => form.new_list_name = non_blank(field.text().await?),
            _ => {}
        }
    }
    Ok(())
}

/// Stream one file part to disk, enforcing the size limit as bytes arrive
async fn spool_upload(mut field: Field<'_>, upload_dir: &Path, max_bytes: u64) -> ApiResult<SpooledUpload> {
    let file_name = field
        .file_name()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();
    let path = upload_dir.join(format!("{}.csv", Uuid::new_v4()));

    let mut file = tokio::fs::File::create(&path).await?;
    let result = copy_field(&mut field, &mut file, max_bytes).await;
    drop(file);

    match result {
        Ok(size) => Ok(SpooledUpload { path, file_name, size }),
        Err(e) => {
            remove_quietly(&path).await;
            Err(e)
        }
    }
}

async fn copy_field(field: &mut Field<'_>, file: &mut tokio::fs::File, max_bytes: u64) -> ApiResult<u64> {
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File exceeds the upload limit of {} bytes",
                max_bytes
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}

/// Resolve the target list, then insert the pending job record
async fn create_job(
    state: &AppState,
    user_id: Uuid,
    form: &ImportForm,
    upload: &SpooledUpload,
) -> ApiResult<ImportJob> {
    let list_id = if form.create_new_list {
        let name = form
            .new_list_name
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("newListName is required when createNewList is true".to_string()))?;
        let list = state.store.create_contact_list(user_id, name).await?;
        info!(list_id = %list.id, user_id = %user_id, "Created contact list for import");
        Some(list.id)
    } else if let Some(raw) = form.list_id.as_deref() {
        let list_id = Uuid::parse_str(raw)
            .map_err(|_| ApiError::BadRequest(format!("Invalid listId: {}", raw)))?;
        if !state.store.contact_list_exists(list_id, user_id).await? {
            return Err(ApiError::NotFound("Contact list not found".to_string()));
        }
        Some(list_id)
    } else {
        None
    };

    let job = state
        .store
        .create_import_job(NewImportJob {
            user_id,
            list_id,
            file_name: upload.file_name.clone(),
            file_path: upload.path.to_string_lossy().into_owned(),
            file_size: i64::try_from(upload.size).unwrap_or(i64::MAX),
        })
        .await?;

    Ok(job)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove spooled upload");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use uuid::Uuid;

    use crate::handlers::test_support::*;
    use crate::services::import_store::ImportStore;
    use crate::types::ImportJobState;

    const CSV: &str = "email,first_name,last_name\nada@example.com,Ada,Lovelace\nalan@example.com,Alan,Turing";

    async fn wait_for_terminal(app: &TestApp, job_id: Uuid) -> crate::types::ImportJob {
        for _ in 0..200 {
            if let Some(job) = app.store.job(job_id) {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("import job {} did not finish", job_id);
    }

    async fn submit(app: &TestApp, user_id: Uuid, parts: &[Part<'_>]) -> (StatusCode, serde_json::Value) {
        app.send(multipart_request("/api/contacts/import", Some(user_id), parts)).await
    }

    fn job_id(body: &serde_json::Value) -> Uuid {
        body["jobId"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_202_and_job_completes() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();

        let (status, body) = submit(&app, user_id, &[Part::File("people.csv", CSV)]).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let job = wait_for_terminal(&app, job_id(&body)).await;
        assert_eq!(job.status, ImportJobState::Completed);
        assert_eq!(job.file_name, "people.csv");
        assert_eq!((job.processed, job.successful, job.failed), (2, 2, 0));
        assert_eq!(app.spooled_files(), 0);
    }

    #[tokio::test]
    async fn test_submit_without_file_is_bad_request() {
        let app = TestApp::new();
        let (status, body) = submit(&app, Uuid::new_v4(), &[Part::Text("listId", "")]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "No file uploaded");
        assert_eq!(app.store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_requires_auth() {
        let app = TestApp::new();
        let (status, _) = app
            .send(multipart_request("/api/contacts/import", None, &[Part::File("a.csv", CSV)]))
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.spooled_files(), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_and_removed() {
        let app = TestApp::with_upload_limit(16);
        let (status, body) = submit(&app, Uuid::new_v4(), &[Part::File("big.csv", CSV)]).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(app.spooled_files(), 0);
        assert_eq!(app.store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_create_new_list_links_contacts() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();

        let (status, body) = submit(
            &app,
            user_id,
            &[
                Part::Text("createNewList", "true"),
                Part::Text("newListName", "Conference leads"),
                Part::File("leads.csv", CSV),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let job = wait_for_terminal(&app, job_id(&body)).await;
        let lists = app.store.lists();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].name, "Conference leads");
        assert_eq!(lists[0].user_id, user_id);
        assert_eq!(job.list_id, Some(lists[0].id));
        assert_eq!(app.store.list_member_count(lists[0].id), 2);
    }

    #[tokio::test]
    async fn test_create_new_list_without_name_is_bad_request() {
        let app = TestApp::new();
        let (status, _) = submit(
            &app,
            Uuid::new_v4(),
            &[Part::Text("createNewList", "true"), Part::File("a.csv", CSV)],
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.store.lists().is_empty());
        assert_eq!(app.spooled_files(), 0);
    }

    #[tokio::test]
    async fn test_existing_list_must_belong_to_caller() {
        let app = TestApp::new();
        let list_id = app.store.seed_list(Uuid::new_v4(), "Someone else's");

        let (status, _) = submit(
            &app,
            Uuid::new_v4(),
            &[Part::Text("listId", &list_id.to_string()), Part::File("a.csv", CSV)],
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(app.store.job_count(), 0);
        assert_eq!(app.spooled_files(), 0);
    }

    #[tokio::test]
    async fn test_malformed_list_id_is_bad_request() {
        let app = TestApp::new();
        let (status, _) = submit(
            &app,
            Uuid::new_v4(),
            &[Part::Text("listId", "not-a-uuid"), Part::File("a.csv", CSV)],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_returns_job_for_owner_only() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let (_, body) = submit(&app, owner, &[Part::File("a.csv", CSV)]).await;
        let id = job_id(&body);
        wait_for_terminal(&app, id).await;

        let uri = format!("/api/contacts/import/{}", id);
        let (status, body) = app.send(authed_request("GET", &uri, owner)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["processed"], 2);
        assert_eq!(body["successful"], 2);
        assert!(body.get("filePath").is_none());

        let (status, _) = app.send(authed_request("GET", &uri, Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_unknown_or_malformed_id_is_not_found() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();

        let uri = format!("/api/contacts/import/{}", Uuid::new_v4());
        let (status, _) = app.send(authed_request("GET", &uri, user_id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.send(authed_request("GET", "/api/contacts/import/xyz", user_id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_job_surfaces_error_sample() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let (_, body) = submit(&app, owner, &[Part::File("bad.csv", "name,phone\nAda,123")]).await;
        let id = job_id(&body);
        wait_for_terminal(&app, id).await;

        let uri = format!("/api/contacts/import/{}", id);
        let (_, body) = app.send(authed_request("GET", &uri, owner)).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["errorSample"], "CSV must include an email column");
    }

    #[tokio::test]
    async fn test_cancel_pending_job() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let job = app
            .store
            .create_import_job(crate::types::NewImportJob {
                user_id: owner,
                list_id: None,
                file_name: "a.csv".to_string(),
                file_path: "/nonexistent/a.csv".to_string(),
                file_size: 10,
            })
            .await
            .unwrap();

        let uri = format!("/api/contacts/import/{}/cancel", job.id);
        let (status, body) = app.send(authed_request("POST", &uri, owner)).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["cancelRequested"], true);
        assert!(app.store.job(job.id).unwrap().cancel_requested);

        let outcome = app.state.processor.run(job).await.unwrap();
        assert_eq!(outcome.status, ImportJobState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_finished_job_conflicts() {
        let app = TestApp::new();
        let owner = Uuid::new_v4();
        let (_, body) = submit(&app, owner, &[Part::File("a.csv", CSV)]).await;
        let id = job_id(&body);
        wait_for_terminal(&app, id).await;

        let uri = format!("/api/contacts/import/{}/cancel", id);
        let (status, body) = app.send(authed_request("POST", &uri, owner)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_cancel_other_users_job_is_not_found() {
        let app = TestApp::new();
        let (_, body) = submit(&app, Uuid::new_v4(), &[Part::File("a.csv", CSV)]).await;

        let uri = format!("/api/contacts/import/{}/cancel", job_id(&body));
        let (status, _) = app.send(authed_request("POST", &uri, Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
