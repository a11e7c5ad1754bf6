use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::job_dto::{JobDetailResponse, JobListResponse, UpdateJobPayload},
    error::{Error, Result},
    models::job::JobSnapshot,
    services::{ingest_service::{self, ResumePayload}, ranking::rank_descending},
    AppState,
};

#[derive(Default)]
struct JobForm {
    title: Option<String>,
    job_description: Option<String>,
    resumes: Vec<ResumePayload>,
}

/// Text fields by name; every part carrying a file name is a resume.
async fn read_job_form(mut multipart: Multipart) -> Result<JobForm> {
    let mut form = JobForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await?;
            // Browsers send an untouched file input as a nameless empty part.
            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            form.resumes.push(ingest_service::ingest(
                &file_name,
                content_type.as_deref(),
                data.to_vec(),
            )?);
            continue;
        }

        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "jobDescription" | "job_description" => {
                form.job_description = Some(field.text().await?)
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

fn detail(snapshot: JobSnapshot) -> JobDetailResponse {
    JobDetailResponse {
        job: snapshot.job,
        candidates: rank_descending(snapshot.candidates),
    }
}

/// Multipart form: `title`, `jobDescription` and any number of resume files.
#[utoipa::path(
    post,
    path = "/api/jobs",
    responses(
        (status = 201, description = "Job created without resumes"),
        (status = 202, description = "Job created, resumes are being analyzed"),
        (status = 400, description = "Invalid form")
    )
)]
#[axum::debug_handler]
pub async fn create_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_job_form(multipart).await?;
    let title = form.title.unwrap_or_default();
    let job_description = form.job_description.unwrap_or_default();

    let job = state
        .pipeline
        .create_job(&title, &job_description, &form.resumes)
        .await?;

    if form.resumes.is_empty() {
        return Ok((StatusCode::CREATED, Json(job)));
    }
    state.pipeline.spawn_batch(&job, form.resumes);
    Ok((StatusCode::ACCEPTED, Json(job)))
}

#[utoipa::path(
    post,
    path = "/api/jobs/{id}/resumes",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 202, description = "Resumes accepted for analysis"),
        (status = 400, description = "No resumes supplied"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "An earlier batch is still processing")
    )
)]
#[axum::debug_handler]
pub async fn add_resumes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_job_form(multipart).await?;
    let job = state.pipeline.prepare_resumes(id, &form.resumes).await?;
    state.pipeline.spawn_batch(&job, form.resumes);
    Ok((StatusCode::ACCEPTED, Json(job)))
}

#[utoipa::path(
    get,
    path = "/api/jobs",
    responses((status = 200, description = "All jobs, newest first", body = Json<JobListResponse>))
)]
#[axum::debug_handler]
pub async fn list_jobs(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let items = state.store.list_jobs().await?;
    Ok(Json(JobListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job with ranked candidates", body = Json<JobDetailResponse>),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let snapshot = state.store.snapshot(id).await?;
    Ok(Json(detail(snapshot)))
}

/// Edits never re-rank existing candidates.
#[utoipa::path(
    patch,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    request_body = UpdateJobPayload,
    responses(
        (status = 200, description = "Job updated"),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let title = payload.title.as_deref().map(str::trim);
    let job_description = payload.job_description.as_deref().map(str::trim);

    if title.is_none() && job_description.is_none() {
        return Err(Error::Validation("Nothing to update".into()));
    }
    if title == Some("") {
        return Err(Error::Validation("Job title cannot be blank".into()));
    }
    if job_description == Some("") {
        return Err(Error::Validation("Job description cannot be blank".into()));
    }

    let job = state.store.update_job(id, title, job_description).await?;
    Ok(Json(job))
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job and its candidates deleted"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.store.delete_job(id).await?;
    tracing::info!(job_id = %id, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}/events",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Server-sent `job` events carrying the ranked job state"),
        (status = 404, description = "Job not found")
    )
)]
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let subscription = state.store.subscribe(id).await?;

    let events = stream::unfold(subscription, |mut subscription| async move {
        let snapshot = subscription.next().await?;
        let event = Event::default()
            .event("job")
            .json_data(detail(snapshot))
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Some((Ok::<_, Infallible>(event), subscription))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
