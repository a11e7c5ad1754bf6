use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::job_dto::{CandidateListResponse, DeletedResponse, SelectTopPayload, SelectTopResponse},
    error::Result,
    services::ranking::{rank_descending, select_top_n},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/jobs/{id}/candidates",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Candidates, best first", body = Json<CandidateListResponse>),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn list_candidates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.store.get_job(id).await?;
    let items = rank_descending(state.store.list_candidates(id).await?);
    Ok(Json(CandidateListResponse { items }))
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}/candidates/{candidate_id}",
    params(
        ("id" = Uuid, Path, description = "Job ID"),
        ("candidate_id" = Uuid, Path, description = "Candidate ID")
    ),
    responses(
        (status = 204, description = "Candidate deleted"),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_candidate(
    State(state): State<AppState>,
    Path((id, candidate_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    state.store.delete_candidate(id, candidate_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}/candidates",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Number of candidates removed", body = Json<DeletedResponse>),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_all_candidates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let deleted = state.store.delete_all_candidates(id).await?;
    tracing::info!(job_id = %id, deleted, "Candidates cleared");
    Ok(Json(DeletedResponse { deleted }))
}

#[utoipa::path(
    post,
    path = "/api/jobs/{id}/candidates/select-top",
    params(("id" = Uuid, Path, description = "Job ID")),
    request_body = SelectTopPayload,
    responses(
        (status = 200, description = "Ids of the top candidates, best first", body = Json<SelectTopResponse>),
        (status = 400, description = "count must be positive"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn select_top(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectTopPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.store.get_job(id).await?;
    let candidates = state.store.list_candidates(id).await?;
    let selected_ids = select_top_n(&candidates, payload.count)?;
    Ok(Json(SelectTopResponse { selected_ids }))
}
