use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::email_dto::{DeliveryReportResponse, DraftListResponse, EmailBatchPayload},
    error::{Error, Result},
    models::{
        calendar_event::EventStatus,
        candidate::PersistedCandidate,
        email::{DeliveryStatus, InterviewDetails},
        job::Job,
    },
    services::{
        email_service,
        ranking::{apply_selection, rank_descending},
    },
    utils::time::parse_interview_datetime,
    AppState,
};

/// The requested candidates that still exist, best first and selected.
async fn load_selection(
    state: &AppState,
    payload: &EmailBatchPayload,
) -> Result<(Job, InterviewDetails, Vec<PersistedCandidate>)> {
    payload.validate()?;
    let interview = InterviewDetails {
        datetime: parse_interview_datetime(&payload.interview_datetime)?,
        interviewer_name: payload.interviewer_name.trim().to_string(),
    };

    let job = state.store.get_job(payload.job_id).await?;
    let found = state
        .store
        .get_candidates(payload.job_id, &payload.candidate_ids)
        .await?;
    if found.len() < payload.candidate_ids.len() {
        tracing::warn!(
            job_id = %job.id,
            requested = payload.candidate_ids.len(),
            found = found.len(),
            "Some selected candidates no longer exist"
        );
    }

    let selected = apply_selection(rank_descending(found), &payload.candidate_ids);
    Ok((job, interview, selected))
}

#[utoipa::path(
    post,
    path = "/api/emails/draft",
    request_body = EmailBatchPayload,
    responses(
        (status = 200, description = "One draft per selected candidate", body = Json<DraftListResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn draft_emails(
    State(state): State<AppState>,
    Json(payload): Json<EmailBatchPayload>,
) -> Result<impl IntoResponse> {
    let (job, interview, selected) = load_selection(&state, &payload).await?;
    let drafts = email_service::draft(&job, &interview, &selected);
    Ok(Json(DraftListResponse { drafts }))
}

/// Sends the confirmations and, when `userId` names a connected operator,
/// books the interviews on their Google Calendar.
#[utoipa::path(
    post,
    path = "/api/emails/send",
    request_body = EmailBatchPayload,
    responses(
        (status = 200, description = "Per-recipient delivery and calendar outcome", body = Json<DeliveryReportResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Calendar not connected for userId"),
        (status = 404, description = "Job not found"),
        (status = 502, description = "Email delivery is not configured")
    )
)]
#[axum::debug_handler]
pub async fn send_emails(
    State(state): State<AppState>,
    Json(payload): Json<EmailBatchPayload>,
) -> Result<impl IntoResponse> {
    let mailer = state
        .mailer
        .clone()
        .ok_or_else(|| Error::Delivery("Email delivery is not configured".into()))?;

    let (job, interview, selected) = load_selection(&state, &payload).await?;

    // Calendar access is settled before any mail goes out.
    let user_id = payload
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let access_token = match user_id {
        Some(user_id) => Some(state.calendar.access_token(user_id).await?),
        None => None,
    };

    let drafts = email_service::draft(&job, &interview, &selected);
    let results = email_service::send_drafts(mailer.as_ref(), &drafts).await;

    let events = match access_token {
        Some(token) => {
            state
                .calendar
                .schedule_interviews(&token, &job, &interview, &selected)
                .await
        }
        None => Vec::new(),
    };

    let sent = results
        .iter()
        .filter(|r| r.status == DeliveryStatus::Sent)
        .count();
    let scheduled = events
        .iter()
        .filter(|e| e.status == EventStatus::Scheduled)
        .count();
    tracing::info!(job_id = %payload.job_id, sent, failed = results.len() - sent, scheduled, "Interview emails processed");

    Ok(Json(DeliveryReportResponse {
        sent,
        failed: results.len() - sent,
        results,
        scheduled,
        events,
    }))
}
