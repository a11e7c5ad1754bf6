pub mod calendar;
pub mod candidates;
pub mod emails;
pub mod health;
pub mod jobs;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let jobs_api = Router::new()
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/api/jobs/:id",
            get(jobs::get_job)
                .patch(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/api/jobs/:id/resumes", post(jobs::add_resumes))
        .route("/api/jobs/:id/events", get(jobs::job_events))
        .route(
            "/api/jobs/:id/candidates",
            get(candidates::list_candidates).delete(candidates::delete_all_candidates),
        )
        .route(
            "/api/jobs/:id/candidates/select-top",
            post(candidates::select_top),
        )
        .route(
            "/api/jobs/:id/candidates/:candidate_id",
            delete(candidates::delete_candidate),
        );

    let emails_api = Router::new()
        .route("/api/emails/draft", post(emails::draft_emails))
        .route("/api/emails/send", post(emails::send_emails));

    let auth_api = Router::new()
        .route("/api/auth/google", get(calendar::google_auth_url))
        .route("/api/auth/google/callback", get(calendar::google_callback));

    Router::new()
        .route("/health", get(health::health))
        .merge(jobs_api)
        .merge(emails_api)
        .merge(auth_api)
        .with_state(state)
}
