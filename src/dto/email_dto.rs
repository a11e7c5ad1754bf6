use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::calendar_event::EventOutcome;
use crate::models::email::{DeliveryOutcome, EmailDraft};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmailBatchPayload {
    pub job_id: Uuid,
    #[validate(length(min = 1))]
    pub interview_datetime: String,
    #[validate(length(min = 1, max = 200))]
    pub interviewer_name: String,
    #[validate(length(min = 1))]
    pub candidate_ids: Vec<Uuid>,
    /// Operator whose Google Calendar receives the interview events.
    /// Without it no events are created.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftListResponse {
    pub drafts: Vec<EmailDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReportResponse {
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<DeliveryOutcome>,
    pub scheduled: usize,
    pub events: Vec<EventOutcome>,
}
