use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraft {
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct InterviewDetails {
    pub datetime: DateTime<Utc>,
    pub interviewer_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// Result of sending one draft. Failures are reported per recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}
