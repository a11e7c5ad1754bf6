use serde::{Deserialize, Serialize};

/// Body of a Google Calendar `events.insert` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub attendees: Vec<Attendee>,
    pub conference_data: ConferenceData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    /// RFC 3339.
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attendee {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    pub create_request: ConferenceRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceRequest {
    pub request_id: String,
    pub conference_solution_key: ConferenceSolutionKey,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConferenceSolutionKey {
    #[serde(rename = "type")]
    pub kind: String,
}

/// The fields of a created event the dashboard links to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
    pub hangout_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Skipped,
    Failed,
}

/// Result of booking one interview on the operator's calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcome {
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub status: EventStatus,
    pub event_id: Option<String>,
    pub html_link: Option<String>,
    pub meet_link: Option<String>,
    pub error: Option<String>,
}

impl EventOutcome {
    pub fn scheduled(candidate_name: String, candidate_email: String, event: CreatedEvent) -> Self {
        Self {
            candidate_name,
            candidate_email: Some(candidate_email),
            status: EventStatus::Scheduled,
            event_id: Some(event.id),
            html_link: event.html_link,
            meet_link: event.hangout_link,
            error: None,
        }
    }

    pub fn unscheduled(
        candidate_name: String,
        candidate_email: Option<String>,
        status: EventStatus,
        error: String,
    ) -> Self {
        Self {
            candidate_name,
            candidate_email,
            status,
            event_id: None,
            html_link: None,
            meet_link: None,
            error: Some(error),
        }
    }
}
