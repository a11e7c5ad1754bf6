use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Name recorded for documents that are not resumes.
pub const NOT_A_RESUME: &str = "N/A";

/// One analyzed resume, as produced by the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRanking {
    pub candidate_index: i32,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub suitability_score: f64,
    pub summary: String,
}

impl CandidateRanking {
    /// Placeholder for a document the engine rejected or never answered for.
    pub fn not_a_resume(candidate_index: i32, summary: impl Into<String>) -> Self {
        Self {
            candidate_index,
            candidate_name: NOT_A_RESUME.to_string(),
            candidate_email: None,
            suitability_score: 0.0,
            summary: summary.into(),
        }
    }

    pub fn is_resume(&self) -> bool {
        self.candidate_name != NOT_A_RESUME
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCandidate {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_index: i32,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub suitability_score: f64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    /// Client-side selection state. Never stored.
    #[serde(default)]
    pub selected: bool,
}

impl PersistedCandidate {
    pub fn from_ranking(
        id: Uuid,
        job_id: Uuid,
        ranking: &CandidateRanking,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_id,
            candidate_index: ranking.candidate_index,
            candidate_name: ranking.candidate_name.clone(),
            candidate_email: ranking.candidate_email.clone(),
            suitability_score: ranking.suitability_score,
            summary: ranking.summary.clone(),
            created_at,
            selected: false,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CandidateRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_index: i32,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub suitability_score: f64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl From<CandidateRow> for PersistedCandidate {
    fn from(row: CandidateRow) -> Self {
        Self {
            id: row.id,
            job_id: row.job_id,
            candidate_index: row.candidate_index,
            candidate_name: row.candidate_name,
            candidate_email: row.candidate_email,
            suitability_score: row.suitability_score,
            summary: row.summary,
            created_at: row.created_at,
            selected: false,
        }
    }
}
