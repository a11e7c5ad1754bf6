use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::models::candidate::{CandidateRanking, NOT_A_RESUME};
use crate::services::ingest_service::{parse_data_uri, ResumePayload};

pub const MAX_SUMMARY_CHARS: usize = 1000;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const RANKING_INSTRUCTION: &str = r#"You are an expert HR assistant. You will rank candidates based on their resumes against a job description.
From each resume, you MUST extract the candidate's full name and email address.

If a provided document is not a resume (e.g., it is a code file, an invoice, a spreadsheet or other irrelevant document), you must still process it. In such cases:
1. Set the candidate's name to 'N/A'.
2. Set the suitability score to 0.
3. Provide a summary explaining that the document is not a valid resume.
4. Omit the email address field.

For every document return exactly one entry with:
- candidateIndex: the number given after "Candidate" for that document.
- candidateName: the candidate's full name.
- candidateEmail: the email address, omitted when none is present.
- suitabilityScore: a number between 0 and 1, where 1 is the most suitable. Judge strictly from the resume content.
- summary: at most a few sentences justifying the score.

Respond only with JSON: { "rankings": [ ... ] }."#;

/// Wire request understood by every analysis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub job_description: String,
    pub resumes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub rankings: Vec<RawCandidateRanking>,
}

/// Engine output before validation. Every field is optional so that one
/// malformed record never fails the whole response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandidateRanking {
    pub candidate_index: Option<f64>,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub suitability_score: Option<f64>,
    pub summary: Option<String>,
}

#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn rank(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;
}

/// Validates batches, fans them out to the engine and normalizes whatever
/// comes back into exactly one ranking per input payload, in input order.
#[derive(Clone)]
pub struct CandidateAnalyzer {
    engine: Arc<dyn AnalysisEngine>,
    chunk_size: usize,
    timeout: Duration,
}

impl CandidateAnalyzer {
    pub fn new(engine: Arc<dyn AnalysisEngine>, chunk_size: usize, timeout: Duration) -> Self {
        Self {
            engine,
            chunk_size: chunk_size.max(1),
            timeout,
        }
    }

    pub async fn analyze(
        &self,
        job_description: &str,
        payloads: &[ResumePayload],
    ) -> Result<Vec<CandidateRanking>> {
        if job_description.trim().is_empty() {
            return Err(Error::InvalidInput("Job description is empty".into()));
        }
        if payloads.is_empty() {
            return Err(Error::InvalidInput("No resumes to analyze".into()));
        }

        tracing::info!(
            resumes = payloads.len(),
            chunks = payloads.len().div_ceil(self.chunk_size),
            "Submitting resumes for analysis"
        );

        let mut tasks = JoinSet::new();
        for (chunk_no, chunk) in payloads.chunks(self.chunk_size).enumerate() {
            let offset = chunk_no * self.chunk_size;
            let request = AnalysisRequest {
                job_description: job_description.to_string(),
                resumes: chunk.iter().map(ResumePayload::to_data_uri).collect(),
            };
            let engine = self.engine.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let response = tokio::time::timeout(timeout, engine.rank(&request))
                    .await
                    .map_err(|_| {
                        Error::UpstreamUnavailable(format!(
                            "Analysis timed out after {}s",
                            timeout.as_secs()
                        ))
                    })??;
                Ok::<_, Error>((offset, normalize_rankings(response.rankings, request.resumes.len())))
            });
        }

        let mut slots: Vec<Option<CandidateRanking>> = vec![None; payloads.len()];
        while let Some(joined) = tasks.join_next().await {
            let (offset, rankings) =
                joined.map_err(|e| Error::Internal(format!("Analysis task panicked: {}", e)))??;
            for mut ranking in rankings {
                let position = offset + ranking.candidate_index as usize;
                ranking.candidate_index = position as i32;
                slots[position] = Some(ranking);
            }
        }

        Ok(slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.unwrap_or_else(|| {
                    CandidateRanking::not_a_resume(position as i32, "No analysis result was returned for this document.")
                })
            })
            .collect())
    }
}

/// Maps raw engine records onto `0..expected`.
///
/// Records whose index is missing use their position in the response.
/// Out-of-range and duplicate indices are dropped; positions left empty
/// degrade to a not-a-resume record.
pub fn normalize_rankings(raw: Vec<RawCandidateRanking>, expected: usize) -> Vec<CandidateRanking> {
    let mut slots: Vec<Option<CandidateRanking>> = vec![None; expected];

    for (position, record) in raw.into_iter().enumerate() {
        let index = match record.candidate_index {
            Some(i) if i.is_finite() && i >= 0.0 && i.fract() == 0.0 => i as usize,
            Some(i) => {
                tracing::warn!(index = i, "Dropping ranking with malformed candidateIndex");
                continue;
            }
            None => position,
        };
        if index >= expected {
            tracing::warn!(index, expected, "Dropping ranking with out-of-range candidateIndex");
            continue;
        }
        if slots[index].is_some() {
            tracing::warn!(index, "Dropping duplicate ranking");
            continue;
        }
        slots[index] = Some(normalize_record(record, index as i32));
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                CandidateRanking::not_a_resume(index as i32, "No analysis result was returned for this document.")
            })
        })
        .collect()
}

fn normalize_record(record: RawCandidateRanking, index: i32) -> CandidateRanking {
    let name = record
        .candidate_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case(NOT_A_RESUME))
        .map(str::to_string);
    let summary = record
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, MAX_SUMMARY_CHARS));

    let Some(name) = name else {
        return CandidateRanking::not_a_resume(
            index,
            summary.unwrap_or_else(|| "The document is not a valid resume.".to_string()),
        );
    };

    let score = record
        .suitability_score
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    CandidateRanking {
        candidate_index: index,
        candidate_name: name,
        candidate_email: record.candidate_email.as_deref().and_then(clean_email),
        suitability_score: score,
        summary: summary.unwrap_or_else(|| "No summary provided.".to_string()),
    }
}

fn clean_email(raw: &str) -> Option<String> {
    let email = raw.trim();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || email.chars().any(char::is_whitespace) {
        return None;
    }
    Some(email.to_string())
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s.to_string(),
    }
}

/// Analysis backed by the Gemini `generateContent` API. Resumes travel as
/// inline document parts, so PDFs and Word files need no local parsing.
#[derive(Clone)]
pub struct GeminiEngine {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiEngine {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn build_payload(&self, request: &AnalysisRequest) -> Result<JsonValue> {
        let mut parts = vec![json!({
            "text": format!("Job Description:\n{}\n\nResumes:", request.job_description)
        })];
        for (index, uri) in request.resumes.iter().enumerate() {
            let (media_type, data) = parse_data_uri(uri)?;
            parts.push(json!({ "text": format!("Candidate {}:", index) }));
            parts.push(json!({
                "inline_data": { "mime_type": media_type, "data": data }
            }));
        }

        Ok(json!({
            "system_instruction": { "parts": [{ "text": RANKING_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.0,
                "responseSchema": ranking_schema(),
            }
        }))
    }
}

#[async_trait]
impl AnalysisEngine for GeminiEngine {
    async fn rank(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let payload = self.build_payload(request)?;

        let res = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API_BASE, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %text, "Gemini request failed");
            return Err(if is_transient(status) {
                Error::UpstreamUnavailable(format!("Gemini returned {}", status))
            } else {
                Error::AnalysisFailed(format!("Gemini returned {}: {}", status, text))
            });
        }

        let body: JsonValue = res.json().await.map_err(classify_transport_error)?;
        parse_analysis_text(&response_text(&body)?)
    }
}

/// Concatenates the text of every part of the first candidate. Long
/// answers may arrive split across parts.
pub fn response_text(body: &JsonValue) -> Result<String> {
    let parts = body
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| Error::AnalysisFailed("Gemini response has no content".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        return Err(Error::AnalysisFailed("Gemini response has no text".into()));
    }
    Ok(text)
}

/// Accepts `{ "rankings": [...] }`, a bare array, and either wrapped in a
/// Markdown code fence.
pub fn parse_analysis_text(text: &str) -> Result<AnalysisResponse> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: JsonValue = serde_json::from_str(cleaned)
        .map_err(|e| Error::AnalysisFailed(format!("Unparseable analysis response: {}", e)))?;

    let rankings = match value {
        JsonValue::Array(_) => value,
        JsonValue::Object(mut map) => map
            .remove("rankings")
            .ok_or_else(|| Error::AnalysisFailed("Analysis response has no rankings".into()))?,
        _ => return Err(Error::AnalysisFailed("Analysis response is not an object".into())),
    };

    let JsonValue::Array(items) = rankings else {
        return Err(Error::AnalysisFailed("rankings is not an array".into()));
    };

    // Records that are not objects are skipped; their slots get backfilled later.
    let rankings = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawCandidateRanking>(item).ok())
        .collect();

    Ok(AnalysisResponse { rankings })
}

fn ranking_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "rankings": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "candidateIndex": { "type": "INTEGER" },
                        "candidateName": { "type": "STRING" },
                        "candidateEmail": { "type": "STRING" },
                        "suitabilityScore": { "type": "NUMBER" },
                        "summary": { "type": "STRING" }
                    },
                    "required": ["candidateIndex", "candidateName", "suitabilityScore", "summary"]
                }
            }
        },
        "required": ["rankings"]
    })
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn classify_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() {
        Error::UpstreamUnavailable(err.to_string())
    } else if err.is_decode() {
        Error::AnalysisFailed(format!("Malformed analysis response: {}", err))
    } else {
        Error::Reqwest(err)
    }
}
