use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, StatusCode};
use sha2::Sha256;
use sqlx::PgPool;
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};
use crate::models::calendar_event::{
    Attendee, CalendarEvent, ConferenceData, ConferenceRequest, ConferenceSolutionKey,
    CreatedEvent, EventOutcome, EventStatus, EventTime,
};
use crate::models::calendar_token::{OAuthTokens, TokenEndpointResponse};
use crate::models::candidate::PersistedCandidate;
use crate::models::email::InterviewDetails;
use crate::models::job::Job;
use crate::utils::crypto::TokenCipher;

type HmacSha256 = Hmac<Sha256>;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const SCOPES: &str = "https://www.googleapis.com/auth/calendar.events https://www.googleapis.com/auth/userinfo.email openid";
const STATE_NONCE_LEN: usize = 24;
const INTERVIEW_MINUTES: i64 = 30;
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Google OAuth 2.0 web-server flow.
#[derive(Clone)]
pub struct GoogleOAuth {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleOAuth {
    pub fn new(client: Client, client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub fn auth_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("include_granted_scopes", "true"),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Internal(format!("Invalid OAuth URL: {}", e)))?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokens> {
        let body = self
            .token_request(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await
            .map_err(|e| match e {
                Error::Unauthorized(msg) => Error::Validation(msg),
                other => other,
            })?;
        Ok(body.into_tokens(Utc::now()))
    }

    /// Google does not rotate refresh tokens, so the one used is carried over.
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let body = self
            .token_request(&[
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let mut tokens = body.into_tokens(Utc::now());
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenEndpointResponse> {
        let res = self.client.post(GOOGLE_TOKEN_URL).form(form).send().await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %text, "Google token request failed");
            return Err(if status.is_client_error() {
                Error::Unauthorized(format!("Google rejected the grant ({})", status))
            } else {
                Error::UpstreamUnavailable(format!("Google token endpoint returned {}", status))
            });
        }

        Ok(res.json().await?)
    }
}

/// Signed OAuth `state`: `<nonce>.<base64url(user_id)>.<hex hmac>`.
///
/// The signature binds the operator id to this server, so a callback can
/// only store tokens for the operator that started the flow.
#[derive(Clone)]
pub struct OAuthState {
    key: Vec<u8>,
}

impl OAuthState {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Crypto(format!("invalid state key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, user_id: &str) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_NONCE_LEN)
            .map(char::from)
            .collect();
        let payload = format!("{}.{}", nonce, URL_SAFE_NO_PAD.encode(user_id));
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    /// Returns the operator id of a state this server issued.
    pub fn verify(&self, state: &str) -> Result<String> {
        let invalid = || Error::Validation("Invalid OAuth state".to_string());

        let (payload, signature) = state.rsplit_once('.').ok_or_else(invalid)?;
        let signature = hex::decode(signature).map_err(|_| invalid())?;
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let (nonce, encoded) = payload.split_once('.').ok_or_else(invalid)?;
        if nonce.len() != STATE_NONCE_LEN {
            return Err(invalid());
        }
        let raw = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| invalid())?;
        let user_id = String::from_utf8(raw).map_err(|_| invalid())?;
        if user_id.trim().is_empty() {
            return Err(invalid());
        }
        Ok(user_id)
    }
}

/// Per-operator OAuth credentials.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn store(&self, user_id: &str, tokens: &OAuthTokens) -> Result<()>;

    async fn load(&self, user_id: &str) -> Result<Option<OAuthTokens>>;
}

/// Postgres token storage, sealed with AES-256-GCM.
#[derive(Clone)]
pub struct TokenVault {
    pool: PgPool,
    cipher: TokenCipher,
}

impl TokenVault {
    pub fn new(pool: PgPool, cipher: TokenCipher) -> Self {
        Self { pool, cipher }
    }
}

#[async_trait]
impl TokenStore for TokenVault {
    async fn store(&self, user_id: &str, tokens: &OAuthTokens) -> Result<()> {
        let sealed = self.cipher.encrypt(&serde_json::to_vec(tokens)?)?;
        sqlx::query(
            r#"
            INSERT INTO calendar_tokens (user_id, ciphertext, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET ciphertext = EXCLUDED.ciphertext, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(sealed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, user_id: &str) -> Result<Option<OAuthTokens>> {
        let sealed: Option<String> =
            sqlx::query_scalar("SELECT ciphertext FROM calendar_tokens WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        match sealed {
            Some(sealed) => {
                let plain = self.cipher.decrypt(&sealed)?;
                Ok(Some(serde_json::from_slice(&plain)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn insert_event(&self, access_token: &str, event: &CalendarEvent) -> Result<CreatedEvent>;
}

/// Google Calendar v3, operator's primary calendar.
#[derive(Clone)]
pub struct GoogleCalendar {
    client: Client,
}

impl GoogleCalendar {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn insert_event(&self, access_token: &str, event: &CalendarEvent) -> Result<CreatedEvent> {
        let res = self
            .client
            .post(GOOGLE_EVENTS_URL)
            .query(&[("conferenceDataVersion", "1")])
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %text, "Google Calendar request failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED => {
                    Error::Unauthorized("Google Calendar rejected the access token".into())
                }
                _ => Error::Delivery(format!("Google Calendar returned {}", status)),
            });
        }

        Ok(res.json().await?)
    }
}

pub fn needs_refresh(tokens: &OAuthTokens, now: DateTime<Utc>) -> bool {
    tokens
        .expires_at
        .is_some_and(|at| at <= now + Duration::seconds(EXPIRY_LEEWAY_SECS))
}

/// A 30 minute interview with the candidate as the only attendee and a
/// Meet link requested.
pub fn interview_event(
    job: &Job,
    interview: &InterviewDetails,
    candidate: &PersistedCandidate,
    email: &str,
) -> CalendarEvent {
    let start = interview.datetime;
    let end = start + Duration::minutes(INTERVIEW_MINUTES);

    CalendarEvent {
        summary: format!("Interview: {} with {}", job.title, candidate.candidate_name),
        description: format!(
            "Interview for the {} position with {}.",
            job.title, interview.interviewer_name
        ),
        start: EventTime {
            date_time: start.to_rfc3339(),
            time_zone: "UTC".into(),
        },
        end: EventTime {
            date_time: end.to_rfc3339(),
            time_zone: "UTC".into(),
        },
        attendees: vec![Attendee {
            email: email.to_string(),
        }],
        conference_data: ConferenceData {
            create_request: ConferenceRequest {
                request_id: format!("{}-{}", job.id, candidate.id),
                conference_solution_key: ConferenceSolutionKey {
                    kind: "hangoutsMeet".into(),
                },
            },
        },
    }
}

/// Books one event per selected candidate, concurrently. Candidates without
/// an address are skipped; each gets its own outcome, in input order.
pub async fn schedule_events(
    api: &dyn CalendarApi,
    access_token: &str,
    job: &Job,
    interview: &InterviewDetails,
    candidates: &[PersistedCandidate],
) -> Vec<EventOutcome> {
    let attempts = candidates.iter().filter(|c| c.selected).map(|candidate| async move {
        let name = candidate.candidate_name.clone();
        let Some(email) = candidate.candidate_email.clone() else {
            return EventOutcome::unscheduled(
                name,
                None,
                EventStatus::Skipped,
                "No email address on file".into(),
            );
        };

        let event = interview_event(job, interview, candidate, &email);
        match api.insert_event(access_token, &event).await {
            Ok(created) => EventOutcome::scheduled(name, email, created),
            Err(e) => {
                tracing::warn!(candidate = %name, error = %e, "Interview event not created");
                EventOutcome::unscheduled(name, Some(email), EventStatus::Failed, e.to_string())
            }
        }
    });

    join_all(attempts).await
}

#[derive(Clone)]
pub struct CalendarService {
    oauth: GoogleOAuth,
    tokens: Arc<dyn TokenStore>,
    api: Arc<dyn CalendarApi>,
    state: OAuthState,
}

impl CalendarService {
    pub fn new(
        oauth: GoogleOAuth,
        tokens: Arc<dyn TokenStore>,
        api: Arc<dyn CalendarApi>,
        state: OAuthState,
    ) -> Self {
        Self {
            oauth,
            tokens,
            api,
            state,
        }
    }

    pub fn authorization_url(&self, user_id: &str) -> Result<String> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation("userId is required".into()));
        }
        self.oauth.auth_url(&self.state.issue(user_id)?)
    }

    /// Completes the consent flow and returns the operator it belongs to.
    pub async fn connect(&self, code: &str, state: &str) -> Result<String> {
        let user_id = self.state.verify(state)?;
        let mut tokens = self.oauth.exchange_code(code).await?;

        // Google omits the refresh token on repeat consent; keep the old one.
        if tokens.refresh_token.is_none() {
            if let Some(previous) = self.tokens.load(&user_id).await? {
                tokens.refresh_token = previous.refresh_token;
            }
        }

        self.tokens.store(&user_id, &tokens).await?;
        tracing::info!(user_id = %user_id, "Calendar connected");
        Ok(user_id)
    }

    /// A usable access token for the operator, refreshed and re-stored when
    /// it is about to expire.
    pub async fn access_token(&self, user_id: &str) -> Result<String> {
        let tokens = self.tokens.load(user_id).await?.ok_or_else(|| {
            Error::Unauthorized("Google Calendar is not connected for this user".into())
        })?;

        if !needs_refresh(&tokens, Utc::now()) {
            return Ok(tokens.access_token);
        }

        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            Error::Unauthorized("Google Calendar access expired, reconnect the calendar".into())
        })?;
        let refreshed = self.oauth.refresh(&refresh_token).await?;
        self.tokens.store(user_id, &refreshed).await?;
        tracing::info!(user_id = %user_id, "Calendar access token refreshed");
        Ok(refreshed.access_token)
    }

    pub async fn schedule_interviews(
        &self,
        access_token: &str,
        job: &Job,
        interview: &InterviewDetails,
        candidates: &[PersistedCandidate],
    ) -> Vec<EventOutcome> {
        schedule_events(self.api.as_ref(), access_token, job, interview, candidates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn oauth() -> GoogleOAuth {
        GoogleOAuth::new(
            Client::new(),
            "client-123.apps.googleusercontent.com".into(),
            "shh".into(),
            "http://localhost:8000/api/auth/google/callback".into(),
        )
    }

    fn job() -> Job {
        Job {
            id: Uuid::new_v4(),
            title: "Backend Engineer".into(),
            job_description: "Go".into(),
            created_at: Utc::now(),
            status: JobStatus::Completed,
        }
    }

    fn interview() -> InterviewDetails {
        InterviewDetails {
            datetime: Utc.with_ymd_and_hms(2025, 3, 14, 15, 30, 0).unwrap(),
            interviewer_name: "Priya Raman".into(),
        }
    }

    fn candidate(name: &str, email: Option<&str>, selected: bool) -> PersistedCandidate {
        PersistedCandidate {
            id: Uuid::new_v4(),
            job_id: Uuid::nil(),
            candidate_index: 0,
            candidate_name: name.into(),
            candidate_email: email.map(str::to_string),
            suitability_score: 0.8,
            summary: "ok".into(),
            created_at: Utc::now(),
            selected,
        }
    }

    fn tokens(expires_at: Option<DateTime<Utc>>) -> OAuthTokens {
        OAuthTokens {
            access_token: "ya29.a".into(),
            refresh_token: Some("1//r".into()),
            expires_at,
            scope: None,
            token_type: Some("Bearer".into()),
        }
    }

    #[test]
    fn auth_url_requests_offline_calendar_access() {
        let url = Url::parse(&oauth().auth_url("abc.def").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["state"], "abc.def");
        assert!(params["scope"].contains("calendar.events"));
        assert_eq!(params["redirect_uri"], "http://localhost:8000/api/auth/google/callback");
        assert!(!url.as_str().contains("shh"));
    }

    #[test]
    fn state_carries_the_user_id() {
        let signer = OAuthState::new("state-key");
        let state = signer.issue("recruiter@example.com").unwrap();
        assert_eq!(signer.verify(&state).unwrap(), "recruiter@example.com");
        assert_ne!(state, signer.issue("recruiter@example.com").unwrap());
    }

    #[test]
    fn tampered_state_is_rejected() {
        let signer = OAuthState::new("state-key");
        assert!(signer.verify("no-dot-here").is_err());
        assert!(signer.verify("short.dXNlcg").is_err());

        let state = signer.issue("victim").unwrap();
        let mut parts = state.split('.');
        let (nonce, _, signature) = (
            parts.next().unwrap(),
            parts.next().unwrap(),
            parts.next().unwrap(),
        );
        let swapped = format!("{}.{}.{}", nonce, URL_SAFE_NO_PAD.encode("attacker"), signature);
        assert!(matches!(signer.verify(&swapped), Err(Error::Validation(_))));
    }

    #[test]
    fn state_from_another_key_is_rejected() {
        let state = OAuthState::new("other-server").issue("recruiter").unwrap();
        assert!(OAuthState::new("state-key").verify(&state).is_err());
    }

    #[test]
    fn tokens_near_expiry_need_refresh() {
        let now = Utc::now();
        assert!(!needs_refresh(&tokens(None), now));
        assert!(!needs_refresh(&tokens(Some(now + Duration::minutes(30))), now));
        assert!(needs_refresh(&tokens(Some(now + Duration::seconds(10))), now));
        assert!(needs_refresh(&tokens(Some(now - Duration::minutes(5))), now));
    }

    #[test]
    fn event_body_matches_calendar_wire_format() {
        let job = job();
        let ana = candidate("Ana Silva", Some("ana@example.com"), true);
        let event = interview_event(&job, &interview(), &ana, "ana@example.com");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["summary"], "Interview: Backend Engineer with Ana Silva");
        assert_eq!(value["start"]["dateTime"], "2025-03-14T15:30:00+00:00");
        assert_eq!(value["end"]["dateTime"], "2025-03-14T16:00:00+00:00");
        assert_eq!(value["start"]["timeZone"], "UTC");
        assert_eq!(value["attendees"][0]["email"], "ana@example.com");
        assert_eq!(value["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"], "hangoutsMeet");
        let request_id = format!("{}-{}", job.id, ana.id);
        assert_eq!(value["conferenceData"]["createRequest"]["requestId"], request_id.as_str());
        assert!(value["description"].as_str().unwrap().contains("Priya Raman"));
    }

    #[tokio::test]
    async fn each_selected_candidate_gets_an_outcome() {
        let mut api = MockCalendarApi::new();
        api.expect_insert_event()
            .withf(|token, event| token == "ya29.a" && event.attendees[0].email == "ana@example.com")
            .times(1)
            .returning(|_, _| {
                Ok(CreatedEvent {
                    id: "evt-1".into(),
                    html_link: Some("https://calendar.google.com/event?eid=1".into()),
                    hangout_link: Some("https://meet.google.com/abc-defg-hij".into()),
                })
            });
        api.expect_insert_event()
            .withf(|_, event| event.attendees[0].email == "ben@example.com")
            .times(1)
            .returning(|_, _| Err(Error::Delivery("Google Calendar returned 403".into())));

        let candidates = vec![
            candidate("Ana Silva", Some("ana@example.com"), true),
            candidate("Ben Okafor", Some("ben@example.com"), true),
            candidate("Cara Jones", None, true),
            candidate("Dev Patel", Some("dev@example.com"), false),
        ];
        let outcomes = schedule_events(&api, "ya29.a", &job(), &interview(), &candidates).await;

        let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
        assert_eq!(statuses, [EventStatus::Scheduled, EventStatus::Failed, EventStatus::Skipped]);
        assert_eq!(outcomes[0].event_id.as_deref(), Some("evt-1"));
        assert_eq!(outcomes[0].meet_link.as_deref(), Some("https://meet.google.com/abc-defg-hij"));
        assert!(outcomes[1].error.as_deref().unwrap().contains("403"));
        assert_eq!(outcomes[2].candidate_email, None);
    }
}
