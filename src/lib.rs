pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    analysis_service::{AnalysisEngine, CandidateAnalyzer, GeminiEngine},
    calendar_service::{CalendarService, GoogleCalendar, GoogleOAuth, OAuthState, TokenVault},
    email_service::{EmailSender, ResendMailer},
    job_events::JobEvents,
    job_service::{JobStore, PgJobStore},
    pipeline::RankingPipeline,
};
use crate::utils::crypto::TokenCipher;
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn JobStore>,
    pub pipeline: RankingPipeline,
    /// `None` when no mail provider is configured.
    pub mailer: Option<Arc<dyn EmailSender>>,
    pub calendar: CalendarService,
}

impl AppState {
    pub fn new(config: Arc<Config>, pool: PgPool) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone(), JobEvents::new()));
        let engine: Arc<dyn AnalysisEngine> = Arc::new(GeminiEngine::new(
            http_client.clone(),
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        ));

        let mailer = match &config.resend_api_key {
            Some(key) => Some(Arc::new(ResendMailer::new(
                http_client.clone(),
                key.clone(),
                config.email_from.clone(),
            )) as Arc<dyn EmailSender>),
            None => {
                tracing::warn!("RESEND_API_KEY not set, email sending is disabled");
                None
            }
        };

        let calendar = CalendarService::new(
            GoogleOAuth::new(
                http_client.clone(),
                config.google_client_id.clone(),
                config.google_client_secret.clone(),
                config.google_redirect_uri.clone(),
            ),
            Arc::new(TokenVault::new(
                pool,
                TokenCipher::from_base64(&config.token_encryption_key)?,
            )),
            Arc::new(GoogleCalendar::new(http_client)),
            OAuthState::new(config.google_client_secret.as_bytes()),
        );

        Ok(Self::from_parts(config, store, engine, mailer, calendar))
    }

    /// Assembles state from already-built collaborators.
    pub fn from_parts(
        config: Arc<Config>,
        store: Arc<dyn JobStore>,
        engine: Arc<dyn AnalysisEngine>,
        mailer: Option<Arc<dyn EmailSender>>,
        calendar: CalendarService,
    ) -> Self {
        let analyzer = CandidateAnalyzer::new(
            engine,
            config.analysis_chunk_size,
            Duration::from_secs(config.analysis_timeout_secs),
        );
        let pipeline = RankingPipeline::new(store.clone(), analyzer);

        Self {
            config,
            store,
            pipeline,
            mailer,
            calendar,
        }
    }
}
