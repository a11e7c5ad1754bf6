use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub analysis_timeout_secs: u64,
    pub analysis_chunk_size: usize,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub token_encryption_key: String,
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:8000"),
            database_url: get_env("DATABASE_URL")?,
            gemini_api_key: get_env("GEMINI_API_KEY")?,
            gemini_model: get_env_or("GEMINI_MODEL", "gemini-1.5-flash"),
            analysis_timeout_secs: get_env_parse_or("ANALYSIS_TIMEOUT_SECS", 180)?,
            analysis_chunk_size: get_env_parse_or("ANALYSIS_CHUNK_SIZE", 10)?,
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from: get_env_or("EMAIL_FROM", "ResumeRank <onboarding@resend.dev>"),
            google_client_id: get_env("GOOGLE_CLIENT_ID")?,
            google_client_secret: get_env("GOOGLE_CLIENT_SECRET")?,
            google_redirect_uri: get_env_or(
                "GOOGLE_REDIRECT_URI",
                "http://localhost:8000/api/auth/google/callback",
            ),
            token_encryption_key: get_env("TOKEN_ENCRYPTION_KEY")?,
            frontend_url: get_env_or("FRONTEND_URL", "http://localhost:9002"),
        };

        if config.analysis_chunk_size == 0 {
            return Err(Error::Config(
                "ANALYSIS_CHUNK_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
