use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Google OAuth credentials for one operator. Stored encrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// Raw response of the Google token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl TokenEndpointResponse {
    pub fn into_tokens(self, issued_at: DateTime<Utc>) -> OAuthTokens {
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|secs| issued_at + chrono::Duration::seconds(secs)),
            scope: self.scope,
            token_type: self.token_type,
        }
    }
}
