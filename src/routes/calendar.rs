use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Redirect},
};

use crate::{
    dto::calendar_dto::{AuthUrlQuery, AuthUrlResponse, OAuthCallbackQuery},
    error::{Error, Result},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/auth/google",
    params(("userId" = String, Query, description = "Operator the calendar belongs to")),
    responses(
        (status = 200, description = "Google consent URL", body = Json<AuthUrlResponse>),
        (status = 400, description = "Missing userId")
    )
)]
#[axum::debug_handler]
pub async fn google_auth_url(
    State(state): State<AppState>,
    Query(query): Query<AuthUrlQuery>,
) -> Result<impl IntoResponse> {
    let url = state.calendar.authorization_url(&query.user_id)?;
    Ok(Json(AuthUrlResponse { url }))
}

#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "State issued with the consent URL"),
        ("error" = Option<String>, Query, description = "Set when consent was denied")
    ),
    responses(
        (status = 303, description = "Back to the dashboard with the outcome"),
        (status = 400, description = "Missing code or state")
    )
)]
#[axum::debug_handler]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<impl IntoResponse> {
    let frontend = state.config.frontend_url.trim_end_matches('/').to_string();

    if let Some(reason) = query.error {
        tracing::warn!(reason = %reason, "Calendar consent denied");
        return Ok(Redirect::to(&format!("{}?calendar=denied", frontend)));
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(Error::Validation("code and state are required".into()));
    };

    match state.calendar.connect(&code, &oauth_state).await {
        Ok(_) => Ok(Redirect::to(&format!("{}?calendar=connected", frontend))),
        Err(e @ Error::Validation(_)) => Err(e),
        Err(e) => {
            tracing::error!(error = %e, "Calendar connection failed");
            Ok(Redirect::to(&format!("{}?calendar=error", frontend)))
        }
    }
}
