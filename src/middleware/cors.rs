use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::error::{Error, Result};

/// CORS for the dashboard origin only.
pub fn frontend_cors(frontend_url: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))
        .map_err(|_| Error::Config(format!("FRONTEND_URL is not a valid origin: {}", frontend_url)))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_origins_with_control_characters() {
        assert!(frontend_cors("http://localhost:9002/").is_ok());
        assert!(matches!(frontend_cors("http://bad\norigin"), Err(Error::Config(_))));
    }
}
