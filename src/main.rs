use axum::extract::DefaultBodyLimit;
use resumerank_backend::{
    config::Config, database::pool::create_pool, middleware::cors::frontend_cors, routes,
    services::job_service::PgJobStore, AppState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Arc::new(Config::from_env()?);

    let pool = create_pool(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let interrupted = PgJobStore::fail_interrupted(&pool).await?;
    if interrupted > 0 {
        tracing::warn!(jobs = interrupted, "Marked interrupted jobs as failed");
    }

    let app_state = AppState::new(config.clone(), pool.clone())?;

    let app = routes::router(app_state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(frontend_cors(&config.frontend_url)?)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.server_address.as_str()).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
