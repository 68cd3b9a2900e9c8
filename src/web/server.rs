use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;

use super::api::{
    add_poem, get_status, health_check, list_collections, reindex_dataset, submit_job, AppState,
};

/// Build the HTTP routes for the ingestion service and its reindex trigger
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/jobs", post(submit_job))
        .route("/poem", post(add_poem))
        .route("/collections", get(list_collections))
        .route("/reindex", post(reindex_dataset))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown_rx` flips to `true`
pub async fn run_server(
    state: AppState,
    web_config: WebConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&web_config.listen).await?;
    tracing::info!("Web server listening on {}", web_config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            tracing::info!("Web server shutting down gracefully");
        })
        .await
}
