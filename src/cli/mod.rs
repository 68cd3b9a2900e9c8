pub mod config;
pub mod reindex;
pub mod serve;
pub mod submit;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("search sink error: {0}")]
    Sink(#[from] crate::search::SinkError),

    #[error("ingest error: {0}")]
    Ingest(#[from] crate::ingest::IngestError),

    #[error("reindex failed: {0}")]
    Reindex(#[from] crate::reindex::ReindexError),

    #[error("client error: {0}")]
    Client(#[from] crate::client::ClientError),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("web server error: {0}")]
    WebServer(String),
}

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
