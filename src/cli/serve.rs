use super::{shutdown_signal, RunError};
use crate::config::Config;
use crate::ingest::IngestService;
use crate::reindex::ReindexOptions;
use crate::search::{ElasticsearchSink, SearchSink};
use crate::store::{DocumentStore, DuckDbStore};
use crate::web::{run_server, AppState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Run the ingestion service until Ctrl+C or SIGTERM
pub async fn serve(config: Config) -> Result<(), RunError> {
    info!(path = %config.store.path.display(), "Opening poem store");
    let store: Arc<dyn DocumentStore> = Arc::new(DuckDbStore::open(&config.store.path)?);
    store.init_schema().await?;

    let search: Arc<dyn SearchSink> = Arc::new(ElasticsearchSink::new(&config.search)?);

    let ingest = Arc::new(IngestService::new(Arc::clone(&store), &config.ingest));
    ingest.start()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        ingest: Arc::clone(&ingest),
        store,
        search,
        reindex: ReindexOptions::from(&config.reindex),
    };

    let mut server = tokio::spawn(run_server(state, config.web.clone(), shutdown_rx));
    info!("Ingestion service started, press Ctrl+C to shutdown");

    let early_exit = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            None
        }
        result = &mut server => Some(result),
    };

    let server_result = match early_exit {
        Some(result) => result,
        None => {
            let _ = shutdown_tx.send(true);
            server.await
        }
    };

    let report = ingest.shutdown().await;
    if report.abandoned > 0 {
        warn!(
            abandoned = report.abandoned,
            "Jobs were still queued at shutdown and have been dropped"
        );
    }
    info!(
        completed = report.completed,
        failed = report.failed,
        "Ingestion service stopped"
    );

    match server_result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(error = %e, "Web server error");
            Err(RunError::WebServer(e.to_string()))
        }
        Err(e) => Err(RunError::WebServer(format!("server task failed: {}", e))),
    }
}
