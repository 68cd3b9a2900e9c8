use super::RunError;
use crate::client::WorkerClient;
use crate::config::Config;
use crate::reindex::{PipelineRun, ReindexOptions, Reindexer};
use crate::search::{ElasticsearchSink, SearchSink};
use crate::store::{DocumentStore, DuckDbStore};
use crate::web::api::ReindexRequest;
use std::sync::Arc;
use tracing::info;

/// Republish one dataset into a search index and print the run summary.
///
/// A running `poetry serve` holds the store file, so the run is handed to it
/// over HTTP. The file is opened here only when no service answers.
pub async fn reindex(
    config: Config,
    dataset: &str,
    index: &str,
    workers: Option<usize>,
) -> Result<PipelineRun, RunError> {
    if workers == Some(0) {
        return Err(RunError::Input("--workers must be at least 1".to_string()));
    }

    let client = WorkerClient::new(&config.client)?;
    let run = match client.health().await {
        Ok(_) => {
            info!(
                dataset = %dataset,
                index = %index,
                service = %client.base_url(),
                "Reindexing through the running service"
            );
            let request = ReindexRequest {
                dataset: dataset.to_string(),
                index: index.to_string(),
                workers,
            };
            client.reindex(&request).await?
        }
        Err(e) if e.is_unreachable() => {
            info!(service = %client.base_url(), "No service running, opening the store directly");
            reindex_local(&config, dataset, index, workers).await?
        }
        Err(e) => return Err(e.into()),
    };

    let summary = serde_json::to_string_pretty(&run)
        .map_err(|e| RunError::Input(format!("failed to render run summary: {}", e)))?;
    println!("{}", summary);
    Ok(run)
}

async fn reindex_local(
    config: &Config,
    dataset: &str,
    index: &str,
    workers: Option<usize>,
) -> Result<PipelineRun, RunError> {
    let mut options = ReindexOptions::from(&config.reindex);
    if let Some(workers) = workers {
        options = options.with_workers(workers);
    }

    let store: Arc<dyn DocumentStore> = Arc::new(DuckDbStore::open(&config.store.path)?);
    store.init_schema().await?;
    let sink: Arc<dyn SearchSink> = Arc::new(ElasticsearchSink::new(&config.search)?);

    info!(
        dataset = %dataset,
        index = %index,
        search_url = %config.search.url,
        workers = options.workers,
        "Reindexing dataset"
    );
    Ok(Reindexer::new(store, sink, options).run(dataset, index).await?)
}
