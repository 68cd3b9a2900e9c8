use super::RunError;
use crate::client::WorkerClient;
use crate::config::Config;
use crate::record::{Poem, PoemRequest};
use std::path::Path;
use tracing::{info, warn};

/// Read a JSON array of poems and submit them as one job
pub async fn submit(config: Config, file: &Path) -> Result<(), RunError> {
    let contents = std::fs::read_to_string(file).map_err(|e| {
        RunError::Input(format!("failed to read '{}': {}", file.display(), e))
    })?;
    let poems = parse_poems(&contents)?;

    let client = WorkerClient::new(&config.client)?;
    info!(url = %client.base_url(), poems = poems.len(), "Submitting job");

    match client.submit_job(&poems).await {
        Ok(accepted) => {
            println!(
                "{} ({} poems, queue size {})",
                accepted.message, accepted.poem_count, accepted.queue_size
            );
            Ok(())
        }
        Err(e) => {
            if e.is_backpressure() {
                warn!("Ingestion queue is full, try again later");
            }
            Err(e.into())
        }
    }
}

/// Parse and validate a JSON array of poem requests
pub fn parse_poems(contents: &str) -> Result<Vec<Poem>, RunError> {
    let requests: Vec<PoemRequest> = serde_json::from_str(contents)
        .map_err(|e| RunError::Input(format!("invalid JSON: {}", e)))?;

    requests
        .into_iter()
        .enumerate()
        .map(|(i, request)| {
            request
                .into_poem()
                .map_err(|e| RunError::Input(format!("poem #{}: {}", i, e)))
        })
        .collect()
}
