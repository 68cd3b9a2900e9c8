use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ingest::{IngestError, IngestService};
use crate::record::{Poem, PoemRequest};
use crate::reindex::{PipelineRun, ReindexError, ReindexOptions, Reindexer};
use crate::search::SearchSink;
use crate::store::DocumentStore;

/// Shared handles for the handlers.
///
/// Reindex runs borrow the same store as ingestion, so they work while the
/// service holds the database file.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub store: Arc<dyn DocumentStore>,
    pub search: Arc<dyn SearchSink>,
    pub reindex: ReindexOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub queue_size: usize,
    pub capacity: usize,
    /// Unix seconds
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobAccepted {
    pub message: String,
    pub poem_count: usize,
    pub queue_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionsResponse {
    pub datasets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexRequest {
    pub dataset: String,
    pub index: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.ingest.status();
    Json(StatusResponse {
        queue_size: status.queue_depth,
        capacity: status.capacity,
        timestamp: status.timestamp.timestamp(),
    })
}

/// POST /jobs
///
/// Body is a JSON array of poems. Answers 202 once the job is queued, 503 if
/// the queue is full.
pub async fn submit_job(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Poem>>, JsonRejection>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let Json(poems) = payload.map_err(invalid_json)?;

    let admission = state.ingest.submit(poems)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            message: "Job accepted".to_string(),
            poem_count: admission.poem_count,
            queue_size: admission.queue_depth,
        }),
    ))
}

/// POST /poem
pub async fn add_poem(
    State(state): State<AppState>,
    payload: Result<Json<PoemRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(invalid_json)?;
    let poem = request
        .into_poem()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let id = state
        .store
        .insert_one(&poem)
        .await
        .map_err(|e| ApiError::InternalError(format!("failed to store poem: {}", e)))?;
    tracing::debug!(id = %id, title = %poem.title, "Poem added");

    Ok(Json(MessageResponse {
        message: "Poem added successfully".to_string(),
    }))
}

/// GET /collections
pub async fn list_collections(
    State(state): State<AppState>,
) -> Result<Json<CollectionsResponse>, ApiError> {
    let datasets = state
        .store
        .datasets()
        .await
        .map_err(|e| ApiError::InternalError(format!("failed to list datasets: {}", e)))?;

    Ok(Json(CollectionsResponse { datasets }))
}

/// POST /reindex
///
/// Runs the whole reindex before answering with the run summary.
pub async fn reindex_dataset(
    State(state): State<AppState>,
    payload: Result<Json<ReindexRequest>, JsonRejection>,
) -> Result<Json<PipelineRun>, ApiError> {
    let Json(request) = payload.map_err(invalid_json)?;
    if request.dataset.trim().is_empty() {
        return Err(ApiError::BadRequest("dataset is required".to_string()));
    }
    if request.index.trim().is_empty() {
        return Err(ApiError::BadRequest("index is required".to_string()));
    }

    let mut options = state.reindex.clone();
    if let Some(workers) = request.workers {
        if workers == 0 {
            return Err(ApiError::BadRequest("workers must be at least 1".to_string()));
        }
        options = options.with_workers(workers);
    }

    let run = Reindexer::new(Arc::clone(&state.store), Arc::clone(&state.search), options)
        .run(&request.dataset, &request.index)
        .await?;
    Ok(Json(run))
}

fn invalid_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid JSON: {}", rejection.body_text()))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    ServiceUnavailable(String),
    BadGateway(String),
    InternalError(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::EmptyBatch => ApiError::BadRequest(err.to_string()),
            IngestError::Queue(_) => ApiError::ServiceUnavailable(err.to_string()),
            IngestError::Pool(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<ReindexError> for ApiError {
    fn from(err: ReindexError) -> Self {
        match err {
            ReindexError::Index { .. } | ReindexError::Sink(_) => {
                ApiError::BadGateway(err.to_string())
            }
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
