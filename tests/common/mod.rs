#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{head, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// Minimal in-process stand-in for the Elasticsearch REST API
#[derive(Default)]
pub struct MockSearch {
    pub indexes: Mutex<HashSet<String>>,
    pub create_calls: Mutex<usize>,
    pub bulk_bodies: Mutex<Vec<(String, String)>>,
    pub content_types: Mutex<Vec<String>>,
    /// Bulk writes to these indexes answer 500
    pub failing_indexes: Mutex<HashSet<String>>,
}

impl MockSearch {
    pub fn bulk_documents(&self) -> Vec<serde_json::Value> {
        self.bulk_bodies
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, body)| {
                body.lines()
                    .skip(1)
                    .step_by(2)
                    .map(|line| serde_json::from_str(line).unwrap())
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

async fn index_exists(
    State(mock): State<Arc<MockSearch>>,
    Path(index): Path<String>,
) -> StatusCode {
    if mock.indexes.lock().unwrap().contains(&index) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_index(
    State(mock): State<Arc<MockSearch>>,
    Path(index): Path<String>,
) -> impl IntoResponse {
    *mock.create_calls.lock().unwrap() += 1;

    if index == "forbidden" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"type": "security_exception", "reason": "no"}, "status": 403})),
        );
    }

    if !mock.indexes.lock().unwrap().insert(index.clone()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {
                    "type": "resource_already_exists_exception",
                    "reason": format!("index [{}] already exists", index),
                },
                "status": 400
            })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({"acknowledged": true, "index": index})),
    )
}

async fn bulk(
    State(mock): State<Arc<MockSearch>>,
    Path(index): Path<String>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        mock.content_types.lock().unwrap().push(content_type.to_string());
    }

    if mock.failing_indexes.lock().unwrap().contains(&index) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"type": "cluster_block_exception"}, "status": 500})),
        );
    }

    mock.bulk_bodies.lock().unwrap().push((index, body));
    (StatusCode::OK, Json(json!({"errors": false, "items": []})))
}

/// Serve the mock on an ephemeral port, returning its base URL
pub async fn spawn_mock_search() -> (String, Arc<MockSearch>) {
    let mock = Arc::new(MockSearch::default());
    let app = Router::new()
        .route("/:index", head(index_exists).put(create_index))
        .route("/:index/_bulk", post(bulk))
        .with_state(Arc::clone(&mock));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), mock)
}
