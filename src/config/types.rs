use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub reindex: ReindexConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// DuckDB database file, or `:memory:`
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("~/.local/share/poetry/poems.duckdb")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_ingest_workers")]
    pub workers: usize,
    #[serde(default = "default_write_timeout", with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_ingest_capacity(),
            workers: default_ingest_workers(),
            write_timeout: default_write_timeout(),
        }
    }
}

fn default_ingest_capacity() -> usize {
    10
}

fn default_ingest_workers() -> usize {
    3
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReindexConfig {
    /// A batch is sealed once its body grows past this many bytes
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold_bytes: usize,
    #[serde(default = "default_reindex_workers")]
    pub workers: usize,
    /// Defaults to the worker count when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    #[serde(default = "default_write_timeout", with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            batch_threshold_bytes: default_batch_threshold(),
            workers: default_reindex_workers(),
            queue_capacity: None,
            write_timeout: default_write_timeout(),
        }
    }
}

fn default_batch_threshold() -> usize {
    10 * 1024
}

fn default_reindex_workers() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8081".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_client_url")]
    pub url: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// `POST /reindex` answers only when the whole run is over
    #[serde(default = "default_reindex_timeout", with = "humantime_serde")]
    pub reindex_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_client_url(),
            timeout: default_request_timeout(),
            reindex_timeout: default_reindex_timeout(),
        }
    }
}

fn default_client_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_reindex_timeout() -> Duration {
    Duration::from_secs(3600)
}
