pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# POETRY CONFIGURATION
# =============================================================================
# Configures the poem store, the search engine that reindex runs publish to,
# the ingestion worker pool and the HTTP API.
#
# Every section is optional; omitted values fall back to the defaults shown.
# Values may reference environment variables with $env{NAME}.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/poetry/config.yml
#   3. /etc/poetry/config.yml

# =============================================================================
# STORE
# =============================================================================
# DuckDB database holding every ingested poem. Use ':memory:' for a throwaway
# store that lives only as long as the process.

store:
  path: ~/.local/share/poetry/poems.duckdb

# =============================================================================
# SEARCH
# =============================================================================
# Elasticsearch (or OpenSearch) endpoint used by `poetry reindex`.

search:
  url: http://localhost:9200
  request_timeout: 30s

# =============================================================================
# INGEST
# =============================================================================
# Jobs submitted over HTTP wait in a bounded queue until a worker persists
# them. A full queue rejects new jobs with 503 instead of buffering them.

ingest:
  queue_capacity: 10
  workers: 3
  # Upper bound for persisting a single job
  write_timeout: 10s

# =============================================================================
# REINDEX
# =============================================================================
# Poems are streamed from the store, packed into bulk requests and written by
# a pool of workers. A bulk request is sealed once it grows past
# batch_threshold_bytes.

reindex:
  batch_threshold_bytes: 10240
  workers: 4
  # Sealed batches waiting for a worker; defaults to the worker count
  # queue_capacity: 4
  write_timeout: 10s

# =============================================================================
# WEB
# =============================================================================

web:
  listen: 0.0.0.0:8081

# =============================================================================
# CLIENT
# =============================================================================
# Where `poetry submit` sends jobs. `poetry reindex` also goes through this
# server when it is up, since the running service holds the store file lock.

client:
  url: http://localhost:8081
  timeout: 30s
  reindex_timeout: 1h
"#
    .to_string()
}
