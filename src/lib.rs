pub mod cli;
pub mod client;
pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod record;
pub mod reindex;
pub mod search;
pub mod store;
pub mod web;
