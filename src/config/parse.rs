use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate a YAML config document
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    let mut config: Config = if yaml.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml)?
    };

    config.store.path = expand_tilde(&config.store.path);

    validate_config(&config)?;
    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded: Vec<&str> = env_var_pattern()
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .collect();

    if unexpanded.is_empty() {
        return Ok(());
    }

    unexpanded.sort_unstable();
    unexpanded.dedup();

    let error_msg = if unexpanded.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them before starting, or replace them in the config file with actual values",
            unexpanded.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.store.path.as_os_str().is_empty() {
        errors.push("store.path cannot be empty".to_string());
    }

    if config.search.url.trim().is_empty() {
        errors.push("search.url cannot be empty".to_string());
    }
    check_timeout("search.request_timeout", config.search.request_timeout, &mut errors);

    check_at_least_one("ingest.queue_capacity", config.ingest.queue_capacity, &mut errors);
    check_at_least_one("ingest.workers", config.ingest.workers, &mut errors);
    check_timeout("ingest.write_timeout", config.ingest.write_timeout, &mut errors);

    check_at_least_one(
        "reindex.batch_threshold_bytes",
        config.reindex.batch_threshold_bytes,
        &mut errors,
    );
    check_at_least_one("reindex.workers", config.reindex.workers, &mut errors);
    if let Some(capacity) = config.reindex.queue_capacity {
        check_at_least_one("reindex.queue_capacity", capacity, &mut errors);
    }
    check_timeout("reindex.write_timeout", config.reindex.write_timeout, &mut errors);

    if config.web.listen.parse::<SocketAddr>().is_err() {
        errors.push(format!(
            "web.listen: '{}' is not a valid socket address (expected e.g. 0.0.0.0:8081)",
            config.web.listen
        ));
    }

    if config.client.url.trim().is_empty() {
        errors.push("client.url cannot be empty".to_string());
    }
    check_timeout("client.timeout", config.client.timeout, &mut errors);
    check_timeout("client.reindex_timeout", config.client.reindex_timeout, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn check_at_least_one(field: &str, value: usize, errors: &mut Vec<String>) {
    if value == 0 {
        errors.push(format!("{} must be at least 1", field));
    }
}

fn check_timeout(field: &str, value: std::time::Duration, errors: &mut Vec<String>) {
    if value.is_zero() {
        errors.push(format!("{} must be greater than zero", field));
    }
}
