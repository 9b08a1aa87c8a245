use crate::config::types::{
    Config, CrawlerConfig, DatabaseConfig, SeedConfig, SourceConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Upper bound on the worker pool; the pool is meant to stay small
const MAX_WORKERS: u32 = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_database_config(&config.database)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates storage configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }

    validate_table_name(&config.documents_table)?;
    validate_table_name(&config.queue_table)?;

    if config.documents_table == config.queue_table {
        return Err(ConfigError::Validation(format!(
            "documents-table and queue-table must differ, both are '{}'",
            config.queue_table
        )));
    }

    Ok(())
}

/// Table names are interpolated into SQL, so only plain identifiers pass
fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "table name must be a plain SQL identifier, got '{}'",
            name
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "timeout-seconds must be >= 1".to_string(),
        ));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max-retries must be >= 1".to_string(),
        ));
    }

    if config.lease_seconds < 1 {
        return Err(ConfigError::Validation(
            "lease-seconds must be >= 1".to_string(),
        ));
    }

    if config.poll_interval_seconds < 1 || config.report_interval_seconds < 1 {
        return Err(ConfigError::Validation(
            "poll-interval-seconds and report-interval-seconds must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates source definitions
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for source in sources {
        if source.name.is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        if source.target < 1 {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have target >= 1",
                source.name
            )));
        }

        if source.allowed_hosts.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must list at least one allowed host",
                source.name
            )));
        }

        for host in &source.allowed_hosts {
            validate_host_pattern(host)?;
        }

        if !source.path_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "path-prefix for source '{}' must start with '/', got '{}'",
                source.name, source.path_prefix
            )));
        }

        validate_http_url(&source.url_base, "url-base")?;

        if let Some(seed) = &source.seed {
            validate_seed(&source.name, seed)?;
        }
    }

    Ok(())
}

/// Validates a seed section
fn validate_seed(source: &str, seed: &SeedConfig) -> Result<(), ConfigError> {
    validate_http_url(&seed.api_url, "api-url")?;

    if seed.categories.is_empty() {
        return Err(ConfigError::Validation(format!(
            "seed for source '{}' must list at least one category",
            source
        )));
    }

    Ok(())
}

fn validate_http_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

/// Validates a host pattern (supports a leading `*.` wildcard)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(host) => validate_host_string(host),
        None => validate_host_string(pattern),
    }
}

/// Validates a host string (without wildcard prefix)
fn validate_host_string(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    if host != host.to_lowercase() {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' must be lowercase",
            host
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
