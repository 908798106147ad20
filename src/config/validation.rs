use crate::config::types::{Config, CrawlerConfig, FetchConfig, PipelineConfig, RateLimitConfig, RateLimitMode};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_pipeline_config(&config.pipeline)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    if config.max_page_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_page_bytes must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates rate limit configuration
///
/// Only the fields used by the selected mode are checked.
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    match config.mode {
        RateLimitMode::Random if config.min_delay_secs > config.max_delay_secs => {
            Err(ConfigError::Validation(format!(
                "min_delay_secs ({}) must not exceed max_delay_secs ({})",
                config.min_delay_secs, config.max_delay_secs
            )))
        }
        RateLimitMode::PerMinute if config.requests_per_minute == 0 => Err(
            ConfigError::Validation("requests_per_minute must be >= 1".to_string()),
        ),
        RateLimitMode::Minutes if config.minutes == 0 => Err(ConfigError::Validation(
            "minutes must be >= 1".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validates pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.epochs == 0 {
        return Err(ConfigError::Validation("epochs must be >= 1".to_string()));
    }

    if config.vocab_size == 0 {
        return Err(ConfigError::Validation(
            "vocab_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}
