use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Parses and validates configuration text
///
/// An empty document is valid and yields the defaults.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads and parses a configuration file from the given path
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use pagefeed::config::load_config;
///
/// let config = load_config(Path::new("pagefeed.toml")).unwrap();
/// println!("Data directory: {}", config.crawler.data_dir.display());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&fs::read_to_string(path)?)
}

/// Hex-encoded SHA-256 of configuration text
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Hashes a configuration file so a run can be matched to the settings it used
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(content_hash(&fs::read_to_string(path)?))
}

/// Loads a configuration and hashes the exact text that was parsed
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, content_hash(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{RateLimitMode, DEFAULT_USER_AGENT};
    use crate::crawler::RateLimit;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
data-dir = "./data"
seeds = ["https://example.com/"]
max-pages = 50

[fetch]
timeout-secs = 10

[rate-limit]
mode = "per-minute"
requests-per-minute = 12

[pipeline]
train-threads = 2
epochs = 3

[priority]
depth-penalty = -2.5
seed = 7
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.data_dir, Path::new("./data"));
        assert_eq!(config.crawler.seeds.len(), 1);
        assert_eq!(config.crawler.max_pages, 50);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.max_redirects, 5);
        assert_eq!(config.rate_limit.mode, RateLimitMode::PerMinute);
        assert_eq!(
            config.rate_limit.to_rate_limit(),
            RateLimit::PerMinute { rpm: 12 }
        );
        assert_eq!(config.pipeline.train_threads, 2);
        assert_eq!(config.pipeline.epochs, 3);
        assert_eq!(config.pipeline.vocab_size, 10_000);
        assert_eq!(config.priority.depth_penalty, -2.5);
        assert_eq!(config.priority.uncrawled_bonus, 100.0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();

        assert_eq!(config.crawler.data_dir, Path::new("./crawler_data"));
        assert!(!config.crawler.use_legacy_queue);
        assert_eq!(config.fetch.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(
            config.rate_limit.to_rate_limit(),
            RateLimit::Random { min: 5, max: 15 }
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            parse_config("this is not valid TOML {{{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_rate_limit_mode() {
        let result = parse_config("[rate-limit]\nmode = \"sometimes\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let result = parse_config("[rate-limit]\nmin-delay-secs = 30\nmax-delay-secs = 10\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_hash_matches_file_content() {
        let file = create_temp_config("[crawler]\nmax-pages = 3\n");

        let (config, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(config.crawler.max_pages, 3);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, content_hash("[crawler]\nmax-pages = 4\n"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
