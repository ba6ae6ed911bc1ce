use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // S3 Storage
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_prefix: String,
    pub storage_timeout: Duration,

    // Natural Language API
    pub language_api_url: String,
    pub language_api_key: Option<String>,
    pub google_access_token: Option<String>,
    pub language_rate_limit_per_min: u32,
    pub http_timeout: Duration,
    pub analyze_comments: bool,

    // Pub/Sub
    pub pubsub_enabled: bool,
    pub pubsub_api_url: String,
    pub gcp_project_id: String,
    pub pubsub_topic: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("PORT", 3000)?,

            // S3 Storage
            s3_bucket: env_or_default("S3_BUCKET", "rube_goldberg_project"),
            s3_region: env_or_default("S3_REGION", "us-east-1"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            s3_prefix: normalize_prefix(&env_or_default("S3_PREFIX", "reddit_data/")),
            storage_timeout: Duration::from_secs(parse_env_u64("STORAGE_TIMEOUT_SECS", 50)?),

            // Natural Language API
            language_api_url: env_or_default("LANGUAGE_API_URL", "https://language.googleapis.com"),
            language_api_key: optional_env("LANGUAGE_API_KEY"),
            google_access_token: optional_env("GOOGLE_ACCESS_TOKEN"),
            language_rate_limit_per_min: parse_env_u32("LANGUAGE_RATE_LIMIT_PER_MIN", 600)?,
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),
            analyze_comments: parse_env_bool("ANALYZE_COMMENTS", false)?,

            // Pub/Sub
            pubsub_enabled: parse_env_bool("PUBSUB_ENABLED", true)?,
            pubsub_api_url: env_or_default("PUBSUB_API_URL", "https://pubsub.googleapis.com"),
            gcp_project_id: env_or_default("GCP_PROJECT_ID", "sada-u-sess-3-firestore"),
            pubsub_topic: env_or_default("PUBSUB_TOPIC", "rube_goldberg"),
        })
    }

    /// Configuration with local defaults and no external credentials.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            s3_bucket: "test-bucket".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_prefix: "reddit_data/".to_string(),
            storage_timeout: Duration::from_secs(5),
            language_api_url: "http://127.0.0.1:9".to_string(),
            language_api_key: None,
            google_access_token: None,
            language_rate_limit_per_min: 60_000,
            http_timeout: Duration::from_secs(5),
            analyze_comments: false,
            pubsub_enabled: false,
            pubsub_api_url: "http://127.0.0.1:9".to_string(),
            gcp_project_id: "test-project".to_string(),
            pubsub_topic: "test-topic".to_string(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.s3_bucket.is_empty() {
            return Err(invalid("S3_BUCKET", "cannot be empty"));
        }
        if self.storage_timeout.is_zero() {
            return Err(invalid("STORAGE_TIMEOUT_SECS", "must be at least 1"));
        }
        if self.http_timeout.is_zero() {
            return Err(invalid("HTTP_TIMEOUT_SECS", "must be at least 1"));
        }
        if self.language_rate_limit_per_min == 0 {
            return Err(invalid("LANGUAGE_RATE_LIMIT_PER_MIN", "must be at least 1"));
        }
        validate_url("LANGUAGE_API_URL", &self.language_api_url)?;
        if let Some(ref endpoint) = self.s3_endpoint {
            validate_url("S3_ENDPOINT", endpoint)?;
        }
        if self.pubsub_enabled {
            validate_url("PUBSUB_API_URL", &self.pubsub_api_url)?;
            if self.gcp_project_id.is_empty() {
                return Err(invalid("GCP_PROJECT_ID", "cannot be empty"));
            }
            if self.pubsub_topic.is_empty() {
                return Err(invalid("PUBSUB_TOPIC", "cannot be empty"));
            }
        }
        Ok(())
    }
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn validate_url(name: &str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(|_| ()).map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("not a valid URL '{value}': {e}"),
    })
}

/// Prefixes are joined directly onto filenames, so keep exactly one trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
