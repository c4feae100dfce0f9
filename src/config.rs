use crate::jobs::PollPolicy;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Service used when `NEWS_ANALYZER_URL` is not set.
pub const DEFAULT_SERVICE_URL: &str = "https://news-analyzer-backend-23es.onrender.com";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// [`init_config`] was called more than once.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the pipeline client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the news analyzer service.
    pub service_url: String,
    /// Polling budget for extraction jobs.
    pub extraction: PollPolicy,
    /// Polling budget for analysis jobs.
    pub analysis: PollPolicy,
    /// Upper bound for any single HTTP request; `None` disables the bound.
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let service_url = optional("NEWS_ANALYZER_URL")
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        reqwest::Url::parse(&service_url)
            .map_err(|_| ConfigError::InvalidValue("NEWS_ANALYZER_URL".into()))?;

        let extraction = PollPolicy {
            timeout: millis(&optional, "EXTRACT_TIMEOUT_MS", PollPolicy::EXTRACTION.timeout)?,
            interval: millis(
                &optional,
                "EXTRACT_POLL_INTERVAL_MS",
                PollPolicy::EXTRACTION.interval,
            )?,
        };
        let analysis = PollPolicy {
            timeout: millis(&optional, "ANALYZE_TIMEOUT_MS", PollPolicy::ANALYSIS.timeout)?,
            interval: millis(
                &optional,
                "ANALYZE_POLL_INTERVAL_MS",
                PollPolicy::ANALYSIS.interval,
            )?,
        };
        if extraction.interval.is_zero() {
            return Err(ConfigError::InvalidValue("EXTRACT_POLL_INTERVAL_MS".into()));
        }
        if analysis.interval.is_zero() {
            return Err(ConfigError::InvalidValue("ANALYZE_POLL_INTERVAL_MS".into()));
        }

        let request_timeout_secs = optional("HTTP_REQUEST_TIMEOUT_SECS")
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue("HTTP_REQUEST_TIMEOUT_SECS".into()))
            })
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let request_timeout =
            (request_timeout_secs > 0).then(|| Duration::from_secs(request_timeout_secs));

        Ok(Self {
            service_url,
            extraction,
            analysis,
            request_timeout,
        })
    }
}

fn millis<F>(optional: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    install(Config::from_env()?)
}

/// Install an already-built configuration in the global cache.
pub fn install(config: Config) -> Result<&'static Config, ConfigError> {
    tracing::debug!(
        service_url = %config.service_url,
        extraction = ?config.extraction,
        analysis = ?config.analysis,
        request_timeout = ?config.request_timeout,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    Ok(get_config())
}
