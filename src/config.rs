//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_UPSTREAM_URL: &str = "http://localhost:8000";
    pub const DEV_HOST: &str = "127.0.0.1";
    pub const DEV_PORT: u16 = 8080;
    pub const DEV_REPO: &str = "autoland";
    pub const DEV_PUSH_COUNT: usize = 10;
    pub const DEV_MAX_PUSH_COUNT: usize = 100;
    pub const DEV_POLL_INTERVAL_SECS: u64 = 60;
    pub const DEV_HTTP_TIMEOUT_SECS: u64 = 30;
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Base URL of the upstream CI results service
    pub upstream_url: String,
    /// Repository the board follows
    pub repo: String,
    /// Pushes fetched per page
    pub push_count: usize,
    /// Pushes fetched when the range is bounded by `fromchange`
    pub max_push_count: usize,
    /// Seconds between poll cycles
    pub poll_interval_secs: u64,
    /// Upstream HTTP timeout in seconds
    pub http_timeout_secs: u64,
    /// Show every duplicate job instead of collapsing them into counts
    pub duplicate_jobs_visible: bool,
    /// Keep the selected job as its own button inside collapsed groups
    pub keep_selected_expanded: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `PB_HOST`: Server host (default: 127.0.0.1)
    /// - `PB_PORT`: Server port (default: 8080)
    /// - `PB_UPSTREAM_URL`: CI results service base URL (required in production)
    /// - `PB_REPO`: Repository name (default: autoland)
    /// - `PB_PUSH_COUNT`: Pushes per page (default: 10)
    /// - `PB_MAX_PUSH_COUNT`: Pushes fetched for a bounded range (default: 100)
    /// - `PB_POLL_INTERVAL_SECS`: Poll interval (default: 60)
    /// - `PB_HTTP_TIMEOUT_SECS`: Upstream request timeout (default: 30)
    /// - `PB_DUPLICATE_JOBS_VISIBLE`: Show duplicate jobs (default: false)
    /// - `PB_KEEP_SELECTED_EXPANDED`: Keep the selected job out of group counts (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        let host = env::var("PB_HOST").unwrap_or_else(|_| defaults::DEV_HOST.to_string());
        let port = parse_var(
            "PB_PORT",
            defaults::DEV_PORT,
            "PB_PORT must be a valid port number",
        )?;
        let upstream_url = env::var("PB_UPSTREAM_URL")
            .unwrap_or_else(|_| defaults::DEV_UPSTREAM_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let repo = env::var("PB_REPO").unwrap_or_else(|_| defaults::DEV_REPO.to_string());

        let push_count = parse_var(
            "PB_PUSH_COUNT",
            defaults::DEV_PUSH_COUNT,
            "PB_PUSH_COUNT must be a valid number",
        )?;
        let max_push_count = parse_var(
            "PB_MAX_PUSH_COUNT",
            defaults::DEV_MAX_PUSH_COUNT,
            "PB_MAX_PUSH_COUNT must be a valid number",
        )?;
        let poll_interval_secs = parse_var(
            "PB_POLL_INTERVAL_SECS",
            defaults::DEV_POLL_INTERVAL_SECS,
            "PB_POLL_INTERVAL_SECS must be a valid number",
        )?;
        let http_timeout_secs = parse_var(
            "PB_HTTP_TIMEOUT_SECS",
            defaults::DEV_HTTP_TIMEOUT_SECS,
            "PB_HTTP_TIMEOUT_SECS must be a valid number",
        )?;
        let duplicate_jobs_visible = parse_var(
            "PB_DUPLICATE_JOBS_VISIBLE",
            false,
            "PB_DUPLICATE_JOBS_VISIBLE must be 'true' or 'false'",
        )?;
        let keep_selected_expanded = parse_var(
            "PB_KEEP_SELECTED_EXPANDED",
            true,
            "PB_KEEP_SELECTED_EXPANDED must be 'true' or 'false'",
        )?;

        let config = Config {
            environment,
            host,
            port,
            upstream_url,
            repo,
            push_count,
            max_push_count,
            poll_interval_secs,
            http_timeout_secs,
            duplicate_jobs_visible,
            keep_selected_expanded,
        };

        config.validate()?;
        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Reject values that would stall the board.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.push_count == 0 {
            return Err(ConfigError::InvalidValue("PB_PUSH_COUNT must be at least 1"));
        }
        if self.max_push_count < self.push_count {
            return Err(ConfigError::InvalidValue(
                "PB_MAX_PUSH_COUNT must not be smaller than PB_PUSH_COUNT",
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PB_POLL_INTERVAL_SECS must be at least 1",
            ));
        }
        Ok(())
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.upstream_url == defaults::DEV_UPSTREAM_URL {
            errors.push(format!(
                "PB_UPSTREAM_URL is using development default '{}'. Set the production results service URL.",
                defaults::DEV_UPSTREAM_URL
            ));
        }

        if !self.upstream_url.starts_with("https://") {
            errors.push("PB_UPSTREAM_URL must use https in production.".to_string());
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    default: T,
    message: &'static str,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(message)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}
