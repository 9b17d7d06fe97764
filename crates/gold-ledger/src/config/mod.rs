use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::loans::domain::{AccountBucket, LoanStatus};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub lending: LendingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            lending: LendingConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Business dials for the loan engine that product owners may change without a release.
#[derive(Debug, Clone, PartialEq)]
pub struct LendingConfig {
    /// Status assigned to fresh submissions. Production has historically auto-approved.
    pub initial_status: LoanStatus,
    pub loan_code_prefix: String,
    /// Bucket offered to outsource partners; `None` offers every bucket.
    pub outsourcing_account: Option<AccountBucket>,
    pub dashboard_cache_ttl: Duration,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            initial_status: LoanStatus::Approved,
            loan_code_prefix: "GL".to_string(),
            outsourcing_account: Some(AccountBucket::Secondary),
            dashboard_cache_ttl: Duration::from_secs(60),
        }
    }
}

impl LendingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let initial_status = match env::var("LOAN_INITIAL_STATUS") {
            Ok(raw) => parse_initial_status(&raw)?,
            Err(_) => defaults.initial_status,
        };

        let loan_code_prefix = match env::var("LOAN_CODE_PREFIX") {
            Ok(raw) => {
                let prefix = raw.trim().to_ascii_uppercase();
                if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(ConfigError::InvalidCodePrefix(raw));
                }
                prefix
            }
            Err(_) => defaults.loan_code_prefix,
        };

        let outsourcing_account = match env::var("OUTSOURCE_ACCOUNT") {
            Ok(raw) if raw.trim().eq_ignore_ascii_case("any") => None,
            Ok(raw) => Some(
                AccountBucket::parse(&raw).ok_or_else(|| ConfigError::InvalidAccount(raw.clone()))?,
            ),
            Err(_) => defaults.outsourcing_account,
        };

        let dashboard_cache_ttl = match env::var("DASHBOARD_CACHE_TTL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidCacheTtl(raw))?,
            Err(_) => defaults.dashboard_cache_ttl,
        };

        Ok(Self {
            initial_status,
            loan_code_prefix,
            outsourcing_account,
            dashboard_cache_ttl,
        })
    }
}

fn parse_initial_status(raw: &str) -> Result<LoanStatus, ConfigError> {
    match LoanStatus::parse(raw) {
        Some(status @ (LoanStatus::Pending | LoanStatus::UnderReview | LoanStatus::Approved)) => {
            Ok(status)
        }
        _ => Err(ConfigError::InvalidInitialStatus(raw.to_string())),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidInitialStatus(String),
    InvalidCodePrefix(String),
    InvalidAccount(String),
    InvalidCacheTtl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidInitialStatus(value) => write!(
                f,
                "LOAN_INITIAL_STATUS must be pending, under_review or approved (found '{value}')"
            ),
            ConfigError::InvalidCodePrefix(value) => {
                write!(f, "LOAN_CODE_PREFIX must be ASCII letters (found '{value}')")
            }
            ConfigError::InvalidAccount(value) => write!(
                f,
                "OUTSOURCE_ACCOUNT must be primary, secondary, reserve or any (found '{value}')"
            ),
            ConfigError::InvalidCacheTtl(value) => write!(
                f,
                "DASHBOARD_CACHE_TTL_SECS must be a whole number of seconds (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
