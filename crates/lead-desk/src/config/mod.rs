use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;

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
    pub leads: LeadWorkflowConfig,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let defaults = LeadWorkflowConfig::default();
        let lease_ttl = lease_ttl_from_secs(
            "LEAD_LEASE_TTL_SECS",
            positive_var("LEAD_LEASE_TTL_SECS", DEFAULT_LEASE_TTL_SECS)?,
        )?;
        let leads = LeadWorkflowConfig {
            lease_ttl,
            candidate_window: positive_var(
                "LEAD_QUEUE_CANDIDATE_WINDOW",
                defaults.candidate_window,
            )?,
            import_max_rows: positive_var("LEAD_IMPORT_MAX_ROWS", defaults.import_max_rows)?,
            import_chunk_size: positive_var("LEAD_IMPORT_CHUNK_SIZE", defaults.import_chunk_size)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            leads,
        })
    }
}

/// Longest lease a deployment may configure.
pub const MAX_LEASE_TTL_SECS: u64 = 24 * 60 * 60;

const DEFAULT_LEASE_TTL_SECS: u64 = 15 * 60;

pub fn lease_ttl_from_secs(variable: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    let out_of_range = ConfigError::OutOfRange {
        variable,
        max: MAX_LEASE_TTL_SECS,
    };
    if secs > MAX_LEASE_TTL_SECS {
        return Err(out_of_range);
    }

    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or(out_of_range)
}

fn positive_var<T>(variable: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Ok(raw) = env::var(variable) else {
        return Ok(default);
    };

    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber {
            variable,
            value: raw.clone(),
        })?;

    if value <= T::default() {
        return Err(ConfigError::NonPositive { variable });
    }

    Ok(value)
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Output shape of the fmt subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Dials for lease expiry, queue selection, and batch import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadWorkflowConfig {
    /// How long a checkout stays exclusive before another agent may reclaim it.
    pub lease_ttl: Duration,
    /// Ordered candidates tried by `next_lead` before reporting an empty queue.
    pub candidate_window: usize,
    pub import_max_rows: usize,
    pub import_chunk_size: usize,
}

impl Default for LeadWorkflowConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::seconds(DEFAULT_LEASE_TTL_SECS as i64),
            candidate_window: 5,
            import_max_rows: 5000,
            import_chunk_size: 250,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    NonPositive { variable: &'static str },
    OutOfRange { variable: &'static str, max: u64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a whole number (found '{value}')")
            }
            ConfigError::NonPositive { variable } => {
                write!(f, "{variable} must be greater than zero")
            }
            ConfigError::OutOfRange { variable, max } => {
                write!(f, "{variable} must be at most {max}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::NonPositive { .. }
            | ConfigError::OutOfRange { .. } => None,
        }
    }
}
