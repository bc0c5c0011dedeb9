use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::{FixedOffset, Offset, Utc};

use crate::agent::parse_utc_offset;

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
    pub storage: StorageConfig,
    pub follow_ups: FollowUpConfig,
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
            storage: StorageConfig::from_env()?,
            follow_ups: FollowUpConfig::from_env()?,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where follow-ups are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres(PostgresConfig),
    /// Process-local store; `customers` are registered at startup so creates can resolve them.
    InMemory { customers: Vec<String> },
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        match env::var("APP_DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => {
                let max_connections =
                    parse_number("APP_DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
                Ok(Self::Postgres(PostgresConfig {
                    url: url.trim().to_string(),
                    max_connections,
                }))
            }
            _ => {
                let customers = env::var("APP_MEMORY_CUSTOMERS")
                    .unwrap_or_default()
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok(Self::InMemory { customers })
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
}

// Connection strings carry credentials.
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Tunables for the follow-up engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpConfig {
    pub default_limit: u32,
    pub max_limit: u32,
    /// Offset used for agents that do not report their own timezone.
    pub default_utc_offset: FixedOffset,
    /// Reject transitions out of `completed`/`cancelled` instead of re-applying them.
    pub strict_transitions: bool,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
            default_utc_offset: Utc.fix(),
            strict_transitions: true,
        }
    }
}

impl FollowUpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let default_limit = parse_number("APP_FOLLOW_UP_DEFAULT_LIMIT", defaults.default_limit)?;
        let max_limit = parse_number("APP_FOLLOW_UP_MAX_LIMIT", defaults.max_limit)?;
        if default_limit == 0 || max_limit == 0 || default_limit > max_limit {
            return Err(ConfigError::InvalidPageLimits {
                default_limit,
                max_limit,
            });
        }

        let default_utc_offset = match env::var("APP_DEFAULT_UTC_OFFSET") {
            Ok(raw) => parse_utc_offset(&raw).ok_or(ConfigError::InvalidUtcOffset { value: raw })?,
            Err(_) => defaults.default_utc_offset,
        };

        let strict_transitions = match env::var("APP_FOLLOW_UP_STRICT_TRANSITIONS") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "APP_FOLLOW_UP_STRICT_TRANSITIONS",
                value: raw,
            })?,
            Err(_) => defaults.strict_transitions,
        };

        Ok(Self {
            default_limit,
            max_limit,
            default_utc_offset,
            strict_transitions,
        })
    }
}

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;

fn parse_number(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFlag { key: &'static str, value: String },
    InvalidUtcOffset { value: String },
    InvalidPageLimits { default_limit: u32, max_limit: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false, got '{value}'")
            }
            ConfigError::InvalidUtcOffset { value } => {
                write!(f, "APP_DEFAULT_UTC_OFFSET must look like +05:30 or Z, got '{value}'")
            }
            ConfigError::InvalidPageLimits {
                default_limit,
                max_limit,
            } => write!(
                f,
                "page limits must satisfy 0 < default ({default_limit}) <= max ({max_limit})"
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
