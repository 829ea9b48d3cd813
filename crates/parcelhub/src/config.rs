use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

const DEFAULT_INVITATION_TTL_HOURS: i64 = 24;
const DEFAULT_ARRIVAL_DAYS: i64 = 7;

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
    pub invitations: InvitationSettings,
    pub pre_alerts: PreAlertSettings,
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

        let base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        let ttl_hours = positive_number("INVITATION_TTL_HOURS", DEFAULT_INVITATION_TTL_HOURS)?;
        let arrival_days = positive_number("PRE_ALERT_DEFAULT_ARRIVAL_DAYS", DEFAULT_ARRIVAL_DAYS)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            invitations: InvitationSettings {
                base_url,
                ttl: Duration::hours(ttl_hours),
            },
            pre_alerts: PreAlertSettings {
                default_arrival: Duration::days(arrival_days),
            },
        })
    }
}

fn positive_number(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { key }),
        },
        Err(_) => Ok(default),
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

/// Invitation link base and token lifetime.
#[derive(Debug, Clone)]
pub struct InvitationSettings {
    pub base_url: String,
    pub ttl: Duration,
}

impl InvitationSettings {
    pub fn invitation_link(&self, token: &str) -> String {
        format!("{}/register/company/invite?token={}", self.base_url, token)
    }
}

impl Default for InvitationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            ttl: Duration::hours(DEFAULT_INVITATION_TTL_HOURS),
        }
    }
}

/// Defaults applied when a customer files a pre-alert.
#[derive(Debug, Clone)]
pub struct PreAlertSettings {
    pub default_arrival: Duration,
}

impl Default for PreAlertSettings {
    fn default() -> Self {
        Self {
            default_arrival: Duration::days(DEFAULT_ARRIVAL_DAYS),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBaseUrl(String),
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBaseUrl(value) => {
                write!(f, "APP_BASE_URL must be an http(s) URL, got '{value}'")
            }
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a positive integer"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBaseUrl(_)
            | ConfigError::InvalidNumber { .. } => None,
        }
    }
}
