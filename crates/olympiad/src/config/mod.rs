use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use rand::RngCore;
use tracing::warn;

use crate::identity::BirthDatePolicy;
use crate::workflows::edition::EditionCalendar;

const DEFAULT_EDITION: i32 = 2024;
const DEFAULT_QUOTA_PER_LEVEL: u32 = 10;
const DEFAULT_TOKEN_TTL_SECS: i64 = 600;
const DEFAULT_CONFIRMATION_TTL_SECS: i64 = 3 * 24 * 60 * 60;
const DEFAULT_SESSION_TTL_SECS: i64 = 8 * 60 * 60;
const GENERATED_SECRET_LENGTH: usize = 32;

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
    pub edition: EditionConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
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
            edition: EditionConfig::from_env()?,
            security: SecurityConfig::from_env(environment)?,
            mail: MailConfig::from_env()?,
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

/// Per-edition policy knobs: the running year, seat quota and birth-year window.
#[derive(Debug, Clone)]
pub struct EditionConfig {
    pub year: i32,
    pub quota_per_level: u32,
    pub birth_years: BirthDatePolicy,
    pub calendar: EditionCalendar,
}

impl EditionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let year = parse_var("APP_EDITION", DEFAULT_EDITION)?;
        let quota_per_level = parse_var("APP_QUOTA_PER_LEVEL", DEFAULT_QUOTA_PER_LEVEL)?;
        let defaults = BirthDatePolicy::default();
        let earliest_year = parse_var("APP_BIRTH_YEAR_MIN", defaults.earliest_year)?;
        let latest_year = parse_var("APP_BIRTH_YEAR_MAX", defaults.latest_year)?;
        if earliest_year > latest_year {
            return Err(ConfigError::InvalidValue {
                key: "APP_BIRTH_YEAR_MIN",
            });
        }

        let calendar = EditionCalendar {
            registration_opens: optional_date("APP_REGISTRATION_OPENS")?,
            registration_closes: optional_date("APP_REGISTRATION_CLOSES")?,
            first_stage: optional_date("APP_FIRST_STAGE")?,
            second_stage: optional_date("APP_SECOND_STAGE")?,
        };

        Ok(Self {
            year,
            quota_per_level,
            birth_years: BirthDatePolicy::new(earliest_year, latest_year),
            calendar,
        })
    }
}

impl Default for EditionConfig {
    fn default() -> Self {
        Self {
            year: DEFAULT_EDITION,
            quota_per_level: DEFAULT_QUOTA_PER_LEVEL,
            birth_years: BirthDatePolicy::default(),
            calendar: EditionCalendar::default(),
        }
    }
}

/// Signing secret wrapper that never prints its bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn random() -> Self {
        let mut bytes = vec![0u8; GENERATED_SECRET_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Token signing secret and lifetimes for each token purpose.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub secret: SecretKey,
    pub token_ttl: Duration,
    pub confirmation_ttl: Duration,
    pub session_ttl: Duration,
}

impl SecurityConfig {
    pub fn with_secret(secret: SecretKey) -> Self {
        Self {
            secret,
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            confirmation_ttl: Duration::seconds(DEFAULT_CONFIRMATION_TTL_SECS),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }

    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let secret = load_secret(environment)?;
        Ok(Self {
            secret,
            token_ttl: parse_ttl("APP_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            confirmation_ttl: parse_ttl(
                "APP_CONFIRMATION_TTL_SECS",
                DEFAULT_CONFIRMATION_TTL_SECS,
            )?,
            session_ttl: parse_ttl("APP_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        })
    }
}

fn load_secret(environment: AppEnvironment) -> Result<SecretKey, ConfigError> {
    if let Ok(value) = env::var("APP_SECRET_KEY") {
        if !value.trim().is_empty() {
            return Ok(SecretKey::new(value.trim().as_bytes()));
        }
    }

    if let Ok(path) = env::var("APP_SECRET_KEY_FILE") {
        let contents = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::SecretFile { path, source })?;
        return Ok(SecretKey::new(contents.trim().as_bytes()));
    }

    if environment == AppEnvironment::Production {
        return Err(ConfigError::MissingSecret);
    }

    warn!("APP_SECRET_KEY not set, tokens are signed with a per-process random key");
    Ok(SecretKey::random())
}

/// Outbound mail settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender: String,
    pub public_url: String,
    pub queue_capacity: usize,
    pub max_attempts: u8,
}

impl MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            sender: env::var("APP_MAIL_SENDER").unwrap_or(defaults.sender),
            public_url: env::var("APP_PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            queue_capacity: parse_var("APP_MAIL_QUEUE", defaults.queue_capacity)?,
            max_attempts: parse_var("APP_MAIL_ATTEMPTS", defaults.max_attempts)?,
        })
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: "olimpiada@localhost".to_string(),
            public_url: "http://127.0.0.1:3000".to_string(),
            queue_capacity: 64,
            max_attempts: 3,
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key }),
        _ => Ok(default),
    }
}

/// Positive lifetime in seconds that chrono can represent.
fn parse_ttl(key: &'static str, default_secs: i64) -> Result<Duration, ConfigError> {
    let secs = parse_var(key, default_secs)?;
    if secs <= 0 {
        return Err(ConfigError::InvalidValue { key });
    }
    Duration::try_seconds(secs).ok_or(ConfigError::InvalidValue { key })
}

fn optional_date(key: &'static str) -> Result<Option<NaiveDate>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key }),
        _ => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str },
    MissingSecret,
    SecretFile { path: String, source: std::io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key } => write!(f, "{key} has an invalid value"),
            ConfigError::MissingSecret => {
                write!(f, "APP_SECRET_KEY or APP_SECRET_KEY_FILE is required in production")
            }
            ConfigError::SecretFile { path, .. } => {
                write!(f, "unable to read secret key file '{path}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::SecretFile { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidValue { .. }
            | ConfigError::MissingSecret => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_EDITION",
            "APP_QUOTA_PER_LEVEL",
            "APP_BIRTH_YEAR_MIN",
            "APP_BIRTH_YEAR_MAX",
            "APP_SECRET_KEY",
            "APP_SECRET_KEY_FILE",
            "APP_TOKEN_TTL_SECS",
            "APP_CONFIRMATION_TTL_SECS",
            "APP_SESSION_TTL_SECS",
            "APP_REGISTRATION_OPENS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.edition.year, 2024);
        assert_eq!(config.edition.quota_per_level, 10);
        assert_eq!(config.edition.birth_years, BirthDatePolicy::new(1995, 2019));
        assert_eq!(config.security.token_ttl, Duration::seconds(600));
    }

    #[test]
    fn rejects_ttls_that_are_not_positive_or_overflow() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        for (key, value) in [
            ("APP_TOKEN_TTL_SECS", "9223372036854775807"),
            ("APP_CONFIRMATION_TTL_SECS", "0"),
            ("APP_SESSION_TTL_SECS", "-60"),
        ] {
            reset_env();
            env::set_var(key, value);
            let err = AppConfig::load().expect_err("ttl must be rejected");
            assert!(
                matches!(err, ConfigError::InvalidValue { key: found } if found == key),
                "{key}={value} gave {err}"
            );
        }
        reset_env();
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn production_requires_a_secret() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        assert!(matches!(AppConfig::load(), Err(ConfigError::MissingSecret)));

        env::set_var("APP_SECRET_KEY", "correct horse battery staple");
        let config = AppConfig::load().expect("config loads with secret");
        assert_eq!(
            config.security.secret.as_bytes(),
            b"correct horse battery staple"
        );
        reset_env();
    }

    #[test]
    fn rejects_malformed_edition_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_QUOTA_PER_LEVEL", "ten");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidValue {
                key: "APP_QUOTA_PER_LEVEL"
            })
        ));

        reset_env();
        env::set_var("APP_REGISTRATION_OPENS", "2024-06-15");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.edition.calendar.registration_opens,
            NaiveDate::from_ymd_opt(2024, 6, 15)
        );
        reset_env();
    }

    #[test]
    fn secret_debug_output_is_redacted() {
        let secret = SecretKey::new("hunter2");
        assert_eq!(format!("{secret:?}"), "SecretKey(..)");
    }
}
