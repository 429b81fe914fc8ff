//! Relay configuration module
//! Handles runtime configuration parameters for the broadcast relay

use crate::constants::{
    DEFAULT_AUDIT_DIR, DEFAULT_AUDIT_TIMEZONE, DEFAULT_CENSOR_MARKER, DEFAULT_COOLDOWN_SECS,
    DEFAULT_HOST, DEFAULT_MAX_FRAME_BYTES, DEFAULT_MAX_MESSAGE_CHARS,
    DEFAULT_MODERATION_RETRIES, DEFAULT_MODERATION_TIMEOUT_SECS, DEFAULT_PORT,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RATE_LIMIT_MAX_TRACKED,
};
use crate::error::{RelayError, Result};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where moderation verdicts come from
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationSource {
    /// Spawn a launcher program per message
    Command(String),
    /// POST to a moderation service
    Http(url::Url),
    /// No moderation at all, development only
    Passthrough,
}

/// Relay configuration parameters
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Minimum gap between two accepted messages from one address
    pub cooldown: Duration,
    /// Maximum content length in characters
    pub max_message_chars: usize,
    /// Maximum size of an inbound WebSocket frame
    pub max_frame_bytes: usize,
    /// Capacity of the queue feeding the broadcast consumer
    pub queue_capacity: usize,
    /// Upper bound on identities held by the rate limiter
    pub rate_limit_max_tracked: usize,
    /// Close connections that stay silent this long (None keeps them open forever)
    pub idle_timeout: Option<Duration>,
    pub moderation: ModerationSource,
    pub moderation_timeout: Duration,
    pub moderation_retries: u32,
    pub censor_marker: String,
    /// JSON file mapping sender names to role tags
    pub roles_file: Option<PathBuf>,
    pub audit_dir: PathBuf,
    pub audit_timezone: Tz,
    /// Include the sender address in broadcast frames
    pub expose_source_address: bool,
    /// Static page served at `/`
    pub static_index: Option<PathBuf>,
    pub enable_tls: bool,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            rate_limit_max_tracked: DEFAULT_RATE_LIMIT_MAX_TRACKED,
            idle_timeout: None,
            moderation: ModerationSource::Passthrough,
            moderation_timeout: Duration::from_secs(DEFAULT_MODERATION_TIMEOUT_SECS),
            moderation_retries: DEFAULT_MODERATION_RETRIES,
            censor_marker: DEFAULT_CENSOR_MARKER.to_string(),
            roles_file: None,
            audit_dir: PathBuf::from(DEFAULT_AUDIT_DIR),
            audit_timezone: chrono_tz::America::New_York,
            expose_source_address: false,
            static_index: None,
            enable_tls: false,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

impl RelayConfig {
    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("RELAY_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env_parse("RELAY_PORT", DEFAULT_PORT);

        let cooldown_secs = env_parse("RELAY_COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS);
        let max_message_chars = env_parse("RELAY_MAX_MESSAGE_CHARS", DEFAULT_MAX_MESSAGE_CHARS);
        let max_frame_bytes = env_parse("RELAY_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES);
        let queue_capacity = env_parse("RELAY_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY);
        let rate_limit_max_tracked =
            env_parse("RELAY_RATE_LIMIT_MAX_TRACKED", DEFAULT_RATE_LIMIT_MAX_TRACKED);

        let idle_secs: u64 = env_parse("RELAY_IDLE_TIMEOUT_SECS", 0);
        let idle_timeout = (idle_secs > 0).then(|| Duration::from_secs(idle_secs));

        let moderation = Self::moderation_source(
            env::var("RELAY_MODERATION_COMMAND").ok(),
            env::var("RELAY_MODERATION_URL").ok(),
        )?;

        let moderation_timeout_secs =
            env_parse("RELAY_MODERATION_TIMEOUT_SECS", DEFAULT_MODERATION_TIMEOUT_SECS);
        let moderation_retries = env_parse("RELAY_MODERATION_RETRIES", DEFAULT_MODERATION_RETRIES);
        let censor_marker =
            env::var("RELAY_CENSOR_MARKER").unwrap_or(DEFAULT_CENSOR_MARKER.to_string());

        let roles_file = env::var("RELAY_ROLES_FILE").ok().map(PathBuf::from);
        let audit_dir = env::var("RELAY_AUDIT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_AUDIT_DIR));
        let audit_timezone = Self::parse_timezone(
            &env::var("RELAY_AUDIT_TIMEZONE").unwrap_or(DEFAULT_AUDIT_TIMEZONE.to_string()),
        )?;

        let expose_source_address = env_flag("RELAY_EXPOSE_SOURCE_ADDRESS");
        let static_index = env::var("RELAY_STATIC_INDEX").ok().map(PathBuf::from);

        // TLS configuration
        let enable_tls = env_flag("RELAY_ENABLE_TLS");
        let tls_cert_path = env::var("RELAY_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("RELAY_TLS_KEY_PATH").ok();

        let config = Self {
            host,
            port,
            cooldown: Duration::from_secs(cooldown_secs),
            max_message_chars,
            max_frame_bytes,
            queue_capacity,
            rate_limit_max_tracked,
            idle_timeout,
            moderation,
            moderation_timeout: Duration::from_secs(moderation_timeout_secs),
            moderation_retries,
            censor_marker,
            roles_file,
            audit_dir,
            audit_timezone,
            expose_source_address,
            static_index,
            enable_tls,
            tls_cert_path,
            tls_key_path,
        };
        config.validate()?;
        Ok(config)
    }

    fn moderation_source(command: Option<String>, url: Option<String>) -> Result<ModerationSource> {
        match (command, url) {
            (Some(_), Some(_)) => Err(RelayError::ConfigError(
                "RELAY_MODERATION_COMMAND and RELAY_MODERATION_URL are mutually exclusive"
                    .to_string(),
            )),
            (Some(command), None) => Ok(ModerationSource::Command(command)),
            (None, Some(raw)) => url::Url::parse(&raw)
                .map(ModerationSource::Http)
                .map_err(|e| {
                    RelayError::ConfigError(format!("Invalid RELAY_MODERATION_URL '{}': {}", raw, e))
                }),
            (None, None) => Ok(ModerationSource::Passthrough),
        }
    }

    fn parse_timezone(name: &str) -> Result<Tz> {
        name.parse::<Tz>()
            .map_err(|e| RelayError::ConfigError(format!("Unknown audit time zone '{}': {}", name, e)))
    }

    /// Reject combinations the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cooldown.is_zero() {
            return Err(RelayError::ConfigError(
                "RELAY_COOLDOWN_SECS must be greater than zero".to_string(),
            ));
        }
        if self.max_message_chars == 0 {
            return Err(RelayError::ConfigError(
                "RELAY_MAX_MESSAGE_CHARS must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 || self.rate_limit_max_tracked == 0 {
            return Err(RelayError::ConfigError(
                "Queue capacity and rate limiter capacity must be greater than zero".to_string(),
            ));
        }
        if self.moderation_timeout.is_zero() {
            return Err(RelayError::ConfigError(
                "RELAY_MODERATION_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        if self.enable_tls {
            match (&self.tls_cert_path, &self.tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    if !std::path::Path::new(cert_path).exists() {
                        return Err(RelayError::ConfigError(format!(
                            "TLS certificate file does not exist: {}",
                            cert_path
                        )));
                    }
                    if !std::path::Path::new(key_path).exists() {
                        return Err(RelayError::ConfigError(format!(
                            "TLS private key file does not exist: {}",
                            key_path
                        )));
                    }
                }
                _ => {
                    return Err(RelayError::ConfigError(
                        "TLS is enabled but RELAY_TLS_CERT_PATH or RELAY_TLS_KEY_PATH is not set"
                            .to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}
