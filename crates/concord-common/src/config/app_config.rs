//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present). Every value has a default, so an empty environment yields a
//! working local gateway.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub heartbeat: HeartbeatConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub store: StoreConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Gateway listener and handshake settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// The only protocol version the handshake accepts
    pub version: u8,
    /// Advertised websocket URL; derived from host/port when unset
    pub public_url: Option<String>,
    pub accept_clients: bool,
    pub max_payload_bytes: usize,
    /// Per-connection outbound queue depth
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 5001,
            version: 6,
            public_url: None,
            accept_clients: true,
            max_payload_bytes: 4096,
            outbound_buffer: 1024,
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL handed out by `/api/gateway`
    #[must_use]
    pub fn advertised_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("ws://{}", self.address()))
    }
}

/// Heartbeat interval band, in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Slack granted past the advertised interval before a connection is dropped
    pub grace_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 40_000,
            max_interval_ms: 42_000,
            grace_ms: 3_000,
        }
    }
}

/// Session policy
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub replay_capacity: usize,
    pub resume_window_secs: u64,
    pub max_guilds_per_shard: usize,
    pub session_id_attempts: u32,
    pub large_threshold: u32,
    pub member_chunk_size: usize,
    pub janitor_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            replay_capacity: 60,
            resume_window_secs: 120,
            max_guilds_per_shard: 2500,
            session_id_attempts: 20,
            large_threshold: 50,
            member_chunk_size: 1000,
            janitor_interval_secs: 30,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn resume_window(&self) -> Duration {
        Duration::from_secs(self.resume_window_secs)
    }

    #[must_use]
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs.max(1))
    }
}

/// A fixed-window rate limit: `limit` frames per `window_secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BucketConfig {
    pub limit: u32,
    pub window_secs: u64,
}

impl BucketConfig {
    #[must_use]
    pub const fn new(limit: u32, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Per-connection inbound rate limits
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Aggregate limit over every inbound frame
    pub messages: BucketConfig,
    pub identify: BucketConfig,
    pub presence: BucketConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            messages: BucketConfig::new(120, 60),
            identify: BucketConfig::new(1, 5),
            presence: BucketConfig::new(5, 60),
        }
    }
}

/// Collaborator store settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// JSON fixture to seed the in-memory store from
    pub fixture_path: Option<String>,
}

// Default value functions
fn default_app_name() -> String {
    "concord".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Read an optional variable, reporting unparsable values
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_var(name)?.unwrap_or(default))
}

fn bucket_from_env(
    limit_var: &'static str,
    window_var: &'static str,
    default: BucketConfig,
) -> Result<BucketConfig, ConfigError> {
    Ok(BucketConfig {
        limit: var_or(limit_var, default.limit)?,
        window_secs: var_or(window_var, default.window_secs)?,
    })
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// resulting policy is inconsistent
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let config = Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: var_or("APP_ENV", Environment::default())?,
            },
            gateway: GatewayConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: var_or("GATEWAY_PORT", defaults.gateway.port)?,
                version: var_or("GATEWAY_VERSION", defaults.gateway.version)?,
                public_url: env::var("GATEWAY_PUBLIC_URL").ok().filter(|s| !s.is_empty()),
                accept_clients: var_or("GATEWAY_ACCEPT_CLIENTS", defaults.gateway.accept_clients)?,
                max_payload_bytes: var_or(
                    "GATEWAY_MAX_PAYLOAD_BYTES",
                    defaults.gateway.max_payload_bytes,
                )?,
                outbound_buffer: var_or("GATEWAY_OUTBOUND_BUFFER", defaults.gateway.outbound_buffer)?,
            },
            heartbeat: HeartbeatConfig {
                min_interval_ms: var_or("HEARTBEAT_MIN_MS", defaults.heartbeat.min_interval_ms)?,
                max_interval_ms: var_or("HEARTBEAT_MAX_MS", defaults.heartbeat.max_interval_ms)?,
                grace_ms: var_or("HEARTBEAT_GRACE_MS", defaults.heartbeat.grace_ms)?,
            },
            session: SessionConfig {
                replay_capacity: var_or(
                    "SESSION_REPLAY_CAPACITY",
                    defaults.session.replay_capacity,
                )?,
                resume_window_secs: var_or(
                    "SESSION_RESUME_WINDOW_SECS",
                    defaults.session.resume_window_secs,
                )?,
                max_guilds_per_shard: var_or(
                    "SESSION_MAX_GUILDS_PER_SHARD",
                    defaults.session.max_guilds_per_shard,
                )?,
                session_id_attempts: var_or(
                    "SESSION_ID_ATTEMPTS",
                    defaults.session.session_id_attempts,
                )?,
                large_threshold: var_or(
                    "SESSION_LARGE_THRESHOLD",
                    defaults.session.large_threshold,
                )?,
                member_chunk_size: var_or(
                    "SESSION_MEMBER_CHUNK_SIZE",
                    defaults.session.member_chunk_size,
                )?,
                janitor_interval_secs: var_or(
                    "SESSION_JANITOR_INTERVAL_SECS",
                    defaults.session.janitor_interval_secs,
                )?,
            },
            rate_limit: RateLimitConfig {
                messages: bucket_from_env(
                    "RATE_LIMIT_MESSAGES",
                    "RATE_LIMIT_MESSAGES_WINDOW_SECS",
                    defaults.rate_limit.messages,
                )?,
                identify: bucket_from_env(
                    "RATE_LIMIT_IDENTIFY",
                    "RATE_LIMIT_IDENTIFY_WINDOW_SECS",
                    defaults.rate_limit.identify,
                )?,
                presence: bucket_from_env(
                    "RATE_LIMIT_PRESENCE",
                    "RATE_LIMIT_PRESENCE_WINDOW_SECS",
                    defaults.rate_limit.presence,
                )?,
            },
            store: StoreConfig {
                fixture_path: env::var("STORE_FIXTURE").ok().filter(|s| !s.is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject policy that cannot work at runtime
    ///
    /// # Errors
    /// Returns the first inconsistent setting found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let hb = &self.heartbeat;
        if hb.min_interval_ms == 0 || hb.min_interval_ms > hb.max_interval_ms {
            return Err(ConfigError::InvalidValue(
                "HEARTBEAT_MIN_MS",
                format!("{}..{}", hb.min_interval_ms, hb.max_interval_ms),
            ));
        }
        if self.session.replay_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_REPLAY_CAPACITY",
                "0".to_string(),
            ));
        }
        if self.session.max_guilds_per_shard == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_MAX_GUILDS_PER_SHARD",
                "0".to_string(),
            ));
        }
        if self.session.member_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_MEMBER_CHUNK_SIZE",
                "0".to_string(),
            ));
        }
        if self.session.session_id_attempts == 0 {
            return Err(ConfigError::InvalidValue("SESSION_ID_ATTEMPTS", "0".to_string()));
        }
        if self.gateway.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_OUTBOUND_BUFFER",
                "0".to_string(),
            ));
        }
        let buckets = [
            ("RATE_LIMIT_MESSAGES", self.rate_limit.messages),
            ("RATE_LIMIT_IDENTIFY", self.rate_limit.identify),
            ("RATE_LIMIT_PRESENCE", self.rate_limit.presence),
        ];
        for (name, bucket) in buckets {
            if bucket.limit == 0 || bucket.window_secs == 0 {
                return Err(ConfigError::InvalidValue(
                    name,
                    format!("{}/{}s", bucket.limit, bucket.window_secs),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
