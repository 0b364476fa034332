//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BucketConfig, ConfigError, Environment, GatewayConfig,
    HeartbeatConfig, RateLimitConfig, SessionConfig, StoreConfig,
};
