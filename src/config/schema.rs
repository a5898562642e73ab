//! Configuration schema

use serde::{Deserialize, Serialize};

/// Broker configuration, consumed (not owned) by the core per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between heartbeat ticks.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,

    /// 0 means unlimited (§4.5 capacity limit).
    #[serde(default)]
    pub max_clients_per_channel: usize,

    /// Channels pre-declared at startup; retained by `cleanup_empty_channels`
    /// even while empty (§3, §4.3).
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: String,

    /// When false, unauthenticated subscribers are admitted to public and
    /// ephemeral channels only (§4.2).
    #[serde(default = "default_require_auth")]
    pub require_auth: bool,

    /// Seconds bounding the shutdown coordinator's cleanup-callback wait.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Seconds of grace before forcibly closing lingering sessions.
    #[serde(default = "default_grace_period")]
    pub grace_period: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7765
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_jwt_secret() -> String {
    "courier-broker-secret-change-in-production".to_string()
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_require_auth() -> bool {
    false
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_grace_period() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            heartbeat_interval: default_heartbeat_interval(),
            max_clients_per_channel: 0,
            channels: vec!["global".to_string()],
            log_level: default_log_level(),
            jwt_secret: default_jwt_secret(),
            jwt_algorithm: default_jwt_algorithm(),
            require_auth: default_require_auth(),
            shutdown_timeout: default_shutdown_timeout(),
            grace_period: default_grace_period(),
        }
    }
}

impl Config {
    pub fn jwt_algorithm(&self) -> jsonwebtoken::Algorithm {
        match self.jwt_algorithm.as_str() {
            "HS384" => jsonwebtoken::Algorithm::HS384,
            "HS512" => jsonwebtoken::Algorithm::HS512,
            _ => jsonwebtoken::Algorithm::HS256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.port, 7765);
        assert_eq!(config.max_clients_per_channel, 0);
        assert!(!config.require_auth);
        assert_eq!(config.jwt_algorithm(), jsonwebtoken::Algorithm::HS256);
    }
}
