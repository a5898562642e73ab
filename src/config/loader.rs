//! Configuration loading and environment variable interpolation

use std::env;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};

use super::Config;

const CONFIG_FILENAME: &str = "courier.toml";

/// Load configuration from `courier.toml`, searching upward from the
/// current directory.
pub fn load_config() -> Result<Config> {
    let config_path = find_config_file()?;
    load_config_from_path(&config_path)
}

/// Load configuration from a specific path.
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|_| Error::ConfigNotFound)?;
    let content = interpolate_env_vars(&content);
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Find the configuration file, searching upward from current directory.
fn find_config_file() -> Result<std::path::PathBuf> {
    let mut current = env::current_dir().map_err(|e| Error::Config(e.to_string()))?;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(Error::ConfigNotFound);
        }
    }
}

/// Interpolate environment variables in the format `${VAR_NAME}` or
/// `${VAR_NAME:-default}`.
fn interpolate_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("invalid regex pattern - this is a bug in the codebase");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Direct environment-variable overrides, applied after the file is
/// loaded so a deployment can override individual fields without editing
/// `courier.toml`.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = env::var("HOST") {
        config.host = host;
    }
    if let Ok(port) = env::var("PORT") {
        if let Ok(port) = port.parse() {
            config.port = port;
        }
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        config.jwt_secret = secret;
    }
    if let Ok(require_auth) = env::var("REQUIRE_AUTH") {
        config.require_auth = matches!(require_auth.to_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Ok(interval) = env::var("HEARTBEAT_INTERVAL") {
        if let Ok(interval) = interval.parse() {
            config.heartbeat_interval = interval;
        }
    }
    if let Ok(max) = env::var("MAX_CLIENTS_PER_CHANNEL") {
        if let Ok(max) = max.parse() {
            config.max_clients_per_channel = max;
        }
    }
}

/// Generate a default configuration file content, written by
/// `courier-broker init`.
pub fn default_config_content() -> &'static str {
    r#"# Courier broker configuration

host = "0.0.0.0"
port = 7765
heartbeat_interval = 30
max_clients_per_channel = 0
channels = ["global"]
log_level = "info"
jwt_secret = "${JWT_SECRET:-change-me-in-production}"
jwt_algorithm = "HS256"
require_auth = false
shutdown_timeout = 30
grace_period = 5
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_interpolation() {
        env::set_var("COURIER_TEST_VAR", "hello");
        let content = "value = \"${COURIER_TEST_VAR}\"";
        let result = interpolate_env_vars(content);
        assert_eq!(result, "value = \"hello\"");
        env::remove_var("COURIER_TEST_VAR");
    }

    #[test]
    fn test_env_interpolation_with_default() {
        let content = "value = \"${COURIER_NONEXISTENT_VAR:-default_value}\"";
        let result = interpolate_env_vars(content);
        assert_eq!(result, "value = \"default_value\"");
    }

    #[test]
    fn loads_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        fs::write(&path, default_config_content()).unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.port, 7765);
        assert_eq!(config.channels, vec!["global".to_string()]);
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let result = load_config_from_path(Path::new("/nonexistent/courier.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound)));
    }
}
