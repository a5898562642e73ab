//! Configuration management for the broker

pub mod loader;
mod schema;

pub use loader::{apply_env_overrides, default_config_content, load_config, load_config_from_path};
pub use schema::Config;
