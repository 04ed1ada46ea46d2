//! Configuration loading, discovery, and env substitution.
//!
//! Config files: `warelay.toml`, `warelay.yaml`, or `warelay.json`
//! Searched in `./` then `~/.config/warelay/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. The `PORT` and
//! `API_KEY` environment variables override the file-based settings.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load_config},
    schema::{AuthConfig, ServerConfig, SessionConfig, WarelayConfig},
};
