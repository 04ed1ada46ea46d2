use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::WarelayConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "warelay.toml",
    "warelay.yaml",
    "warelay.yml",
    "warelay.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<WarelayConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./warelay.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/warelay/warelay.{toml,yaml,yml,json}` (user-global)
///
/// Returns `WarelayConfig::default()` if no config file is found.
pub fn discover_and_load() -> WarelayConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    WarelayConfig::default()
}

/// Apply environment overrides on top of a loaded config.
///
/// `PORT` replaces the listen port; `API_KEY` installs the access-guard
/// secret. Both win over file-based values.
pub fn apply_env_overrides(config: &mut WarelayConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut WarelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(raw) = lookup("PORT") {
        match raw.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %raw, "ignoring unparseable PORT override"),
        }
    }
    if let Some(key) = lookup("API_KEY")
        && !key.is_empty()
    {
        config.auth.api_key = Some(Secret::new(key));
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/warelay/
    if let Some(dirs) = project_dirs() {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/warelay/`).
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Returns the platform data directory (`~/.local/share/warelay/` on Linux),
/// used for the session store when no explicit data dir is configured.
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().to_path_buf())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "warelay")
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<WarelayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
