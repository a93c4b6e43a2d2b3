use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::CourierConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<CourierConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./courier.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/courier/courier.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CourierConfig::default()` when no file exists, so a
/// deployment can be configured from the environment alone. A file that
/// exists but does not parse is an error.
pub fn discover_and_load() -> anyhow::Result<CourierConfig> {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            debug!("no config file found, using defaults");
            CourierConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Apply the plain environment variables the bot has always honoured.
///
/// `BOT_TOKEN`, `GROUP_ID` and `DATABASE_URL` win over file values. An
/// unparsable `GROUP_ID` is ignored with a warning and left to validation.
pub fn apply_env_overrides(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup("BOT_TOKEN").map(|t| t.trim().to_string())
        && !token.is_empty()
    {
        config.telegram.token = Secret::new(token);
    }

    if let Some(raw) = lookup("GROUP_ID") {
        match raw.trim().parse::<i64>() {
            Ok(id) => config.telegram.group_id = id,
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid GROUP_ID"),
        }
    }

    if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
        config.storage.database_url = url;
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
