//! Configuration loading, env substitution and validation.
//!
//! Config files: `courier.toml`, `courier.yaml`, or `courier.json`
//! Searched in `./` then `~/.config/courier/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, and the plain
//! `BOT_TOKEN` / `GROUP_ID` / `DATABASE_URL` variables as overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{CourierConfig, CrmConfig, CrmWriteMode, StorageConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
