//! Serving config loader (strict YAML + environment overrides).
//!
//! Resolution order: built-in defaults, then the YAML file named by
//! `MODELSERVE_CONFIG` (if set), then `LOG_LEVEL` / `LISTEN_ADDR`.

pub mod schema;

use std::fs;

use modelserve_core::error::{ModelServeError, Result};

pub use schema::{InferenceSection, LogSection, ServeConfig, ServerSection};

pub const CONFIG_PATH_ENV: &str = "MODELSERVE_CONFIG";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const LISTEN_ADDR_ENV: &str = "LISTEN_ADDR";

pub fn load_from_file(path: &str) -> Result<ServeConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ModelServeError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServeConfig> {
    let cfg: ServeConfig = serde_yaml::from_str(s)
        .map_err(|e| ModelServeError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from the process environment.
pub fn load_from_env() -> Result<ServeConfig> {
    load_with(|key| std::env::var(key).ok())
}

/// Same as [`load_from_env`] with an injectable variable lookup.
pub fn load_with<F>(lookup: F) -> Result<ServeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = match lookup(CONFIG_PATH_ENV) {
        Some(path) => load_from_file(&path)?,
        None => ServeConfig::default(),
    };

    if let Some(level) = lookup(LOG_LEVEL_ENV) {
        cfg.log.level = level;
    }
    if let Some(listen) = lookup(LISTEN_ADDR_ENV) {
        cfg.server.listen = listen;
    }

    cfg.validate()?;
    Ok(cfg)
}
