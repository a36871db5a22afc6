use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use crate::config::SyncConfig;
use crate::errors::SyncResult;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "harmony_sync.toml";

/// Environment prefix, e.g. `HARMONY_STORAGE_ROOT`, `HARMONY_PORT`.
pub const ENV_PREFIX: &str = "HARMONY_";

/// Layered providers: built-in defaults, then the TOML file, then env.
pub fn figment(path: Option<&Path>) -> Figment {
    let toml = match path {
        Some(p) => Toml::file(p),
        None => Toml::file(DEFAULT_CONFIG_FILE),
    };
    Figment::from(Serialized::defaults(SyncConfig::default()))
        .merge(toml)
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn load_config(path: Option<&Path>) -> SyncResult<SyncConfig> {
    from_figment(figment(path))
}

pub fn from_figment(figment: Figment) -> SyncResult<SyncConfig> {
    let config: SyncConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}
