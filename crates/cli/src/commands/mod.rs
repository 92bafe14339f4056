pub mod collectors;
pub mod config_cmd;
pub mod gather;
pub mod onboard;

use std::path::Path;

use ctxpack_config::{AppConfig, ConfigError};

/// Load from `--config` when given, the default location otherwise.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}

/// The config file in effect.
pub fn config_file(path: Option<&Path>) -> std::path::PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}
