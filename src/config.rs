use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::connection::Connection;
use crate::db::OnError;
use crate::resolver::ResolveMode;

const APP_NAME: &str = "alojamientos-import";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub connection: Connection,
    pub files: FilesConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    pub source: PathBuf,
    pub categories: PathBuf,
    pub neighborhoods: PathBuf,
    pub delimiter: char,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("alojamientos.csv"),
            categories: PathBuf::from("categories.csv"),
            neighborhoods: PathBuf::from("neighborhoods.csv"),
            delimiter: ';',
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    pub resolve: ResolveMode,
    pub on_error: OnError,
}

/// Return the application config directory path, creating it if missing.
pub fn get_app_config_path() -> Result<PathBuf> {
    let mut path = if cfg!(target_os = "macos") {
        dirs_next::home_dir().map(|h| h.join(".config"))
    } else {
        dirs_next::config_dir()
    }
    .ok_or_else(|| anyhow::anyhow!("failed to find os config dir."))?;

    path.push(APP_NAME);
    fs::create_dir_all(&path)?;
    Ok(path)
}

impl Config {
    /// Load from `path`, or from the app config dir when `path` is `None`.
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = get_app_config_path()?.join(CONFIG_FILE);
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Config::from_yaml(&data)
            .with_context(|| format!("failed to parse YAML at {}", path.display()))
    }

    pub fn from_yaml(data: &str) -> Result<Config> {
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(data)?;
        Ok(config)
    }
}
