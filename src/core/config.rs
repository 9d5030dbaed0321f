//! Configuration - project `.hrw/config.yaml` layered over the user config

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::project::Project;
use crate::core::workflow::WorkflowConfig;

/// Environment variable naming the acting staff member
pub const ACTOR_ENV: &str = "HRW_ACTOR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Export settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Template file overriding the embedded request form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

/// Merged configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default acting staff id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// SQLite database path, relative to the project root
    pub database: PathBuf,

    pub workflow: WorkflowConfig,

    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor: None,
            database: PathBuf::from(".hrw/requests.db"),
            workflow: WorkflowConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load the user config, then the project config on top of it
    pub fn load(project: &Project) -> Result<Self, ConfigError> {
        let mut merged = serde_yml::Value::Mapping(serde_yml::Mapping::new());

        if let Some(global) = global_config_path() {
            if global.exists() {
                merge_values(&mut merged, read_value(&global)?);
            }
        }

        let local = project.config_path();
        if local.exists() {
            merge_values(&mut merged, read_value(&local)?);
        }

        serde_yml::from_value(merged).map_err(|e| ConfigError::Parse {
            path: local,
            message: e.to_string(),
        })
    }

    /// Load a single config file with no layering
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        serde_yml::from_value(read_value(path)?).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_yml::to_string(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Acting staff id: explicit override, then `HRW_ACTOR`, then config
    pub fn resolve_actor(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| std::env::var(ACTOR_ENV).ok())
            .filter(|a| !a.trim().is_empty())
            .or_else(|| self.actor.clone())
    }

    /// Absolute database path for a project
    pub fn database_path(&self, project: &Project) -> PathBuf {
        project.resolve(&self.database)
    }
}

/// Path of the per-user config file, if a home directory is known
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "hrw").map(|dirs| dirs.config_dir().join("config.yaml"))
}

fn read_value(path: &Path) -> Result<serde_yml::Value, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(serde_yml::Value::Mapping(serde_yml::Mapping::new()));
    }
    serde_yml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything
/// else is replaced.
fn merge_values(base: &mut serde_yml::Value, overlay: serde_yml::Value) {
    match (base, overlay) {
        (serde_yml::Value::Mapping(base_map), serde_yml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
