//! Project discovery - locate the `.hrw` directory that anchors a workspace

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project metadata directory
pub const PROJECT_DIR: &str = ".hrw";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not inside an hrw project (no {PROJECT_DIR} directory found from {0}). Run 'hrw init' first")]
    NotFound(PathBuf),

    #[error("Project already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A project rooted at the directory containing `.hrw/`
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Find the project containing the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Walk up from `start` until a `.hrw` directory is found
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        start
            .ancestors()
            .find(|dir| dir.join(PROJECT_DIR).is_dir())
            .map(|dir| Self {
                root: dir.to_path_buf(),
            })
            .ok_or_else(|| ProjectError::NotFound(start.to_path_buf()))
    }

    /// Create the `.hrw` directory under `root`
    pub fn init(root: &Path) -> Result<Self, ProjectError> {
        let dir = root.join(PROJECT_DIR);
        if dir.exists() {
            return Err(ProjectError::AlreadyInitialized(root.to_path_buf()));
        }
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.meta_dir().join("config.yaml")
    }

    pub fn team_path(&self) -> PathBuf {
        self.meta_dir().join("team.yaml")
    }

    /// Resolve a path from config relative to the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
