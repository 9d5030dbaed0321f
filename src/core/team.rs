//! Team roster - staff members and the capability codes they hold
//!
//! The roster lives in `.hrw/team.yaml`. [`RosterOracle`] re-reads the file
//! on every query so a revoked capability takes effect on the next decision.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::core::authz::AuthorizationOracle;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Failed to read team roster {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse team roster {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Team member already exists: {0}")]
    DuplicateMember(String),

    #[error("Team member not found: {0}")]
    MemberNotFound(String),
}

/// A staff member in the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Staff id used as actor id in requests and approvals
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TeamMember {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: String::new(),
            capabilities: Vec::new(),
            active: true,
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Inactive members hold no capabilities
    pub fn has_capability(&self, capability: &str) -> bool {
        self.active && self.capabilities.iter().any(|c| c == capability)
    }
}

/// The team roster file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    #[serde(default)]
    pub members: Vec<TeamMember>,
}

impl TeamRoster {
    /// Load a roster; a missing file is an empty roster
    pub fn load(path: &Path) -> Result<Self, RosterError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(&contents).map_err(|e| RosterError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), RosterError> {
        let contents = serde_yml::to_string(self).map_err(|e| RosterError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, contents).map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn find(&self, id: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn add(&mut self, member: TeamMember) -> Result<(), RosterError> {
        if self.find(&member.id).is_some() {
            return Err(RosterError::DuplicateMember(member.id));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<TeamMember, RosterError> {
        let idx = self
            .members
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| RosterError::MemberNotFound(id.to_string()))?;
        Ok(self.members.remove(idx))
    }

    pub fn active_members(&self) -> impl Iterator<Item = &TeamMember> {
        self.members.iter().filter(|m| m.active)
    }

    pub fn members_with_capability<'a>(
        &'a self,
        capability: &'a str,
    ) -> impl Iterator<Item = &'a TeamMember> + 'a {
        self.members
            .iter()
            .filter(move |m| m.has_capability(capability))
    }

    /// Display name for a staff id, falling back to the id itself
    pub fn display_name(&self, id: &str) -> String {
        self.find(id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl AuthorizationOracle for TeamRoster {
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool {
        self.find(actor_id)
            .is_some_and(|m| m.has_capability(capability))
    }
}

/// Oracle backed by the roster file, read fresh on every query.
///
/// An unreadable roster denies every capability.
#[derive(Debug, Clone)]
pub struct RosterOracle {
    path: PathBuf,
}

impl RosterOracle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthorizationOracle for RosterOracle {
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool {
        match TeamRoster::load(&self.path) {
            Ok(roster) => roster.has_capability(actor_id, capability),
            Err(e) => {
                warn!(error = %e, actor = actor_id, capability, "roster unavailable, denying");
                false
            }
        }
    }
}
