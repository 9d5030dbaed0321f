//! Shared helper functions for CLI commands
//!
//! Session setup (project, config, acting staff member), request id
//! resolution, signature references and error reporting.

use chrono::{DateTime, Utc};
use clap::Args;
use miette::{miette, IntoDiagnostic, Report, Result};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::cli::args::GlobalOpts;
use crate::core::config::Config;
use crate::core::export::ExportError;
use crate::core::identity::{RequestId, REQUEST_PREFIX};
use crate::core::project::Project;
use crate::core::store::RequestStore;
use crate::core::team::{RosterOracle, TeamRoster};
use crate::core::workflow::{WorkflowEngine, WorkflowError};

/// Engine type used by the binary: SQLite store, roster-file oracle
pub type Engine = WorkflowEngine<RosterOracle>;

/// Project context for one command invocation
pub struct Session {
    pub project: Project,
    pub config: Config,
    actor: Option<String>,
}

impl Session {
    /// Discover the project and load its configuration
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let project = Project::discover().into_diagnostic()?;
        let config = Config::load(&project).into_diagnostic()?;
        let actor = config.resolve_actor(global.actor.as_deref());
        Ok(Self {
            project,
            config,
            actor,
        })
    }

    /// The acting staff member; required by every workflow command
    pub fn actor(&self) -> Result<&str> {
        self.actor.as_deref().ok_or_else(|| {
            miette!(
                help = "pass --as <staff-id>, set HRW_ACTOR, or set 'actor' in .hrw/config.yaml",
                "No acting staff member"
            )
        })
    }

    pub fn actor_opt(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Open the request database and wire the roster oracle
    pub fn engine(&self) -> Result<Engine> {
        let path = self.config.database_path(&self.project);
        let store = RequestStore::open(&path, self.config.workflow.busy_timeout())
            .map_err(|e| miette!("Failed to open {}: {}", path.display(), e))?;
        let oracle = RosterOracle::new(self.project.team_path());
        Ok(WorkflowEngine::new(
            store,
            oracle,
            self.config.workflow.clone(),
        ))
    }

    pub fn roster(&self) -> Result<TeamRoster> {
        TeamRoster::load(&self.project.team_path()).into_diagnostic()
    }
}

/// Resolve a full id or a unique prefix such as `HRQ-01HV3K`
pub fn resolve_id(engine: &Engine, input: &str) -> Result<RequestId> {
    if let Ok(id) = input.parse::<RequestId>() {
        return Ok(id);
    }

    let upper = input.trim().to_uppercase();
    let prefix = if upper.starts_with(&format!("{}-", REQUEST_PREFIX)) {
        upper
    } else {
        format!("{}-{}", REQUEST_PREFIX, upper)
    };

    let matches = engine
        .store()
        .ids_with_prefix(&prefix, 2)
        .map_err(|e| miette!("{}", e))?;
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(miette!("Request not found: {}", input)),
        _ => Err(miette!(
            help = "use more characters of the id",
            "Ambiguous request id: {}",
            input
        )),
    }
}

/// Signature options shared by request creation and decisions
#[derive(Debug, Clone, Args)]
#[group(multiple = false)]
pub struct SignatureArgs {
    /// Signature reference (an opaque id of the captured signature)
    #[arg(long, value_name = "REF")]
    pub signature: Option<String>,

    /// Signature image or document; stored as a sha256 content reference
    #[arg(long, value_name = "PATH")]
    pub signature_file: Option<PathBuf>,
}

impl SignatureArgs {
    /// Reference from the arguments, if one was given
    pub fn reference(&self) -> Result<Option<String>> {
        if let Some(path) = &self.signature_file {
            let bytes = std::fs::read(path)
                .map_err(|e| miette!("Failed to read signature {}: {}", path.display(), e))?;
            return Ok(Some(content_reference(&bytes)));
        }
        Ok(self.signature.clone())
    }

    /// Reference from the arguments, failing when neither was given
    pub fn require(&self) -> Result<String> {
        self.reference()?.ok_or_else(|| {
            miette!(
                help = "pass --signature <ref> or --signature-file <path>",
                "A signature is required"
            )
        })
    }
}

/// `sha256:<hex>` reference for a signature blob
pub fn content_reference(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// Diagnostic for a workflow error, with a recovery hint where one exists
pub fn workflow_report(err: WorkflowError) -> Report {
    match &err {
        WorkflowError::Conflict { id, .. } => miette!(
            help = format!(
                "another decision was recorded first; run 'hrw request show {}' and decide again if it still applies",
                id
            ),
            "{}",
            err
        ),
        WorkflowError::Unauthorized { .. } => miette!(
            help = "capabilities come from .hrw/team.yaml; see 'hrw team list'",
            "{}",
            err
        ),
        _ => miette!("{}", err),
    }
}

pub fn export_report(err: ExportError) -> Report {
    match err {
        ExportError::Workflow(e) => workflow_report(e),
        other => miette!("{}", other),
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Minute-precision UTC timestamp for tables
pub fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}
