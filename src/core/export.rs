//! Document export for closed requests
//!
//! [`DocumentExporter`] turns a resolved request and its timeline into
//! document bytes. [`TextExporter`] renders a plain-text request form with
//! Tera from an embedded template or a project-supplied one.

use chrono::{DateTime, Utc};
use rust_embed::Embed;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tera::Tera;
use thiserror::Error;

use crate::core::approval::Stage;
use crate::core::authz::{AuthorizationOracle, CAP_MANAGE_HR};
use crate::core::identity::RequestId;
use crate::core::request::{RequestRecord, RequestStatus};
use crate::core::timeline::{record_timeline, TimelineEvent};
use crate::core::workflow::{WorkflowEngine, WorkflowError};

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const REQUEST_TEMPLATE: &str = "request.txt.tera";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Request {id} is still {status}; only closed requests can be exported")]
    NotTerminal { id: RequestId, status: RequestStatus },

    #[error("{actor} may not export requests (requires capability 'manage-hr')")]
    Unauthorized { actor: String },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Renders a closed request and its ordered timeline to a document
pub trait DocumentExporter {
    fn export(
        &self,
        record: &RequestRecord,
        timeline: &[TimelineEvent],
    ) -> Result<Vec<u8>, ExportError>;
}

/// Plain-text request form
pub struct TextExporter {
    tera: Tera,
}

impl TextExporter {
    /// Exporter using the built-in form
    pub fn new() -> Result<Self, ExportError> {
        let content = EmbeddedTemplates::get(REQUEST_TEMPLATE)
            .ok_or_else(|| ExportError::Template(format!("missing {}", REQUEST_TEMPLATE)))?;
        let source = std::str::from_utf8(content.data.as_ref())
            .map_err(|e| ExportError::Template(e.to_string()))?;
        Self::from_source(source)
    }

    /// Exporter using a template file in place of the built-in form
    pub fn from_file(path: &Path) -> Result<Self, ExportError> {
        let source = std::fs::read_to_string(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(&source)
    }

    /// `from_file` when a path is configured, otherwise `new`
    pub fn with_override(path: Option<&Path>) -> Result<Self, ExportError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::new(),
        }
    }

    fn from_source(source: &str) -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        tera.add_raw_template(REQUEST_TEMPLATE, source)
            .map_err(|e| ExportError::Template(e.to_string()))?;
        Ok(Self { tera })
    }

    /// Render to a string
    pub fn render(
        &self,
        record: &RequestRecord,
        timeline: &[TimelineEvent],
    ) -> Result<String, ExportError> {
        let form = FormContext::build(record, timeline);
        let context =
            tera::Context::from_serialize(&form).map_err(|e| ExportError::Template(e.to_string()))?;
        self.tera
            .render(REQUEST_TEMPLATE, &context)
            .map_err(|e| ExportError::Template(e.to_string()))
    }
}

impl DocumentExporter for TextExporter {
    fn export(
        &self,
        record: &RequestRecord,
        timeline: &[TimelineEvent],
    ) -> Result<Vec<u8>, ExportError> {
        Ok(self.render(record, timeline)?.into_bytes())
    }
}

/// Export a request on behalf of `caller`.
///
/// Only closed requests are exported, and only for holders of `manage-hr`
/// at the time of the call.
pub fn export_request<O, E>(
    engine: &WorkflowEngine<O>,
    exporter: &E,
    id: RequestId,
    caller: &str,
) -> Result<Vec<u8>, ExportError>
where
    O: AuthorizationOracle,
    E: DocumentExporter + ?Sized,
{
    // Capability first: callers without it learn nothing about the request
    if !engine.oracle().has_capability(caller, CAP_MANAGE_HR) {
        return Err(ExportError::Unauthorized {
            actor: caller.to_string(),
        });
    }
    let record = engine.load(id)?;
    if !record.request.is_terminal() {
        return Err(ExportError::NotTerminal {
            id,
            status: record.request.status,
        });
    }

    let timeline = record_timeline(&record);
    exporter.export(&record, &timeline)
}

#[derive(Debug, Serialize)]
struct FormContext {
    heading: String,
    underline: String,
    number: String,
    id: String,
    submitted: String,
    status: String,
    title: String,
    amount: Option<String>,
    period: Option<String>,
    description: Option<String>,
    signatures: Vec<SignatureBlock>,
    history: Vec<HistoryLine>,
}

#[derive(Debug, Serialize)]
struct SignatureBlock {
    party: String,
    actor: Option<String>,
    decision: Option<String>,
    date: Option<String>,
    signature: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryLine {
    date: String,
    summary: String,
    actor: String,
}

impl FormContext {
    fn build(record: &RequestRecord, timeline: &[TimelineEvent]) -> Self {
        let request = &record.request;
        let heading = request.kind.heading().to_string();

        let owner = SignatureBlock {
            party: "Requested by".to_string(),
            actor: Some(request.owner_staff_id.clone()),
            decision: Some("submitted".to_string()),
            date: Some(format_date(request.created_at)),
            signature: Some(request.owner_signature.clone()),
            notes: None,
        };

        let mut signatures = vec![owner];
        signatures.extend(Stage::ALL.iter().map(|stage| {
            match record.approval_for(*stage) {
                Some(a) => SignatureBlock {
                    party: stage.title().to_string(),
                    actor: Some(a.approver_id.clone()),
                    decision: Some(a.decision.to_string()),
                    date: Some(format_date(a.created_at)),
                    signature: Some(a.signature.clone()),
                    notes: a.notes.clone(),
                },
                None => SignatureBlock {
                    party: stage.title().to_string(),
                    actor: None,
                    decision: None,
                    date: None,
                    signature: None,
                    notes: None,
                },
            }
        }));

        let history = timeline
            .iter()
            .map(|e| HistoryLine {
                date: format_date(e.timestamp),
                summary: e.summary(),
                actor: e.actor_id.clone(),
            })
            .collect();

        Self {
            underline: "=".repeat(heading.chars().count()),
            heading,
            number: request.id.short(),
            id: request.id.to_string(),
            submitted: format_date(request.created_at),
            status: request.status.label().to_string(),
            title: request.title.clone(),
            amount: request.amount.map(|a| a.to_string()),
            period: request.period.map(|p| {
                format!(
                    "{} to {} ({} day{})",
                    p.start,
                    p.end,
                    p.days(),
                    if p.days() == 1 { "" } else { "s" }
                )
            }),
            description: request.description.clone(),
            signatures,
            history,
        }
    }
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}
