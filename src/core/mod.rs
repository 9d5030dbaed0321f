//! Core module - request workflow domain types and services

pub mod approval;
pub mod authz;
pub mod config;
pub mod export;
pub mod identity;
pub mod project;
pub mod request;
pub mod store;
pub mod team;
pub mod timeline;
pub mod workflow;

pub use approval::{Approval, Decision, NewApproval, Stage};
pub use authz::{AuthorizationOracle, StaticOracle, CAP_APPROVE_SALES, CAP_MANAGE_HR};
pub use config::{Config, ConfigError};
pub use export::{export_request, DocumentExporter, ExportError, TextExporter};
pub use identity::{IdParseError, RequestId};
pub use project::{Project, ProjectError};
pub use request::{
    HrRequest, LeavePeriod, NewRequest, RequestKind, RequestRecord, RequestStatus,
    ValidationError,
};
pub use store::{OwnerScope, Page, RequestFilter, RequestStore, StoreError};
pub use team::{RosterError, RosterOracle, TeamMember, TeamRoster};
pub use timeline::{build_timeline, EventKind, TimelineEvent};
pub use workflow::{is_terminal, StageDecision, WorkflowConfig, WorkflowEngine, WorkflowError};
