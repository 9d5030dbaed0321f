//! Workflow engine for HR request creation and stage decisions
//!
//! A request moves Pending → (sales decision) → SalesApproved → (HR decision)
//! → HrApproved/HrRejected, or stops at SalesRejected. Every decision is
//! validated against the current stored state and a fresh capability query,
//! then committed through the store's compare-and-swap transaction.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::approval::{Decision, NewApproval, Stage};
use crate::core::authz::{AuthorizationOracle, REVIEWER_CAPABILITIES};
use crate::core::identity::RequestId;
use crate::core::request::{
    HrRequest, NewRequest, RequestRecord, RequestStatus, ValidationError,
};
use crate::core::store::{OwnerScope, Page, RequestFilter, RequestStore, StoreError};
use crate::core::timeline::{record_timeline, TimelineEvent};

/// Workflow policy from project config
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Refuse an HR decision from the actor who decided the sales stage
    pub require_distinct_approvers: bool,

    /// How long to wait for another writer's database lock (milliseconds)
    pub busy_timeout_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            require_distinct_approvers: false,
            busy_timeout_ms: 5000,
        }
    }
}

impl WorkflowConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Errors that can occur during workflow operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Request not found: {0}")]
    NotFound(RequestId),

    #[error("Authorization denied for {actor}: {reason}")]
    Unauthorized { actor: String, reason: String },

    #[error("Request {id} is {status}: {reason}")]
    InvalidState {
        id: RequestId,
        status: RequestStatus,
        reason: String,
    },

    #[error("Request {id} changed while deciding (expected {expected}); reload and decide again")]
    Conflict {
        id: RequestId,
        expected: RequestStatus,
    },

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl WorkflowError {
    /// Only a lost race is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Conflict { .. })
    }

    /// Offending field of a validation failure
    pub fn field(&self) -> Option<&'static str> {
        match self {
            WorkflowError::Validation(e) => Some(e.field),
            _ => None,
        }
    }

    fn missing_capability(actor: &str, capability: &str) -> Self {
        WorkflowError::Unauthorized {
            actor: actor.to_string(),
            reason: format!("requires capability '{}'", capability),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WorkflowError::NotFound(id),
            StoreError::Conflict { id, expected } => WorkflowError::Conflict { id, expected },
            StoreError::DuplicateStage { id, stage, status } => WorkflowError::InvalidState {
                id,
                status,
                reason: format!("stage {} has already been decided", stage),
            },
            other => WorkflowError::Store(other),
        }
    }
}

/// Whether no further decision can be made from `status`
pub fn is_terminal(status: RequestStatus) -> bool {
    status.is_terminal()
}

/// A stage decision by one actor
#[derive(Debug, Clone)]
pub struct StageDecision {
    pub request_id: RequestId,
    pub actor_id: String,
    pub stage: Stage,
    pub decision: Decision,
    pub notes: Option<String>,
    pub signature: String,
}

impl StageDecision {
    pub fn new(
        request_id: RequestId,
        actor_id: impl Into<String>,
        stage: Stage,
        decision: Decision,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            actor_id: actor_id.into(),
            stage,
            decision,
            notes: None,
            signature: signature.into(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Workflow engine over a request store and an authorization oracle
pub struct WorkflowEngine<O> {
    store: RequestStore,
    oracle: O,
    config: WorkflowConfig,
}

impl<O: AuthorizationOracle> WorkflowEngine<O> {
    pub fn new(store: RequestStore, oracle: O, config: WorkflowConfig) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    pub fn store(&self) -> &RequestStore {
        &self.store
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Validate and persist a new request in Pending status
    pub fn create_request(&self, input: NewRequest) -> Result<HrRequest, WorkflowError> {
        input.validate()?;
        let input = input.normalized();

        let request = HrRequest {
            id: RequestId::new(),
            owner_staff_id: input.owner_staff_id,
            kind: input.kind,
            title: input.title,
            description: input.description,
            amount: input.amount,
            period: input.period,
            status: RequestStatus::Pending,
            created_at: now(),
            owner_signature: input.signature,
        };
        self.store.insert_request(&request)?;

        info!(
            request_id = %request.id,
            owner = %request.owner_staff_id,
            kind = %request.kind,
            "request created"
        );
        Ok(request)
    }

    /// Record a stage decision and advance the request status.
    ///
    /// Checks run against freshly loaded state in this order: input,
    /// existence, terminal status, stage/status match, stage not yet decided,
    /// approver policy, capability. The commit itself re-checks the status
    /// and fails with `Conflict` if another decision landed in between.
    pub fn decide(&self, input: StageDecision) -> Result<HrRequest, WorkflowError> {
        if input.actor_id.trim().is_empty() {
            return Err(ValidationError::new("actor", "actor id is empty").into());
        }
        if input.signature.trim().is_empty() {
            return Err(ValidationError::new("signature", "approver signature is required").into());
        }

        let id = input.request_id;
        let record = self.store.load(id)?.ok_or(WorkflowError::NotFound(id))?;
        let status = record.request.status;

        self.check_stage_open(&record, input.stage)?;
        self.check_policy(&record, &input.actor_id, input.stage)?;

        let capability = input.stage.required_capability();
        if !self.oracle.has_capability(&input.actor_id, capability) {
            warn!(request_id = %id, actor = %input.actor_id, stage = %input.stage, capability, "decision denied");
            return Err(WorkflowError::missing_capability(&input.actor_id, capability));
        }

        let approval = NewApproval {
            request_id: id,
            approver_id: input.actor_id.clone(),
            stage: input.stage,
            decision: input.decision,
            notes: input
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            signature: input.signature,
            created_at: not_before(now(), latest_timestamp(&record)),
        };

        let committed = match self.store.commit_decision(&approval, status) {
            Ok(record) => record,
            Err(e) => {
                let err = WorkflowError::from(e);
                if err.is_retryable() {
                    warn!(request_id = %id, actor = %input.actor_id, stage = %input.stage, "decision lost a concurrent race");
                }
                return Err(err);
            }
        };

        info!(
            request_id = %id,
            actor = %input.actor_id,
            stage = %input.stage,
            decision = %input.decision,
            status = %committed.request.status,
            "decision committed"
        );
        Ok(committed.request)
    }

    /// Request with approvals; visible to its owner and to reviewers
    pub fn get_request(&self, id: RequestId, caller: &str) -> Result<RequestRecord, WorkflowError> {
        let record = self.load(id)?;
        if record.request.owner_staff_id != caller
            && !self.oracle.has_any_capability(caller, &REVIEWER_CAPABILITIES)
        {
            return Err(WorkflowError::Unauthorized {
                actor: caller.to_string(),
                reason: format!("may not view request {}", id),
            });
        }
        Ok(record)
    }

    /// Request with approvals, no visibility check
    pub fn load(&self, id: RequestId) -> Result<RequestRecord, WorkflowError> {
        self.store.load(id)?.ok_or(WorkflowError::NotFound(id))
    }

    /// Page of requests. Listing anyone else's requests requires a reviewer
    /// capability.
    pub fn list_requests(
        &self,
        caller: &str,
        filter: &RequestFilter,
    ) -> Result<Page<HrRequest>, WorkflowError> {
        let own = matches!(&filter.scope, OwnerScope::Owner(owner) if owner == caller);
        if !own && !self.oracle.has_any_capability(caller, &REVIEWER_CAPABILITIES) {
            return Err(WorkflowError::Unauthorized {
                actor: caller.to_string(),
                reason: "listing other staff requests requires 'manage-hr' or 'approve-sales'"
                    .to_string(),
            });
        }
        Ok(self.store.list(filter)?)
    }

    /// Ordered lifecycle events of a request
    pub fn timeline(&self, id: RequestId) -> Result<Vec<TimelineEvent>, WorkflowError> {
        Ok(record_timeline(&self.load(id)?))
    }

    /// The stage `actor` could decide right now, if any. Advisory only:
    /// `decide` repeats every check.
    pub fn available_stage(&self, record: &RequestRecord, actor: &str) -> Option<Stage> {
        let stage = record.request.status.awaiting_stage()?;
        self.check_stage_open(record, stage).ok()?;
        self.check_policy(record, actor, stage).ok()?;
        self.oracle
            .has_capability(actor, stage.required_capability())
            .then_some(stage)
    }

    fn check_stage_open(&self, record: &RequestRecord, stage: Stage) -> Result<(), WorkflowError> {
        let request = &record.request;
        let status = request.status;

        if status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                id: request.id,
                status,
                reason: "request is closed, no further decisions are accepted".to_string(),
            });
        }
        if status != stage.expected_status() {
            return Err(WorkflowError::InvalidState {
                id: request.id,
                status,
                reason: format!(
                    "stage {} requires status {}",
                    stage,
                    stage.expected_status()
                ),
            });
        }
        if record.approval_for(stage).is_some() {
            return Err(WorkflowError::InvalidState {
                id: request.id,
                status,
                reason: format!("stage {} has already been decided", stage),
            });
        }
        Ok(())
    }

    fn check_policy(
        &self,
        record: &RequestRecord,
        actor: &str,
        stage: Stage,
    ) -> Result<(), WorkflowError> {
        if !self.config.require_distinct_approvers || stage != Stage::HrManager {
            return Ok(());
        }
        match record.approval_for(Stage::SalesManager) {
            Some(sales) if sales.approver_id == actor => Err(WorkflowError::Unauthorized {
                actor: actor.to_string(),
                reason: "the sales-stage approver may not also decide the HR stage".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Current time at the store's microsecond precision
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn latest_timestamp(record: &RequestRecord) -> DateTime<Utc> {
    record
        .approvals
        .iter()
        .map(|a| a.created_at)
        .fold(record.request.created_at, |a, b| a.max(b))
}

/// Keep event times monotonic per request even if the clock steps back
fn not_before(ts: DateTime<Utc>, floor: DateTime<Utc>) -> DateTime<Utc> {
    ts.max(floor)
}
