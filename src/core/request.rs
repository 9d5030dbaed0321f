//! HR request records and creation-time validation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::approval::{Approval, Stage};
use crate::core::identity::RequestId;

/// Kind of HR request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Leave,
    Advance,
    Other,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Leave => "leave",
            RequestKind::Advance => "advance",
            RequestKind::Other => "other",
        }
    }

    /// Document heading for this kind of request
    pub fn heading(&self) -> &'static str {
        match self {
            RequestKind::Leave => "Leave Request",
            RequestKind::Advance => "Cash Advance Request",
            RequestKind::Other => "Other Request",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "leave" => Ok(RequestKind::Leave),
            "advance" => Ok(RequestKind::Advance),
            "other" => Ok(RequestKind::Other),
            _ => Err(format!(
                "Invalid request kind: {}. Use leave, advance, or other",
                s
            )),
        }
    }
}

/// Lifecycle status of a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    SalesApproved,
    SalesRejected,
    HrApproved,
    HrRejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::SalesApproved,
        RequestStatus::SalesRejected,
        RequestStatus::HrApproved,
        RequestStatus::HrRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::SalesApproved => "sales_approved",
            RequestStatus::SalesRejected => "sales_rejected",
            RequestStatus::HrApproved => "hr_approved",
            RequestStatus::HrRejected => "hr_rejected",
        }
    }

    /// No further transition is permitted from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::SalesRejected | RequestStatus::HrApproved | RequestStatus::HrRejected
        )
    }

    /// The stage whose decision is awaited, if any
    pub fn awaiting_stage(&self) -> Option<Stage> {
        match self {
            RequestStatus::Pending => Some(Stage::SalesManager),
            RequestStatus::SalesApproved => Some(Stage::HrManager),
            _ => None,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "awaiting sales approval",
            RequestStatus::SalesApproved => "awaiting HR approval",
            RequestStatus::SalesRejected => "rejected by sales",
            RequestStatus::HrApproved => "approved",
            RequestStatus::HrRejected => "rejected by HR",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "sales_approved" => Ok(RequestStatus::SalesApproved),
            "sales_rejected" => Ok(RequestStatus::SalesRejected),
            "hr_approved" => Ok(RequestStatus::HrApproved),
            "hr_rejected" => Ok(RequestStatus::HrRejected),
            _ => Err(format!(
                "Invalid request status: {}. Use pending, sales_approved, sales_rejected, hr_approved, or hr_rejected",
                s
            )),
        }
    }
}

/// Inclusive date range of a leave request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LeavePeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of calendar days covered, counting both ends
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// A persisted HR request.
///
/// Everything except `status` is fixed at creation; `status` is only ever
/// written by the store's decision commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrRequest {
    pub id: RequestId,
    pub owner_staff_id: String,
    pub kind: RequestKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<LeavePeriod>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub owner_signature: String,
}

impl HrRequest {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A request together with its ledger rows, in ledger order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request: HrRequest,
    pub approvals: Vec<Approval>,
}

impl RequestRecord {
    /// Ledger row for a stage, if that stage has been decided
    pub fn approval_for(&self, stage: Stage) -> Option<&Approval> {
        self.approvals.iter().find(|a| a.stage == stage)
    }
}

/// Creation-time rejection naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Input for creating a request
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub owner_staff_id: String,
    pub kind: RequestKind,
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub period: Option<LeavePeriod>,
    pub signature: String,
}

impl NewRequest {
    pub fn new(
        owner_staff_id: impl Into<String>,
        kind: RequestKind,
        title: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            owner_staff_id: owner_staff_id.into(),
            kind,
            title: title.into(),
            description: None,
            amount: None,
            period: None,
            signature: signature.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.period = Some(LeavePeriod::new(start, end));
        self
    }

    /// Check kind-specific field rules
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner_staff_id.trim().is_empty() {
            return Err(ValidationError::new("owner", "owner staff id is empty"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "title must not be empty"));
        }
        if self.signature.trim().is_empty() {
            return Err(ValidationError::new(
                "signature",
                "owner signature is required",
            ));
        }

        match self.kind {
            RequestKind::Advance => match self.amount {
                None => {
                    return Err(ValidationError::new(
                        "amount",
                        "advance requests require an amount",
                    ))
                }
                Some(amount) if amount <= Decimal::ZERO => {
                    return Err(ValidationError::new(
                        "amount",
                        format!("amount must be greater than zero (got {})", amount),
                    ))
                }
                Some(_) => {}
            },
            RequestKind::Leave => match self.period {
                None => {
                    return Err(ValidationError::new(
                        "period",
                        "leave requests require a start and end date",
                    ))
                }
                Some(period) if period.start > period.end => {
                    return Err(ValidationError::new(
                        "period",
                        format!(
                            "start date {} is after end date {}",
                            period.start, period.end
                        ),
                    ))
                }
                Some(_) => {}
            },
            RequestKind::Other => {}
        }

        Ok(())
    }

    /// Normalize optional fields: trim text, drop blank descriptions, and
    /// keep only the fields that belong to this kind.
    pub(crate) fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if self.kind != RequestKind::Advance {
            self.amount = None;
        }
        if self.kind != RequestKind::Leave {
            self.period = None;
        }
        self
    }
}
