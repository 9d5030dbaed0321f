//! Approval ledger records - stages, decisions and the signed sign-off rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::authz::{CAP_APPROVE_SALES, CAP_MANAGE_HR};
use crate::core::identity::RequestId;
use crate::core::request::RequestStatus;

/// One of the two sequential sign-off steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SalesManager,
    HrManager,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::SalesManager, Stage::HrManager];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SalesManager => "sales_manager",
            Stage::HrManager => "hr_manager",
        }
    }

    /// Capability the deciding actor must hold for this stage
    pub fn required_capability(&self) -> &'static str {
        match self {
            Stage::SalesManager => CAP_APPROVE_SALES,
            Stage::HrManager => CAP_MANAGE_HR,
        }
    }

    /// Status the request must be in for this stage to be decided
    pub fn expected_status(&self) -> RequestStatus {
        match self {
            Stage::SalesManager => RequestStatus::Pending,
            Stage::HrManager => RequestStatus::SalesApproved,
        }
    }

    /// Status produced by a decision at this stage
    pub fn next_status(&self, decision: Decision) -> RequestStatus {
        match (self, decision) {
            (Stage::SalesManager, Decision::Approved) => RequestStatus::SalesApproved,
            (Stage::SalesManager, Decision::Rejected) => RequestStatus::SalesRejected,
            (Stage::HrManager, Decision::Approved) => RequestStatus::HrApproved,
            (Stage::HrManager, Decision::Rejected) => RequestStatus::HrRejected,
        }
    }

    /// Title used for the stage in documents and tables
    pub fn title(&self) -> &'static str {
        match self {
            Stage::SalesManager => "Sales Manager",
            Stage::HrManager => "HR Manager",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sales_manager" | "sales" => Ok(Stage::SalesManager),
            "hr_manager" | "hr" => Ok(Stage::HrManager),
            _ => Err(format!("Invalid stage: {}. Use sales or hr", s)),
        }
    }
}

/// Outcome of a stage decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approved" | "approve" => Ok(Decision::Approved),
            "rejected" | "reject" => Ok(Decision::Rejected),
            _ => Err(format!("Invalid decision: {}. Use approved or rejected", s)),
        }
    }
}

/// A committed sign-off row. Write-once: never updated or deleted.
///
/// The `signature` is the approver's consent artifact, kept as an opaque
/// reference and never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// Ledger insertion id, monotonically increasing
    pub id: i64,
    pub request_id: RequestId,
    pub approver_id: String,
    pub stage: Stage,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

/// Input for a stage decision, before the ledger assigns id and time
#[derive(Debug, Clone)]
pub struct NewApproval {
    pub request_id: RequestId,
    pub approver_id: String,
    pub stage: Stage,
    pub decision: Decision,
    pub notes: Option<String>,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(
            Stage::SalesManager.next_status(Decision::Approved),
            RequestStatus::SalesApproved
        );
        assert_eq!(
            Stage::SalesManager.next_status(Decision::Rejected),
            RequestStatus::SalesRejected
        );
        assert_eq!(
            Stage::HrManager.next_status(Decision::Approved),
            RequestStatus::HrApproved
        );
        assert_eq!(
            Stage::HrManager.next_status(Decision::Rejected),
            RequestStatus::HrRejected
        );
    }

    #[test]
    fn test_stage_gates() {
        assert_eq!(Stage::SalesManager.expected_status(), RequestStatus::Pending);
        assert_eq!(Stage::HrManager.expected_status(), RequestStatus::SalesApproved);
        assert_eq!(Stage::SalesManager.required_capability(), "approve-sales");
        assert_eq!(Stage::HrManager.required_capability(), "manage-hr");
    }

    #[test]
    fn test_stage_parse_aliases() {
        assert_eq!("sales".parse::<Stage>().unwrap(), Stage::SalesManager);
        assert_eq!("HR_MANAGER".parse::<Stage>().unwrap(), Stage::HrManager);
        assert!("finance".parse::<Stage>().is_err());
    }
}
