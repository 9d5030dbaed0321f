//! Value enums shared by CLI commands

use clap::ValueEnum;

use crate::core::approval::Stage;
use crate::core::request::{RequestKind, RequestStatus};

/// Status filter for list commands
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum StatusFilter {
    /// Awaiting sales approval
    Pending,
    /// Awaiting HR approval
    SalesApproved,
    /// Closed by a sales rejection
    SalesRejected,
    /// Closed as approved
    HrApproved,
    /// Closed by an HR rejection
    HrRejected,
    /// Any status - default
    #[default]
    All,
}

impl StatusFilter {
    /// Status to filter on, `None` for all
    pub fn status(&self) -> Option<RequestStatus> {
        match self {
            StatusFilter::Pending => Some(RequestStatus::Pending),
            StatusFilter::SalesApproved => Some(RequestStatus::SalesApproved),
            StatusFilter::SalesRejected => Some(RequestStatus::SalesRejected),
            StatusFilter::HrApproved => Some(RequestStatus::HrApproved),
            StatusFilter::HrRejected => Some(RequestStatus::HrRejected),
            StatusFilter::All => None,
        }
    }
}

/// Approval stage argument
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StageArg {
    /// Sales manager stage
    Sales,
    /// HR manager stage
    Hr,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Sales => Stage::SalesManager,
            StageArg::Hr => Stage::HrManager,
        }
    }
}

/// Request kind argument
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum KindArg {
    /// Leave with a start and end date
    Leave,
    /// Cash advance with an amount
    Advance,
    /// Anything else
    Other,
}

impl From<KindArg> for RequestKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Leave => RequestKind::Leave,
            KindArg::Advance => RequestKind::Advance,
            KindArg::Other => RequestKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_mapping() {
        assert_eq!(StatusFilter::All.status(), None);
        assert_eq!(
            StatusFilter::SalesApproved.status(),
            Some(RequestStatus::SalesApproved)
        );
    }

    #[test]
    fn test_stage_arg_parses() {
        let stage: Stage = StageArg::from_str("hr", true).unwrap().into();
        assert_eq!(stage, Stage::HrManager);
    }
}
