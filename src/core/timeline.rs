//! Timeline reconstruction - ordered lifecycle events for audit and export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::approval::{Approval, Decision, Stage};
use crate::core::request::{HrRequest, RequestRecord};

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    StageDecision,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Created => write!(f, "created"),
            EventKind::StageDecision => write!(f, "stage_decision"),
        }
    }
}

/// One entry of a request's timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub kind: EventKind,
    pub actor_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub signature: String,
}

impl TimelineEvent {
    fn created(request: &HrRequest) -> Self {
        Self {
            kind: EventKind::Created,
            actor_id: request.owner_staff_id.clone(),
            timestamp: request.created_at,
            stage: None,
            decision: None,
            notes: None,
            signature: request.owner_signature.clone(),
        }
    }

    fn decided(approval: &Approval) -> Self {
        Self {
            kind: EventKind::StageDecision,
            actor_id: approval.approver_id.clone(),
            timestamp: approval.created_at,
            stage: Some(approval.stage),
            decision: Some(approval.decision),
            notes: approval.notes.clone(),
            signature: approval.signature.clone(),
        }
    }

    /// Short description such as "Sales Manager approved"
    pub fn summary(&self) -> String {
        match (self.kind, self.stage, self.decision) {
            (EventKind::StageDecision, Some(stage), Some(decision)) => {
                format!("{} {}", stage.title(), decision)
            }
            _ => "Request created".to_string(),
        }
    }
}

/// Build the ordered timeline of a request.
///
/// The creation event comes first, followed by every approval in ascending
/// `created_at` order, ties broken by ledger insertion id. The result only
/// depends on the stored rows passed in.
pub fn build_timeline(request: &HrRequest, approvals: &[Approval]) -> Vec<TimelineEvent> {
    let mut ordered: Vec<&Approval> = approvals.iter().collect();
    ordered.sort_by_key(|a| (a.created_at, a.id));

    std::iter::once(TimelineEvent::created(request))
        .chain(ordered.into_iter().map(TimelineEvent::decided))
        .collect()
}

/// Timeline of a loaded record
pub fn record_timeline(record: &RequestRecord) -> Vec<TimelineEvent> {
    build_timeline(&record.request, &record.approvals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::RequestId;
    use crate::core::request::{RequestKind, RequestStatus};
    use chrono::{Duration, TimeZone};

    fn request() -> HrRequest {
        HrRequest {
            id: RequestId::new(),
            owner_staff_id: "s1".to_string(),
            kind: RequestKind::Other,
            title: "Badge".to_string(),
            description: None,
            amount: None,
            period: None,
            status: RequestStatus::HrApproved,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            owner_signature: "sig:s1".to_string(),
        }
    }

    fn approval(
        req: &HrRequest,
        id: i64,
        stage: Stage,
        offset_min: i64,
    ) -> Approval {
        Approval {
            id,
            request_id: req.id,
            approver_id: format!("a{}", id),
            stage,
            decision: Decision::Approved,
            notes: None,
            signature: format!("sig:{}", id),
            created_at: req.created_at + Duration::minutes(offset_min),
        }
    }

    #[test]
    fn test_created_event_only() {
        let req = request();
        let timeline = build_timeline(&req, &[]);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].kind, EventKind::Created);
        assert_eq!(timeline[0].actor_id, "s1");
        assert_eq!(timeline[0].timestamp, req.created_at);
        assert_eq!(timeline[0].summary(), "Request created");
    }

    #[test]
    fn test_sorted_by_time_regardless_of_input_order() {
        let req = request();
        let hr = approval(&req, 2, Stage::HrManager, 30);
        let sales = approval(&req, 1, Stage::SalesManager, 10);

        let timeline = build_timeline(&req, &[hr, sales]);
        let stages: Vec<_> = timeline.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![None, Some(Stage::SalesManager), Some(Stage::HrManager)]
        );
        assert_eq!(timeline[1].summary(), "Sales Manager approved");
    }

    #[test]
    fn test_ties_broken_by_insertion_id() {
        let req = request();
        let later_id = approval(&req, 9, Stage::HrManager, 5);
        let earlier_id = approval(&req, 4, Stage::SalesManager, 5);

        let timeline = build_timeline(&req, &[later_id, earlier_id]);
        assert_eq!(timeline[1].actor_id, "a4");
        assert_eq!(timeline[2].actor_id, "a9");
    }

    #[test]
    fn test_repeatable() {
        let req = request();
        let rows = vec![
            approval(&req, 1, Stage::SalesManager, 1),
            approval(&req, 2, Stage::HrManager, 2),
        ];
        assert_eq!(build_timeline(&req, &rows), build_timeline(&req, &rows));
    }
}
