//! Workflow engine tests against the library API
//!
//! Covers the transition table, closed requests, per-stage uniqueness, stage
//! order, capability freshness, concurrent decisions and timeline rebuilds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use hrw::core::approval::{Decision, Stage};
use hrw::core::authz::{AuthorizationOracle, StaticOracle, CAP_APPROVE_SALES, CAP_MANAGE_HR};
use hrw::core::export::{export_request, ExportError, TextExporter};
use hrw::core::request::{HrRequest, NewRequest, RequestKind, RequestStatus};
use hrw::core::store::{RequestFilter, RequestStore};
use hrw::core::team::{RosterOracle, TeamMember, TeamRoster};
use hrw::core::timeline::EventKind;
use hrw::core::workflow::{StageDecision, WorkflowConfig, WorkflowEngine, WorkflowError};

fn oracle() -> StaticOracle {
    StaticOracle::new()
        .with_grant("m1", CAP_APPROVE_SALES)
        .with_grant("m2", CAP_APPROVE_SALES)
        .with_grant("h1", CAP_MANAGE_HR)
        .with_grant("h2", CAP_MANAGE_HR)
}

fn engine() -> WorkflowEngine<StaticOracle> {
    WorkflowEngine::new(
        RequestStore::open_in_memory().unwrap(),
        oracle(),
        WorkflowConfig::default(),
    )
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn leave<O: AuthorizationOracle>(engine: &WorkflowEngine<O>, owner: &str) -> HrRequest {
    engine
        .create_request(
            NewRequest::new(owner, RequestKind::Leave, "Annual leave", format!("sig:{}", owner))
                .with_period(date(2024, 8, 5), date(2024, 8, 9)),
        )
        .unwrap()
}

fn decision(request: &HrRequest, actor: &str, stage: Stage, decision: Decision) -> StageDecision {
    StageDecision::new(request.id, actor, stage, decision, format!("sig:{}", actor))
}

fn status_of<O: AuthorizationOracle>(engine: &WorkflowEngine<O>, request: &HrRequest) -> RequestStatus {
    engine.load(request.id).unwrap().request.status
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_create_starts_pending_with_no_approvals() {
    let engine = engine();
    let request = engine
        .create_request(
            NewRequest::new("s1", RequestKind::Advance, "Travel", "sig:s1")
                .with_amount(Decimal::new(25000, 2)),
        )
        .unwrap();

    assert_eq!(request.status, RequestStatus::Pending);
    let record = engine.load(request.id).unwrap();
    assert!(record.approvals.is_empty());
    assert_eq!(record.request.amount, Some(Decimal::new(25000, 2)));
}

#[test]
fn test_zero_amount_advance_rejected() {
    let engine = engine();
    let err = engine
        .create_request(
            NewRequest::new("s1", RequestKind::Advance, "Travel", "sig:s1")
                .with_amount(Decimal::ZERO),
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert_eq!(err.field(), Some("amount"));
    assert_eq!(
        engine.list_requests("s1", &RequestFilter::owner("s1")).unwrap().total,
        0
    );
}

#[test]
fn test_reversed_leave_period_rejected() {
    let engine = engine();
    let err = engine
        .create_request(
            NewRequest::new("s1", RequestKind::Leave, "Holiday", "sig:s1")
                .with_period(date(2024, 2, 10), date(2024, 2, 5)),
        )
        .unwrap_err();
    assert_eq!(err.field(), Some("period"));
    assert_eq!(
        engine.list_requests("s1", &RequestFilter::owner("s1")).unwrap().total,
        0
    );
}

#[test]
fn test_create_rejects_invalid_input_without_writing() {
    let engine = engine();
    let err = engine
        .create_request(NewRequest::new("s1", RequestKind::Advance, "Travel", "sig"))
        .unwrap_err();
    assert_eq!(err.field(), Some("amount"));

    let page = engine
        .list_requests("s1", &RequestFilter::owner("s1"))
        .unwrap();
    assert_eq!(page.total, 0);
}

// ============================================================================
// Transition table
// ============================================================================

#[test]
fn test_every_path_follows_transition_table() {
    let paths: [(&[(Stage, Decision)], RequestStatus); 3] = [
        (
            &[(Stage::SalesManager, Decision::Rejected)],
            RequestStatus::SalesRejected,
        ),
        (
            &[
                (Stage::SalesManager, Decision::Approved),
                (Stage::HrManager, Decision::Approved),
            ],
            RequestStatus::HrApproved,
        ),
        (
            &[
                (Stage::SalesManager, Decision::Approved),
                (Stage::HrManager, Decision::Rejected),
            ],
            RequestStatus::HrRejected,
        ),
    ];

    for (steps, expected) in paths {
        let engine = engine();
        let request = leave(&engine, "s1");
        let mut previous = RequestStatus::Pending;

        for (stage, choice) in steps {
            let actor = match stage {
                Stage::SalesManager => "m1",
                Stage::HrManager => "h1",
            };
            let updated = engine
                .decide(decision(&request, actor, *stage, *choice))
                .unwrap();
            assert_eq!(stage.expected_status(), previous);
            assert_eq!(updated.status, stage.next_status(*choice));
            previous = updated.status;
        }

        assert_eq!(previous, expected);
        assert!(previous.is_terminal());
        assert_eq!(engine.load(request.id).unwrap().approvals.len(), steps.len());
    }
}

#[test]
fn test_closed_requests_accept_no_decisions() {
    let engine = engine();

    let sales_rejected = leave(&engine, "s1");
    engine
        .decide(decision(&sales_rejected, "m1", Stage::SalesManager, Decision::Rejected))
        .unwrap();

    let hr_approved = leave(&engine, "s1");
    engine
        .decide(decision(&hr_approved, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap();
    engine
        .decide(decision(&hr_approved, "h1", Stage::HrManager, Decision::Approved))
        .unwrap();

    let hr_rejected = leave(&engine, "s1");
    engine
        .decide(decision(&hr_rejected, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap();
    engine
        .decide(decision(&hr_rejected, "h1", Stage::HrManager, Decision::Rejected))
        .unwrap();
    assert_eq!(status_of(&engine, &hr_rejected), RequestStatus::HrRejected);

    for request in [&sales_rejected, &hr_approved, &hr_rejected] {
        let before = engine.load(request.id).unwrap();
        for stage in Stage::ALL {
            for choice in [Decision::Approved, Decision::Rejected] {
                for actor in ["m1", "h1", "s1"] {
                    let err = engine
                        .decide(decision(request, actor, stage, choice))
                        .unwrap_err();
                    assert!(
                        matches!(err, WorkflowError::InvalidState { .. }),
                        "expected InvalidState, got {:?}",
                        err
                    );
                }
            }
        }
        assert_eq!(engine.load(request.id).unwrap(), before);
    }
}

#[test]
fn test_stage_decided_at_most_once() {
    let engine = engine();
    let request = leave(&engine, "s1");
    engine
        .decide(decision(&request, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap();

    let err = engine
        .decide(decision(&request, "m2", Stage::SalesManager, Decision::Rejected))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));

    let record = engine.load(request.id).unwrap();
    assert_eq!(record.approvals.len(), 1);
    assert_eq!(record.approvals[0].approver_id, "m1");
    assert_eq!(record.request.status, RequestStatus::SalesApproved);
}

#[test]
fn test_hr_stage_requires_sales_approval_first() {
    let engine = engine();
    let request = leave(&engine, "s1");

    let err = engine
        .decide(decision(&request, "h1", Stage::HrManager, Decision::Approved))
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidState {
            status: RequestStatus::Pending,
            ..
        }
    ));
    assert!(engine.load(request.id).unwrap().approvals.is_empty());
}

#[test]
fn test_unknown_request_not_found() {
    let engine = engine();
    let ghost = HrRequest {
        id: hrw::core::identity::RequestId::new(),
        ..leave(&engine, "s1")
    };
    let err = engine
        .decide(decision(&ghost, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(id) if id == ghost.id));
}

#[test]
fn test_blank_approver_signature_rejected() {
    let engine = engine();
    let request = leave(&engine, "s1");
    let err = engine
        .decide(StageDecision::new(
            request.id,
            "m1",
            Stage::SalesManager,
            Decision::Approved,
            "",
        ))
        .unwrap_err();
    assert_eq!(err.field(), Some("signature"));
    assert_eq!(status_of(&engine, &request), RequestStatus::Pending);
}

// ============================================================================
// Authorization freshness
// ============================================================================

#[test]
fn test_revocation_applies_to_next_decision() {
    let engine = engine();
    let request = leave(&engine, "s1");
    engine
        .decide(decision(&request, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap();

    engine.oracle().revoke("h1", CAP_MANAGE_HR);
    let err = engine
        .decide(decision(&request, "h1", Stage::HrManager, Decision::Approved))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized { .. }));
    assert_eq!(status_of(&engine, &request), RequestStatus::SalesApproved);

    engine.oracle().grant("h1", CAP_MANAGE_HR);
    engine
        .decide(decision(&request, "h1", Stage::HrManager, Decision::Approved))
        .unwrap();
    assert_eq!(status_of(&engine, &request), RequestStatus::HrApproved);
}

#[test]
fn test_roster_file_edits_are_seen_without_restart() {
    let tmp = TempDir::new().unwrap();
    let team_path = tmp.path().join("team.yaml");
    let roster = TeamRoster {
        members: vec![TeamMember::new("m1", "Mira").with_capability(CAP_APPROVE_SALES)],
    };
    roster.save(&team_path).unwrap();

    let engine = WorkflowEngine::new(
        RequestStore::open_in_memory().unwrap(),
        RosterOracle::new(&team_path),
        WorkflowConfig::default(),
    );
    let first = leave(&engine, "s1");
    let second = leave(&engine, "s1");

    engine
        .decide(decision(&first, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap();

    let mut revoked = roster.clone();
    revoked.members[0].active = false;
    revoked.save(&team_path).unwrap();

    let err = engine
        .decide(decision(&second, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized { .. }));
}

// ============================================================================
// Concurrency
// ============================================================================

/// Holds every capability query until all racing deciders have reached it,
/// so each has already passed its state checks against the same snapshot.
struct GateOracle {
    inner: StaticOracle,
    gate: Arc<Barrier>,
}

impl AuthorizationOracle for GateOracle {
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool {
        self.gate.wait();
        self.inner.has_capability(actor_id, capability)
    }
}

fn racing_engines(tmp: &TempDir, n: usize) -> Vec<WorkflowEngine<GateOracle>> {
    let path = tmp.path().join("requests.db");
    let gate = Arc::new(Barrier::new(n));
    (0..n)
        .map(|_| {
            WorkflowEngine::new(
                RequestStore::open(&path, Duration::from_secs(10)).unwrap(),
                GateOracle {
                    inner: oracle(),
                    gate: Arc::clone(&gate),
                },
                WorkflowConfig::default(),
            )
        })
        .collect()
}

#[test]
fn test_concurrent_sales_decisions_one_wins() {
    let tmp = TempDir::new().unwrap();
    let request = {
        let setup = WorkflowEngine::new(
            RequestStore::open(&tmp.path().join("requests.db"), Duration::from_secs(10)).unwrap(),
            oracle(),
            WorkflowConfig::default(),
        );
        leave(&setup, "s1")
    };

    let engines = racing_engines(&tmp, 2);
    let choices = [("m1", Decision::Approved), ("m2", Decision::Rejected)];

    let results: Vec<Result<HrRequest, WorkflowError>> = thread::scope(|scope| {
        let handles: Vec<_> = engines
            .iter()
            .zip(choices)
            .map(|(engine, (actor, choice))| {
                let input = decision(&request, actor, Stage::SalesManager, choice);
                scope.spawn(move || engine.decide(input))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<&HrRequest> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let losers: Vec<&WorkflowError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(winners.len(), 1, "results: {:?}", results);
    assert_eq!(losers.len(), 1);
    assert!(losers[0].is_retryable(), "loser got {:?}", losers[0]);

    let record = engines[0].load(request.id).unwrap();
    assert_eq!(record.approvals.len(), 1);
    assert_eq!(record.request.status, winners[0].status);
    assert_eq!(
        record.request.status,
        Stage::SalesManager.next_status(record.approvals[0].decision)
    );
    assert!(engines[0].store().check_consistency().unwrap().is_empty());
}

#[test]
fn test_concurrent_hr_decisions_one_wins() {
    let tmp = TempDir::new().unwrap();
    let request = {
        let setup = WorkflowEngine::new(
            RequestStore::open(&tmp.path().join("requests.db"), Duration::from_secs(10)).unwrap(),
            oracle(),
            WorkflowConfig::default(),
        );
        let request = leave(&setup, "s1");
        setup
            .decide(decision(&request, "m1", Stage::SalesManager, Decision::Approved))
            .unwrap();
        request
    };

    let engines = racing_engines(&tmp, 2);
    let results: Vec<Result<HrRequest, WorkflowError>> = thread::scope(|scope| {
        let handles: Vec<_> = engines
            .iter()
            .zip(["h1", "h2"])
            .map(|(engine, actor)| {
                let input = decision(&request, actor, Stage::HrManager, Decision::Approved);
                scope.spawn(move || engine.decide(input))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, WorkflowError::Conflict { .. })));

    let record = engines[1].load(request.id).unwrap();
    assert_eq!(record.approvals.len(), 2);
    assert_eq!(record.request.status, RequestStatus::HrApproved);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_happy_path() {
    let engine = engine();
    let request = engine
        .create_request(
            NewRequest::new("s1", RequestKind::Leave, "Winter break", "sig:s1")
                .with_period(date(2024, 1, 10), date(2024, 1, 15)),
        )
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);

    let after_sales = engine
        .decide(decision(&request, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap();
    assert_eq!(after_sales.status, RequestStatus::SalesApproved);

    let after_hr = engine
        .decide(decision(&request, "h1", Stage::HrManager, Decision::Approved))
        .unwrap();
    assert_eq!(after_hr.status, RequestStatus::HrApproved);

    let timeline = engine.timeline(request.id).unwrap();
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0].kind, EventKind::Created);
    assert_eq!(timeline[0].actor_id, "s1");
    assert_eq!(timeline[1].stage, Some(Stage::SalesManager));
    assert_eq!(timeline[1].actor_id, "m1");
    assert_eq!(timeline[2].stage, Some(Stage::HrManager));
    assert_eq!(timeline[2].actor_id, "h1");
    assert!(timeline.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_scenario_sales_rejection_is_final() {
    let engine = engine();
    let request = engine
        .create_request(
            NewRequest::new("s1", RequestKind::Advance, "Conference travel", "sig:s1")
                .with_amount(Decimal::new(1500, 0)),
        )
        .unwrap();

    engine
        .decide(decision(&request, "m1", Stage::SalesManager, Decision::Rejected))
        .unwrap();
    assert_eq!(status_of(&engine, &request), RequestStatus::SalesRejected);

    let err = engine
        .decide(decision(&request, "h1", Stage::HrManager, Decision::Approved))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));

    let record = engine.load(request.id).unwrap();
    assert_eq!(record.request.status, RequestStatus::SalesRejected);
    assert!(record.approval_for(Stage::HrManager).is_none());
}

#[test]
fn test_scenario_unauthorized_actor() {
    let engine = engine();
    let request = leave(&engine, "s1");

    let err = engine
        .decide(decision(&request, "s1", Stage::SalesManager, Decision::Approved))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized { ref actor, .. } if actor == "s1"));

    let record = engine.load(request.id).unwrap();
    assert_eq!(record.request.status, RequestStatus::Pending);
    assert!(record.approvals.is_empty());
}

// ============================================================================
// Timeline
// ============================================================================

#[test]
fn test_timeline_rebuilds_identically() {
    let engine = engine();
    let request = leave(&engine, "s1");
    engine
        .decide(
            decision(&request, "m1", Stage::SalesManager, Decision::Approved)
                .with_notes("Covered by Jo"),
        )
        .unwrap();

    let first = engine.timeline(request.id).unwrap();
    let second = engine.timeline(request.id).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[1].notes.as_deref(), Some("Covered by Jo"));
    assert_eq!(first[1].signature, "sig:m1");
}

// ============================================================================
// Visibility and listing
// ============================================================================

#[test]
fn test_get_request_visibility() {
    let engine = engine();
    let request = leave(&engine, "s1");

    assert!(engine.get_request(request.id, "s1").is_ok());
    assert!(engine.get_request(request.id, "m1").is_ok());
    assert!(engine.get_request(request.id, "h1").is_ok());
    assert!(matches!(
        engine.get_request(request.id, "s2"),
        Err(WorkflowError::Unauthorized { .. })
    ));
}

#[test]
fn test_list_scope_permissions() {
    let engine = engine();
    leave(&engine, "s1");
    leave(&engine, "s2");

    let own = engine
        .list_requests("s1", &RequestFilter::owner("s1"))
        .unwrap();
    assert_eq!(own.total, 1);

    assert!(matches!(
        engine.list_requests("s1", &RequestFilter::all()),
        Err(WorkflowError::Unauthorized { .. })
    ));
    assert!(matches!(
        engine.list_requests("s1", &RequestFilter::owner("s2")),
        Err(WorkflowError::Unauthorized { .. })
    ));

    let all = engine.list_requests("m1", &RequestFilter::all()).unwrap();
    assert_eq!(all.total, 2);
}

// ============================================================================
// Export gate
// ============================================================================

#[test]
fn test_export_gate() {
    let engine = engine();
    let exporter = TextExporter::new().unwrap();
    let request = leave(&engine, "s1");

    for caller in ["s2", "s1", "m1"] {
        assert!(matches!(
            export_request(&engine, &exporter, request.id, caller),
            Err(ExportError::Unauthorized { .. })
        ));
    }
    assert!(matches!(
        export_request(&engine, &exporter, hrw::core::identity::RequestId::new(), "s2"),
        Err(ExportError::Unauthorized { .. })
    ));
    assert!(matches!(
        export_request(&engine, &exporter, request.id, "h1"),
        Err(ExportError::NotTerminal { .. })
    ));

    engine
        .decide(decision(&request, "m1", Stage::SalesManager, Decision::Approved))
        .unwrap();
    engine
        .decide(decision(&request, "h1", Stage::HrManager, Decision::Rejected))
        .unwrap();

    assert!(matches!(
        export_request(&engine, &exporter, request.id, "m1"),
        Err(ExportError::Unauthorized { .. })
    ));

    let bytes = export_request(&engine, &exporter, request.id, "h1").unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("LEAVE REQUEST"));
    assert!(text.contains("rejected by HR"));
    assert!(text.contains("sig:h1"));
}
