//! Request store and approval ledger on SQLite
//!
//! Two tables: `requests` and the append-only `approvals`. The only write
//! that touches `requests.status` is [`RequestStore::commit_decision`], which
//! appends the approval row and moves the status in one IMMEDIATE
//! transaction, guarded by a compare-and-swap on the expected prior status.

mod serialize;


use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::core::approval::{Approval, NewApproval, Stage};
use crate::core::identity::RequestId;
use crate::core::request::{HrRequest, LeavePeriod, RequestRecord, RequestStatus};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS requests (
    id              TEXT PRIMARY KEY,
    owner_staff_id  TEXT NOT NULL,
    kind            TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT,
    amount          TEXT,
    period_start    TEXT,
    period_end      TEXT,
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    owner_signature TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_owner ON requests(owner_staff_id);
CREATE INDEX IF NOT EXISTS idx_requests_created ON requests(created_at);

CREATE TABLE IF NOT EXISTS approvals (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id  TEXT NOT NULL REFERENCES requests(id),
    approver_id TEXT NOT NULL,
    stage       TEXT NOT NULL,
    decision    TEXT NOT NULL,
    notes       TEXT,
    signature   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (request_id, stage)
);

CREATE TRIGGER IF NOT EXISTS approvals_no_update
BEFORE UPDATE ON approvals
BEGIN
    SELECT RAISE(ABORT, 'approvals are append-only');
END;

CREATE TRIGGER IF NOT EXISTS approvals_no_delete
BEFORE DELETE ON approvals
BEGIN
    SELECT RAISE(ABORT, 'approvals are append-only');
END;
"#;

const REQUEST_COLUMNS: &str = "id, owner_staff_id, kind, title, description, amount, \
     period_start, period_end, status, created_at, owner_signature";

const APPROVAL_COLUMNS: &str =
    "id, request_id, approver_id, stage, decision, notes, signature, created_at";

/// Largest page a list query returns
pub const MAX_PER_PAGE: u32 = 100;

/// Default page size for list queries
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Errors from the request store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("request not found: {0}")]
    NotFound(RequestId),

    #[error("request {id} is no longer {expected}")]
    Conflict {
        id: RequestId,
        expected: RequestStatus,
    },

    /// `status` is the request status the failed transaction observed
    #[error("stage {stage} of request {id} has already been decided")]
    DuplicateStage {
        id: RequestId,
        stage: Stage,
        status: RequestStatus,
    },

    #[error("request already exists: {0}")]
    DuplicateRequest(RequestId),
}

/// Owner scope for a list query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    Owner(String),
    All,
}

/// List query parameters
#[derive(Debug, Clone)]
pub struct RequestFilter {
    pub scope: OwnerScope,
    pub status: Option<RequestStatus>,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

impl RequestFilter {
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            scope: OwnerScope::Owner(owner.into()),
            ..Self::all()
        }
    }

    pub fn all() -> Self {
        Self {
            scope: OwnerScope::All,
            status: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    fn limit(&self) -> u32 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit())
    }
}

/// A page of list results
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// A request whose stored status disagrees with its ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub id: RequestId,
    pub stored: RequestStatus,
    pub implied: RequestStatus,
}

/// Status implied by the ledger rows of one request: the latest accepted
/// decision, or Pending when there is none.
pub fn implied_status(approvals: &[Approval]) -> RequestStatus {
    approvals
        .iter()
        .max_by_key(|a| (a.created_at, a.id))
        .map(|a| a.stage.next_status(a.decision))
        .unwrap_or(RequestStatus::Pending)
}

/// SQLite-backed request store and approval ledger
pub struct RequestStore {
    conn: Mutex<Connection>,
}

impl RequestStore {
    /// Open (or create) a database file.
    ///
    /// Uses WAL journaling and waits up to `busy_timeout` for the write
    /// lock held by another connection.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves no open transaction behind:
        // rusqlite rolls back on drop.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a new request row
    pub fn insert_request(&self, request: &HrRequest) -> Result<(), StoreError> {
        let conn = self.conn();
        let result = conn.execute(
            &format!(
                "INSERT INTO requests ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                REQUEST_COLUMNS
            ),
            params![
                request.id,
                request.owner_staff_id,
                request.kind,
                request.title,
                request.description,
                request.amount.map(|a| a.to_string()),
                request.period.map(|p| format_date(p.start)),
                request.period.map(|p| format_date(p.end)),
                request.status,
                format_timestamp(request.created_at),
                request.owner_signature,
            ],
        );

        match result {
            Ok(_) => {
                debug!(request_id = %request.id, "inserted request");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateRequest(request.id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Request row alone
    pub fn get_request(&self, id: RequestId) -> Result<Option<HrRequest>, StoreError> {
        let conn = self.conn();
        Ok(select_request(&conn, id)?)
    }

    /// Request with its approvals, read in one transaction
    pub fn load(&self, id: RequestId) -> Result<Option<RequestRecord>, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let record = select_record(&tx, id)?;
        tx.commit()?;
        Ok(record)
    }

    /// Approvals of a request in ledger order
    pub fn approvals_for(&self, id: RequestId) -> Result<Vec<Approval>, StoreError> {
        let conn = self.conn();
        Ok(select_approvals(&conn, id)?)
    }

    /// Ids starting with `prefix`, in id order, at most `limit` of them
    pub fn ids_with_prefix(&self, prefix: &str, limit: u32) -> Result<Vec<RequestId>, StoreError> {
        let pattern = format!(
            "{}%",
            prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id FROM requests WHERE id LIKE ?1 ESCAPE '\\' ORDER BY id LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![pattern, limit], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<RequestId>>>()?;
        Ok(ids)
    }

    /// Newest-first page of requests
    pub fn list(&self, filter: &RequestFilter) -> Result<Page<HrRequest>, StoreError> {
        let limit = filter.limit();
        let offset = filter.offset() as i64;
        let conn = self.conn();

        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<&dyn ToSql> = Vec::new();

        if let OwnerScope::Owner(owner) = &filter.scope {
            where_sql.push_str(" AND owner_staff_id = ?");
            args.push(owner);
        }
        if let Some(status) = &filter.status {
            where_sql.push_str(" AND status = ?");
            args.push(status);
        }

        let count_sql = format!("SELECT COUNT(*) FROM requests{}", where_sql);
        let total: i64 = conn.query_row(&count_sql, args.as_slice(), |row| row.get(0))?;

        let data_sql = format!(
            "SELECT {} FROM requests{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            REQUEST_COLUMNS, where_sql
        );
        args.push(&limit);
        args.push(&offset);

        let mut stmt = conn.prepare(&data_sql)?;
        let items = stmt
            .query_map(args.as_slice(), request_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            items,
            page: filter.page.max(1),
            per_page: limit,
            total: total.max(0) as u64,
        })
    }

    /// Append a stage decision and advance the request status atomically.
    ///
    /// The next status is derived from the approval's stage and decision.
    /// The status update only applies while the request is still in
    /// `expected`; otherwise nothing is written and `Conflict` is returned.
    pub fn commit_decision(
        &self,
        approval: &NewApproval,
        expected: RequestStatus,
    ) -> Result<RequestRecord, StoreError> {
        let next = approval.stage.next_status(approval.decision);
        let id = approval.request_id;

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            "UPDATE requests SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![next, id, expected],
        )?;
        if updated == 0 {
            let exists: bool = tx
                .query_row("SELECT 1 FROM requests WHERE id = ?1", [&id], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            // Dropping the transaction rolls it back
            return Err(if exists {
                StoreError::Conflict { id, expected }
            } else {
                StoreError::NotFound(id)
            });
        }

        let inserted = tx.execute(
            "INSERT INTO approvals (request_id, approver_id, stage, decision, notes, signature, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                approval.approver_id,
                approval.stage,
                approval.decision,
                approval.notes,
                approval.signature,
                format_timestamp(approval.created_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::DuplicateStage {
                    id,
                    stage: approval.stage,
                    status: expected,
                })
            }
            Err(e) => return Err(e.into()),
        }

        let record = select_record(&tx, id)?.ok_or(StoreError::NotFound(id))?;
        tx.commit()?;

        debug!(request_id = %id, stage = %approval.stage, from = %expected, to = %next, "committed decision");
        Ok(record)
    }

    /// Requests whose stored status differs from the status their ledger
    /// implies. Empty on a healthy database.
    pub fn check_consistency(&self) -> Result<Vec<Inconsistency>, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let ids: Vec<(RequestId, RequestStatus)> = {
            let mut stmt = tx.prepare("SELECT id, status FROM requests ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut problems = Vec::new();
        for (id, stored) in ids {
            let implied = implied_status(&select_approvals(&tx, id)?);
            if implied != stored {
                problems.push(Inconsistency {
                    id,
                    stored,
                    implied,
                });
            }
        }
        tx.commit()?;
        Ok(problems)
    }
}

fn select_request(conn: &Connection, id: RequestId) -> rusqlite::Result<Option<HrRequest>> {
    conn.query_row(
        &format!("SELECT {} FROM requests WHERE id = ?1", REQUEST_COLUMNS),
        [&id],
        request_from_row,
    )
    .optional()
}

fn select_approvals(conn: &Connection, id: RequestId) -> rusqlite::Result<Vec<Approval>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM approvals WHERE request_id = ?1 ORDER BY id ASC",
        APPROVAL_COLUMNS
    ))?;
    let rows = stmt
        .query_map([&id], approval_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn select_record(conn: &Connection, id: RequestId) -> rusqlite::Result<Option<RequestRecord>> {
    let Some(request) = select_request(conn, id)? else {
        return Ok(None);
    };
    let approvals = select_approvals(conn, id)?;
    Ok(Some(RequestRecord { request, approvals }))
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<HrRequest> {
    let amount: Option<String> = row.get(5)?;
    let amount = amount
        .map(|a| {
            a.parse::<Decimal>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))
        })
        .transpose()?;

    let start: Option<String> = row.get(6)?;
    let end: Option<String> = row.get(7)?;
    let period = match (start, end) {
        (Some(start), Some(end)) => Some(LeavePeriod::new(
            parse_date(6, &start)?,
            parse_date(7, &end)?,
        )),
        _ => None,
    };

    let created_at: String = row.get(9)?;

    Ok(HrRequest {
        id: row.get(0)?,
        owner_staff_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        amount,
        period,
        status: row.get(8)?,
        created_at: parse_timestamp(9, &created_at)?,
        owner_signature: row.get(10)?,
    })
}

fn approval_from_row(row: &Row<'_>) -> rusqlite::Result<Approval> {
    let created_at: String = row.get(7)?;
    Ok(Approval {
        id: row.get(0)?,
        request_id: row.get(1)?,
        approver_id: row.get(2)?,
        stage: row.get(3)?,
        decision: row.get(4)?,
        notes: row.get(5)?,
        signature: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
    })
}

/// Fixed-width UTC timestamps so text order matches time order
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
