//! SQLite serialization for typed enums and ids
//!
//! Implements ToSql and FromSql for RequestId, RequestKind, RequestStatus,
//! Stage and Decision so rows map straight onto domain types.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::core::approval::{Decision, Stage};
use crate::core::identity::RequestId;
use crate::core::request::{RequestKind, RequestStatus};

fn invalid_data(message: String) -> FromSqlError {
    FromSqlError::Other(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

fn parse_text<T>(value: ValueRef<'_>) -> FromSqlResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.as_str()?.parse().map_err(invalid_data)
}

// =========================================================================
// RequestId
// =========================================================================

impl ToSql for RequestId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for RequestId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: crate::core::identity::IdParseError| invalid_data(e.to_string()))
    }
}

// =========================================================================
// RequestKind / RequestStatus
// =========================================================================

impl ToSql for RequestKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RequestKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

impl ToSql for RequestStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RequestStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

// =========================================================================
// Stage / Decision
// =========================================================================

impl ToSql for Stage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Stage {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

impl ToSql for Decision {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Decision {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_status_stored_as_snake_case() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE test (status TEXT)", []).unwrap();
        conn.execute(
            "INSERT INTO test VALUES (?1)",
            [&RequestStatus::SalesApproved],
        )
        .unwrap();

        let raw: String = conn
            .query_row("SELECT status FROM test", [], |row| row.get(0))
            .unwrap();
        assert_eq!(raw, "sales_approved");

        let typed: RequestStatus = conn
            .query_row("SELECT status FROM test", [], |row| row.get(0))
            .unwrap();
        assert_eq!(typed, RequestStatus::SalesApproved);
    }

    #[test]
    fn test_unknown_stage_is_conversion_error() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE test (stage TEXT)", []).unwrap();
        conn.execute("INSERT INTO test VALUES ('finance')", []).unwrap();

        let result: rusqlite::Result<Stage> =
            conn.query_row("SELECT stage FROM test", [], |row| row.get(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_request_id_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE test (id TEXT)", []).unwrap();
        let id = RequestId::new();
        conn.execute("INSERT INTO test VALUES (?1)", [&id]).unwrap();

        let back: RequestId = conn
            .query_row("SELECT id FROM test", [], |row| row.get(0))
            .unwrap();
        assert_eq!(back, id);
    }
}
