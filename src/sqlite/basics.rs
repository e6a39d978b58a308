use super::{
    shift::{self, values_to_json, RecordListOwned, RecordOwned},
    sql::Statement,
};

use rusqlite::{params_from_iter, types, Connection};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use std::fmt;

///
/// The two categories of failures reported by the engine
/// * `Malformed` - the statement could not be prepared or its values could not be bound
/// * `Operational` - the statement was valid but failed while running,
///   e.g. a constraint violation or a locked database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementErrorKind {
    Malformed,
    Operational,
}

impl fmt::Display for StatementErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed statement"),
            Self::Operational => write!(f, "operational"),
        }
    }
}

///
/// A failed statement, carrying the statement text and the values bound to it.
/// This is meant for server side diagnostics and is never sent to clients.
#[derive(Debug, Error)]
#[error("{kind} error: {message} (query: `{sql}`)")]
pub struct StatementError {
    pub kind: StatementErrorKind,
    pub message: String,
    pub sql: String,
    pub values: Vec<types::Value>,
}

impl StatementError {
    fn from_rusqlite(stmt: &Statement, err: rusqlite::Error, preparing: bool) -> Self {
        let malformed = preparing
            || matches!(
                err,
                rusqlite::Error::InvalidParameterCount(..)
                    | rusqlite::Error::InvalidParameterName(_)
                    | rusqlite::Error::MultipleStatement
            );
        Self {
            kind: if malformed {
                StatementErrorKind::Malformed
            } else {
                StatementErrorKind::Operational
            },
            message: err.to_string(),
            sql: stmt.sql.clone(),
            values: stmt.params.clone(),
        }
    }

    ///
    /// A structured description for log lines
    pub fn json(&self) -> JsonValue {
        json!({
            "kind": self.kind.to_string(),
            "message": self.message,
            "query": self.sql,
            "values": values_to_json(&self.values),
        })
    }
}

pub type ExecResult<T> = std::result::Result<T, StatementError>;

fn trace(stmt: &Statement) {
    tracing::debug!(sql = %stmt.sql, values = %values_to_json(&stmt.params), "executing statement");
}

fn prepare<'c>(conn: &'c Connection, stmt: &Statement) -> ExecResult<rusqlite::Statement<'c>> {
    trace(stmt);
    conn.prepare(&stmt.sql)
        .map_err(|e| StatementError::from_rusqlite(stmt, e, true))
}

///
/// What a SELECT produced
/// * `Nothing` - no row matched
/// * `One` - exactly one row matched and list semantics were not asked for
/// * `Many` - every matching row
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Nothing,
    One(RecordOwned),
    Many(RecordListOwned),
}

impl Fetched {
    pub fn len(&self) -> usize {
        match self {
            Self::Nothing => 0,
            Self::One(_) => 1,
            Self::Many(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    ///
    /// A single record as an object, several as an array, nothing as an empty array
    pub fn json(&self) -> anyhow::Result<JsonValue> {
        match self {
            Self::Nothing => Ok(JsonValue::Array(vec![])),
            Self::One(record) => shift::val_to_json(record),
            Self::Many(rows) => shift::list_to_json(rows),
        }
    }
}

///
/// Run an INSERT statement
/// # Returns
/// the identifier the engine assigned to the new row
pub fn insert(conn: &Connection, stmt: &Statement) -> ExecResult<i64> {
    let mut prepared = prepare(conn, stmt)?;
    prepared
        .execute(params_from_iter(&stmt.params))
        .map_err(|e| StatementError::from_rusqlite(stmt, e, false))?;
    Ok(conn.last_insert_rowid())
}

///
/// Run a SELECT statement and return every matching row
pub fn fetch_all(conn: &Connection, stmt: &Statement) -> ExecResult<RecordListOwned> {
    let mut prepared = prepare(conn, stmt)?;
    let rows = prepared
        .query_map(params_from_iter(&stmt.params), shift::row_to_map)
        .and_then(|rows| rows.collect::<rusqlite::Result<RecordListOwned>>())
        .map_err(|e| StatementError::from_rusqlite(stmt, e, false))?;
    Ok(rows)
}

///
/// Run a SELECT statement and return the first matching row, if any
pub fn fetch_one(conn: &Connection, stmt: &Statement) -> ExecResult<Option<RecordOwned>> {
    let mut prepared = prepare(conn, stmt)?;
    let mut rows = prepared
        .query(params_from_iter(&stmt.params))
        .map_err(|e| StatementError::from_rusqlite(stmt, e, false))?;
    match rows
        .next()
        .map_err(|e| StatementError::from_rusqlite(stmt, e, false))?
    {
        Some(row) => Ok(Some(
            shift::row_to_map(row).map_err(|e| StatementError::from_rusqlite(stmt, e, false))?,
        )),
        None => Ok(None),
    }
}

///
/// Run a SELECT statement, collapsing a single row to [Fetched::One]
/// unless `force_list` is set
pub fn fetch(conn: &Connection, stmt: &Statement, force_list: bool) -> ExecResult<Fetched> {
    let mut rows = fetch_all(conn, stmt)?;
    Ok(match rows.len() {
        0 => Fetched::Nothing,
        1 if !force_list => Fetched::One(rows.remove(0)),
        _ => Fetched::Many(rows),
    })
}

///
/// Run an UPDATE, DELETE or DDL statement
/// # Returns
/// the number of affected rows
pub fn execute(conn: &Connection, stmt: &Statement) -> ExecResult<usize> {
    let mut prepared = prepare(conn, stmt)?;
    prepared
        .execute(params_from_iter(&stmt.params))
        .map_err(|e| StatementError::from_rusqlite(stmt, e, false))
}
