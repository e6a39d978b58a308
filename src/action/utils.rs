use crate::{
    credential::CredentialHasher,
    sqlite::{
        decompose::FILTER_KEY,
        filter::{compile_filter_with, FilterPolicy},
        schema::TableSchema,
        sql::{equality_clause, WhereConfigOwned},
    },
};

use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

///
/// What a route handler needs from the outside world for one request
/// # Fields
/// * `conn` - the connection held for this request
/// * `hasher` - the credential capability used for the users table
/// * `filter_policy` - how much of a caller's expression is trusted
pub struct RouteContext<'a> {
    pub conn: &'a Connection,
    pub hasher: &'a dyn CredentialHasher,
    pub filter_policy: FilterPolicy,
}

///
/// The outcome of a route
/// * `Json` - a regular answer, validation failures included
/// * `NotFound` - the path names no command
/// * `Failed` - something went wrong on the server, details are only logged
/// * `Redirect` - the command moved to another path
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(JsonValue),
    NotFound(JsonValue),
    Failed,
    Redirect(String),
}

impl Reply {
    ///
    /// The JSON body sent to the client
    pub fn body(&self) -> JsonValue {
        match self {
            Self::Json(body) | Self::NotFound(body) => body.clone(),
            Self::Failed => json!({ "message": "internal error" }),
            Self::Redirect(location) => json!({ "message": "moved", "location": location }),
        }
    }

    pub fn message(&self) -> Option<String> {
        self.body()["message"].as_str().map(str::to_string)
    }
}

///
/// A request the translation layer refused to turn into a statement,
/// e.g. a bad identifier or an expression outside the allow-list.
/// Its message is safe to show to the caller.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Rejected(pub String);

pub(crate) fn rejected(err: anyhow::Error) -> anyhow::Error {
    anyhow::Error::new(Rejected(err.to_string()))
}

///
/// The answer given whenever a route names a table that doesn't exist
pub fn catalog_reply(catalog: &[TableSchema]) -> Reply {
    Reply::Json(json!({
        "message": "active tables in the database",
        "tables": catalog.iter().map(TableSchema::json).collect::<Vec<_>>(),
    }))
}

///
/// The columns that may select rows, plus the filter slot, as shown in validation replies
pub(crate) fn query_params(schema: &TableSchema, columns: &[&str]) -> JsonValue {
    let mut params = schema.type_map(columns);
    if let Some(map) = params.as_object_mut() {
        map.insert(FILTER_KEY.to_string(), json!("<expression>"));
    }
    params
}

///
/// Build the condition of a statement from column equalities and an optional filter
/// # Arguments
/// * `ctx` - decides the filter policy
/// * `schema` - the target table
/// * `pairs` - `(column, value)` pairs turned into `col=?` conditions
/// * `filter` - the caller's filter expression
pub(crate) fn build_condition(
    ctx: &RouteContext,
    schema: &TableSchema,
    pairs: &[(&str, &str)],
    filter: Option<&str>,
) -> Result<WhereConfigOwned> {
    let (clause, params) = equality_clause(pairs);
    match filter {
        Some(filter) => compile_filter_with(
            ctx.filter_policy,
            filter,
            (clause.as_str(), params.as_slice()),
            &schema.column_names(),
        )
        .map_err(rejected),
        None => Ok((clause, params)),
    }
}
