use super::{
    route_op::TableTarget,
    utils::{build_condition, catalog_reply, query_params, rejected, Reply, RouteContext},
};
use crate::sqlite::{
    basics,
    decompose::decompose,
    schema::{describe_table, singular, TableLookup},
    sql,
};

use anyhow::Result;
use serde_json::json;

///
/// Delete the rows matching every supplied column value and the filter.
///
/// A request with neither a column value nor a filter is refused
/// before any statement is built.
pub fn delete(
    ctx: &RouteContext,
    target: &TableTarget,
    query: &[(String, String)],
) -> Result<Reply> {
    let schema = match describe_table(ctx.conn, &target.table)? {
        TableLookup::Found(schema) => schema,
        TableLookup::Missing(catalog) => return Ok(catalog_reply(&catalog)),
    };
    let columns = schema.column_names();
    let decomposed = decompose(&target.rest, query, &columns);
    if decomposed.params.is_empty() && decomposed.filter.is_none() {
        return Ok(Reply::Json(json!({
            "message": "missing a query parameter",
            "query_params": query_params(&schema, &columns),
            "submitted": decomposed.submitted(),
        })));
    }

    let (clause, params) = build_condition(
        ctx,
        &schema,
        &decomposed.pairs_in(&columns),
        decomposed.filter.as_deref(),
    )?;
    let stmt =
        sql::delete(&schema.name, (clause.as_str(), params.as_slice())).map_err(rejected)?;
    let deleted = basics::execute(ctx.conn, &stmt)?;
    tracing::info!(table = %schema.name, rows = deleted, "rows deleted");

    let noun = singular(&schema.name);
    let message = match deleted {
        0 => format!("0 {noun} entries found matching your parameters"),
        1 => format!("1 {noun} entry deleted"),
        n => format!("{n} {noun} entries deleted"),
    };
    Ok(Reply::Json(json!({
        "message": message,
        "submitted": decomposed.submitted(),
    })))
}
