use super::{
    route_op::TableTarget,
    utils::{build_condition, catalog_reply, rejected, Reply, RouteContext},
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
/// Read the rows matching every supplied column value and the filter, if any.
/// Without conditions every row of the table is returned.
pub fn get(ctx: &RouteContext, target: &TableTarget, query: &[(String, String)]) -> Result<Reply> {
    let schema = match describe_table(ctx.conn, &target.table)? {
        TableLookup::Found(schema) => schema,
        TableLookup::Missing(catalog) => return Ok(catalog_reply(&catalog)),
    };
    let columns = schema.column_names();
    let decomposed = decompose(&target.rest, query, &columns);
    let (clause, params) = build_condition(
        ctx,
        &schema,
        &decomposed.pairs_in(&columns),
        decomposed.filter.as_deref(),
    )?;
    let stmt = sql::select(
        &schema.name,
        None,
        Some((clause.as_str(), params.as_slice())),
    )
    .map_err(rejected)?;
    let fetched = basics::fetch(ctx.conn, &stmt, false)?;

    let noun = singular(&schema.name);
    let message = match fetched.len() {
        0 => format!("0 {noun} entries found using submitted parameters"),
        1 => format!("1 {noun} entry found"),
        n => format!("found {n} {noun} entries"),
    };
    Ok(Reply::Json(json!({
        "message": message,
        "data": fetched.json()?,
    })))
}
