use super::{
    route_op::TableTarget,
    utils::{catalog_reply, rejected, Reply, RouteContext},
};
use crate::sqlite::{
    basics,
    decompose::map_column_types,
    schema::{describe_table, fetch_catalog, ColumnRole, TableDescriptor, TableLookup},
    sql,
};

use anyhow::{anyhow, Result};
use serde_json::json;

/// The column types a new table may declare
pub const AVAILABLE_TYPES: [&str; 4] = ["INTEGER", "DOUBLE", "TEXT", "DATETIME"];

///
/// Create a table from `/<column>/<TYPE>/...` pairs.
///
/// The roles of the new columns follow the naming convention,
/// see [TableDescriptor::inferred]. The table's own identifier is always an INTEGER,
/// so it is the rowid reported by `/add`.
pub fn create_table(
    ctx: &RouteContext,
    target: &TableTarget,
    query: &[(String, String)],
) -> Result<Reply> {
    if target.table.is_empty() {
        return Ok(catalog_reply(&fetch_catalog(ctx.conn)?));
    }
    let columns = map_column_types(&target.rest, query);
    if columns.is_empty() {
        return Ok(Reply::Json(json!({
            "message": "missing parameters",
            "required": {
                "user_id": "INTEGER",
                "{ref}_id": "INTEGER",
                "{ref}_time": "DATETIME",
                "{column_name}": "{column_type}",
            },
            "available_types": AVAILABLE_TYPES,
            "submitted": {},
        })));
    }
    if let TableLookup::Found(existing) = describe_table(ctx.conn, &target.table)? {
        return Ok(Reply::Json(json!({
            "message": "table exists",
            "table": existing.json(),
        })));
    }
    if let Some((col, sql_type)) = columns
        .iter()
        .find(|(_, sql_type)| !AVAILABLE_TYPES.contains(&sql_type.as_str()))
    {
        return Err(rejected(anyhow!(
            "'{}' is not an available type for the column '{}', use one of {:?}",
            sql_type,
            col,
            AVAILABLE_TYPES
        )));
    }

    let descriptor = TableDescriptor::inferred(&target.table, &columns);
    if let Some(self_id) = descriptor
        .columns
        .iter()
        .find(|col| col.role == ColumnRole::SelfId && col.sql_type != "INTEGER")
    {
        return Err(rejected(anyhow!(
            "'{}' identifies the rows of '{}' and has to be INTEGER, got '{}'",
            self_id.name,
            descriptor.name,
            self_id.sql_type
        )));
    }
    let stmt = sql::create_table(&descriptor).map_err(rejected)?;
    basics::execute(ctx.conn, &stmt)?;
    tracing::info!(table = %descriptor.name, "table created");

    let table = match describe_table(ctx.conn, &descriptor.name)? {
        TableLookup::Found(schema) => schema.json(),
        TableLookup::Missing(_) => json!({ "name": descriptor.name }),
    };
    Ok(Reply::Json(json!({
        "message": "table created",
        "table": table,
    })))
}

///
/// Drop a table. An unknown name is answered with the catalog.
pub fn delete_table(ctx: &RouteContext, target: &TableTarget) -> Result<Reply> {
    let schema = match describe_table(ctx.conn, &target.table)? {
        TableLookup::Found(schema) => schema,
        TableLookup::Missing(catalog) => return Ok(catalog_reply(&catalog)),
    };
    let stmt = sql::drop_table(&schema.name).map_err(rejected)?;
    basics::execute(ctx.conn, &stmt)?;
    tracing::info!(table = %schema.name, "table deleted");
    Ok(Reply::Json(json!({
        "message": "table deleted",
        "table": schema.name,
    })))
}
