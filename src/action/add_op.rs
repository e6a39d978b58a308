use super::{
    route_op::TableTarget,
    utils::{catalog_reply, rejected, Reply, RouteContext},
};
use crate::sqlite::{
    basics,
    decompose::decompose,
    schema::{describe_table, ColumnRole, TableLookup, USERS_TABLE},
    shift::val::v_txt,
    sql,
};

use anyhow::Result;
use rusqlite::types;
use serde_json::{json, Map, Value as JsonValue};

/// The column of the users table holding the stored credential
pub const PASSWORD: &str = "password";

/// The column of the users table that has to be unique
pub const USERNAME: &str = "username";

///
/// Insert one row.
///
/// Every required column (references and editable columns) must be supplied,
/// otherwise the reply lists what is required, what is missing and what was submitted.
/// On the users table the username must be new and the password is stored as a credential.
pub fn add(ctx: &RouteContext, target: &TableTarget, query: &[(String, String)]) -> Result<Reply> {
    let schema = match describe_table(ctx.conn, &target.table)? {
        TableLookup::Found(schema) => schema,
        TableLookup::Missing(catalog) => return Ok(catalog_reply(&catalog)),
    };
    let required = schema.required_columns();
    let decomposed = decompose(&target.rest, query, &required);

    let missing = required
        .iter()
        .filter(|col| !decomposed.params.contains_key(**col))
        .copied()
        .collect::<Vec<&str>>();
    if !missing.is_empty() {
        return Ok(Reply::Json(json!({
            "message": "missing parameters",
            "required": schema.type_map(&required),
            "missing": schema.type_map(&missing),
            "submitted": decomposed.submitted(),
        })));
    }

    let mut input: Vec<(&str, types::Value)> = decomposed
        .pairs_in(&required)
        .into_iter()
        .map(|(col, val)| (col, v_txt(val)))
        .collect();

    if schema.name == USERS_TABLE {
        if let Some(username) = decomposed.params.get(USERNAME) {
            let taken = sql::select(USERS_TABLE, None, Some(("username=?", &[v_txt(username)])))
                .map_err(rejected)?;
            if basics::fetch_one(ctx.conn, &taken)?.is_some() {
                return Ok(Reply::Json(json!({
                    "message": "user exists",
                    "username": username,
                })));
            }
        }
        for (col, val) in input.iter_mut() {
            if *col != PASSWORD {
                continue;
            }
            let credential = match val {
                types::Value::Text(plaintext) => ctx.hasher.hash(plaintext)?,
                _ => continue,
            };
            *val = types::Value::Text(credential);
        }
    }

    let stmt = sql::insert(&schema.name, &input).map_err(rejected)?;
    let new_id = basics::insert(ctx.conn, &stmt)?;
    tracing::info!(table = %schema.name, id = new_id, "row added");

    let mut reply = Map::new();
    reply.insert(
        "message".to_string(),
        json!(format!("data added to {}", schema.name)),
    );
    let id_key = schema
        .self_identifier()
        .map(|col| col.name.as_str())
        .unwrap_or("rowid");
    reply.insert(id_key.to_string(), json!(new_id));
    for col in schema
        .columns
        .iter()
        .filter(|col| col.role == ColumnRole::ForeignId)
    {
        if let Some(val) = decomposed.params.get(&col.name) {
            reply.insert(col.name.clone(), json!(val));
        }
    }
    Ok(Reply::Json(JsonValue::Object(reply)))
}
