use super::{
    add_op::{PASSWORD, USERNAME},
    utils::{catalog_reply, rejected, Reply, RouteContext},
};
use crate::sqlite::{
    basics,
    decompose::decompose,
    schema::{describe_table, TableLookup, USERS_TABLE, USER_ID},
    shift::{val::v_txt, value_to_json},
    sql,
};

use anyhow::Result;
use rusqlite::types;
use serde_json::{json, Value as JsonValue};

///
/// Check a username/password pair against the users table.
/// Nothing is remembered between requests, and the password is never sent back.
pub fn login(ctx: &RouteContext, rest: &str, query: &[(String, String)]) -> Result<Reply> {
    let schema = match describe_table(ctx.conn, USERS_TABLE)? {
        TableLookup::Found(schema) => schema,
        TableLookup::Missing(catalog) => return Ok(catalog_reply(&catalog)),
    };
    let required = [USERNAME, PASSWORD];
    let decomposed = decompose(rest, query, &required);
    let (Some(username), Some(password)) = (
        decomposed.params.get(USERNAME),
        decomposed.params.get(PASSWORD),
    ) else {
        let missing = required
            .iter()
            .filter(|col| !decomposed.params.contains_key(**col))
            .collect::<Vec<_>>();
        return Ok(Reply::Json(json!({
            "message": "missing parameters",
            "required": schema.type_map(&required),
            "missing": missing,
            "submitted": { "username": decomposed.params.get(USERNAME) },
        })));
    };

    let stmt = sql::select(USERS_TABLE, None, Some(("username=?", &[v_txt(username)])))
        .map_err(rejected)?;
    let Some(user) = basics::fetch_one(ctx.conn, &stmt)? else {
        return Ok(Reply::Json(json!({
            "message": "user does not exist",
            "username": username,
        })));
    };
    let matches = match user.get(PASSWORD) {
        Some(types::Value::Text(credential)) => ctx.hasher.verify(password, credential),
        _ => false,
    };
    if !matches {
        tracing::info!(%username, "login refused");
        return Ok(Reply::Json(json!({
            "message": "incorrect password",
            "username": username,
        })));
    }
    let user_id = match user.get(USER_ID) {
        Some(val) => value_to_json(val)?,
        None => JsonValue::Null,
    };
    Ok(Reply::Json(json!({
        "message": "user login success",
        "user_id": user_id,
        "username": username,
    })))
}
