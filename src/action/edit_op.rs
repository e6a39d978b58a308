use super::{
    add_op::PASSWORD,
    route_op::TableTarget,
    utils::{build_condition, catalog_reply, query_params, rejected, Reply, RouteContext},
};
use crate::sqlite::{
    basics,
    decompose::decompose,
    filter::{extract_literals, verify_expression, FilterPolicy},
    schema::{describe_table, singular, TableLookup, USERS_TABLE},
    shift::val::v_txt,
    sql::{self, SetValue},
};

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::json;

///
/// Decide how a submitted value is written into a SET clause.
///
/// Numbers are always bound as literals.
/// Anything mentioning one of the columns being set as a whole word,
/// e.g. `(temperature-32)*5/9` or `heart_rate+1`, is written as an expression.
/// # Examples
/// ```
/// use pathstore::action::classify_set_value;
/// use pathstore::sqlite::sql::SetValue;
/// let cols = ["temperature", "heart_rate"];
/// assert!(matches!(classify_set_value("(temperature-32)*5/9", &cols).unwrap(), SetValue::Raw(_)));
/// assert!(matches!(classify_set_value("98.6", &cols).unwrap(), SetValue::Literal(_)));
/// assert!(matches!(classify_set_value("heart_rates are fine", &cols).unwrap(), SetValue::Literal(_)));
/// ```
pub fn classify_set_value(value: &str, set_columns: &[&str]) -> Result<SetValue> {
    if value.trim().parse::<f64>().is_ok() {
        return Ok(SetValue::Literal(v_txt(value)));
    }
    for col in set_columns {
        let mention = Regex::new(&format!(r"\b{}\b", regex::escape(col)))
            .map_err(|e| anyhow!("Failed to match the column '{}': {}", col, e))?;
        if mention.is_match(value) {
            return Ok(SetValue::Raw(value.to_string()));
        }
    }
    Ok(SetValue::Literal(v_txt(value)))
}

///
/// Update the editable columns of every row matched by the supplied
/// identifier/timestamp values and the filter.
///
/// At least one editable column is needed, and at least one non-editable column or a filter,
/// so an edit never touches every row by accident.
pub fn edit(ctx: &RouteContext, target: &TableTarget, query: &[(String, String)]) -> Result<Reply> {
    let schema = match describe_table(ctx.conn, &target.table)? {
        TableLookup::Found(schema) => schema,
        TableLookup::Missing(catalog) => return Ok(catalog_reply(&catalog)),
    };
    let columns = schema.column_names();
    let editable = schema.editable_columns();
    let locators = schema.non_editable_columns();
    let decomposed = decompose(&target.rest, query, &columns);

    if !decomposed.has_any(&editable) {
        return Ok(Reply::Json(json!({
            "message": "missing a parameter to edit",
            "editable": schema.type_map(&editable),
            "submitted": decomposed.submitted(),
        })));
    }
    if !decomposed.has_any(&locators) && decomposed.filter.is_none() {
        return Ok(Reply::Json(json!({
            "message": "missing a query parameter",
            "query_params": query_params(&schema, &locators),
            "submitted": decomposed.submitted(),
        })));
    }

    let set_pairs = decomposed.pairs_in(&editable);
    let set_columns = set_pairs.iter().map(|(col, _)| *col).collect::<Vec<&str>>();
    let mut input = vec![];
    for (col, val) in &set_pairs {
        let set_value = match classify_set_value(val, &set_columns)? {
            SetValue::Literal(_) if schema.name == USERS_TABLE && *col == PASSWORD => {
                SetValue::Literal(v_txt(&ctx.hasher.hash(val)?))
            }
            SetValue::Raw(expr) => {
                if ctx.filter_policy == FilterPolicy::Strict {
                    verify_expression(&expr, &columns).map_err(rejected)?;
                } else {
                    extract_literals(&expr).map_err(rejected)?;
                }
                SetValue::Raw(expr)
            }
            literal => literal,
        };
        input.push((*col, set_value));
    }

    let (clause, params) = build_condition(
        ctx,
        &schema,
        &decomposed.pairs_in(&locators),
        decomposed.filter.as_deref(),
    )?;
    let stmt = sql::update(
        &schema.name,
        &input,
        (clause.as_str(), params.as_slice()),
    )
    .map_err(rejected)?;
    let edited = basics::execute(ctx.conn, &stmt)?;
    tracing::info!(table = %schema.name, rows = edited, "rows edited");

    let noun = singular(&schema.name);
    let message = match edited {
        0 => format!("0 {noun} entries found matching your parameters"),
        1 => format!("edited 1 {noun} entry"),
        n => format!("edited {n} {noun} entries"),
    };
    Ok(Reply::Json(json!({
        "message": message,
        "submitted": decomposed.submitted(),
    })))
}
