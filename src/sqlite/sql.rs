use super::schema::{ColumnRole, TableDescriptor};

use anyhow::{anyhow, Result};
use rusqlite::types;

/// Used as inputs to generate where conditions for SQL queries
///
/// # Arguments
/// * `clause` - the where clause
/// * `params` - the parameters for the where clause
///
/// # Examples
/// ```
/// use pathstore::sqlite::sql::WhereConfig;
/// use rusqlite::types;
/// let (clause, params): WhereConfig = ("user_id=?", &vec![types::Value::Integer(1)]);
/// ```
pub type WhereConfig<'a> = (&'a str, &'a [types::Value]);

/// The owned version of [WhereConfig],
/// used as outputs, e.g., for functions that generate where conditions for SQL queries
pub type WhereConfigOwned = (String, Vec<types::Value>);

/// The default expression given to every timestamp column
pub const LOCAL_TIME_DEFAULT: &str = "(datetime('now','localtime'))";

///
/// A fully built statement: the SQL text and the values bound to its `?` placeholders,
/// in the same order as the placeholders appear in the text
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<types::Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<types::Value>) -> Self {
        Self { sql, params }
    }
}

///
/// The value assigned to a column by an UPDATE
/// * `Literal` - bound through a placeholder
/// * `Raw` - an SQL expression written into the statement as-is,
///   e.g. `(temperature-32)*5/9` to convert a column in place
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Literal(types::Value),
    Raw(String),
}

///
/// Verify that a table or column name can be written into a statement
pub fn verify_ident(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_head || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(anyhow!(
            "'{}' is not a valid name, only letters, digits and '_' are allowed and it cannot start with a digit",
            name
        ));
    }
    Ok(())
}

///
/// Build `col1=? AND col2=? ...` for a list of column/value pairs
/// # Examples
/// ```
/// use pathstore::sqlite::sql::equality_clause;
/// let (clause, params) = equality_clause(&[("user_id", "7"), ("heart_rate", "70")]);
/// assert_eq!(clause, "user_id=? AND heart_rate=?");
/// assert_eq!(params.len(), 2);
/// ```
pub fn equality_clause(pairs: &[(&str, &str)]) -> WhereConfigOwned {
    let clause = pairs
        .iter()
        .map(|(col, _)| format!("{col}=?"))
        .collect::<Vec<String>>()
        .join(" AND ");
    let params = pairs
        .iter()
        .map(|(_, val)| types::Value::Text(val.to_string()))
        .collect();
    (clause, params)
}

///
/// Standardize the where clause and parameters for a SQL query
/// # Arguments
/// * `q_config` - the where clause and the parameters for the where clause
/// * `link_word` - the word to link the where clause to the previous clause
pub fn standardize_q_config(q_config: Option<WhereConfig>, link_word: &str) -> WhereConfigOwned {
    match q_config {
        Some((clause, params)) => {
            if clause.trim().is_empty() {
                return ("".to_string(), vec![]);
            }
            (
                if link_word.is_empty() {
                    clause.to_string()
                } else {
                    format!("{link_word} ({clause})")
                },
                params.to_vec(),
            )
        }
        None => ("".to_string(), vec![]),
    }
}

fn required_where(action: &str, table: &str, where_config: WhereConfig) -> Result<WhereConfigOwned> {
    let (clause, params) = standardize_q_config(Some(where_config), "WHERE");
    if clause.is_empty() {
        return Err(anyhow!(
            "Refusing to {} every row of '{}': a condition is required",
            action,
            table
        ));
    }
    Ok((clause, params))
}

///
/// `INSERT INTO t (c1, c2, ...) VALUES (?, ?, ...)`,
/// or `INSERT INTO t DEFAULT VALUES` when there is nothing to supply
pub fn insert(table: &str, input: &[(&str, types::Value)]) -> Result<Statement> {
    verify_ident(table)?;
    if input.is_empty() {
        return Ok(Statement::new(
            format!("INSERT INTO {} DEFAULT VALUES", table),
            vec![],
        ));
    }
    let mut columns = vec![];
    let mut params = vec![];
    for (col, val) in input {
        verify_ident(col)?;
        columns.push(*col);
        params.push(val.clone());
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        ),
        params,
    ))
}

///
/// `SELECT <cols|*> FROM t WHERE <condition|1=1>`
pub fn select(
    table: &str,
    display_cols: Option<&[&str]>,
    where_config: Option<WhereConfig>,
) -> Result<Statement> {
    verify_ident(table)?;
    let cols = match display_cols {
        Some(cols) if !cols.is_empty() => {
            for col in cols {
                verify_ident(col)?;
            }
            cols.join(", ")
        }
        _ => "*".to_string(),
    };
    let (where_clause, params) = standardize_q_config(where_config, "WHERE");
    let where_clause = if where_clause.is_empty() {
        "WHERE 1=1".to_string()
    } else {
        where_clause
    };
    Ok(Statement::new(
        format!("SELECT {} FROM {} {}", cols, table, where_clause),
        params,
    ))
}

///
/// `UPDATE t SET c1=?, c2=<raw> WHERE <condition>`
///
/// The values of the SET part are bound before the values of the condition,
/// matching the order their placeholders appear in the text.
pub fn update(
    table: &str,
    input: &[(&str, SetValue)],
    where_config: WhereConfig,
) -> Result<Statement> {
    verify_ident(table)?;
    if input.is_empty() {
        return Err(anyhow!("(table: {}) Nothing to update", table));
    }
    let mut set_clause = vec![];
    let mut params = vec![];
    for (col, val) in input {
        verify_ident(col)?;
        match val {
            SetValue::Literal(v) => {
                set_clause.push(format!("{col}=?"));
                params.push(v.clone());
            }
            SetValue::Raw(expr) => set_clause.push(format!("{col}={expr}")),
        }
    }
    let (where_clause, where_params) = required_where("update", table, where_config)?;
    params.extend(where_params);
    Ok(Statement::new(
        format!("UPDATE {} SET {} {}", table, set_clause.join(", "), where_clause),
        params,
    ))
}

///
/// `DELETE FROM t WHERE <condition>`
///
/// The condition cannot be empty, an unconditional delete is never produced.
pub fn delete(table: &str, where_config: WhereConfig) -> Result<Statement> {
    verify_ident(table)?;
    let (where_clause, params) = required_where("delete", table, where_config)?;
    Ok(Statement::new(
        format!("DELETE FROM {} {}", table, where_clause),
        params,
    ))
}

///
/// `CREATE TABLE t (...)` from a declarative descriptor
pub fn create_table(descriptor: &TableDescriptor) -> Result<Statement> {
    verify_ident(&descriptor.name)?;
    if descriptor.columns.is_empty() {
        return Err(anyhow!("Table '{}' needs at least one column", descriptor.name));
    }
    let mut defs = vec![];
    for col in &descriptor.columns {
        verify_ident(&col.name)?;
        verify_ident(&col.sql_type)?;
        let constraint = match col.role {
            ColumnRole::SelfId => "PRIMARY KEY".to_string(),
            ColumnRole::Timestamp => format!("DEFAULT {LOCAL_TIME_DEFAULT}"),
            ColumnRole::ForeignId | ColumnRole::Editable => "NOT NULL".to_string(),
        };
        defs.push(format!("{} {} {}", col.name, col.sql_type, constraint));
    }
    Ok(Statement::new(
        format!("CREATE TABLE {} ({})", descriptor.name, defs.join(", ")),
        vec![],
    ))
}

///
/// `DROP TABLE t`
pub fn drop_table(table: &str) -> Result<Statement> {
    verify_ident(table)?;
    Ok(Statement::new(format!("DROP TABLE {table}"), vec![]))
}
