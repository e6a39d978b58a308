use anyhow::Result;
use regex::Regex;
use rusqlite::{types, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use std::sync::OnceLock;

/// The table whose `user_id` column is its own identifier
pub const USERS_TABLE: &str = "users";

/// The identifier column of [USERS_TABLE], referenced by every other table
pub const USER_ID: &str = "user_id";

const TABLE_READ_QUERY: &str = r#"
 SELECT name FROM sqlite_master
 WHERE type='table' AND name NOT LIKE 'sqlite_%'
 ORDER BY name;
"#;

const COLUMN_READ_QUERY: &str =
    r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid;"#;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?P<name>\w+)_id$").expect("static regex"))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\w+_time$").expect("static regex"))
}

///
/// The role of a column, derived from its name
/// * `SelfId` - the table's own identifier, generated by the engine, never editable
/// * `ForeignId` - a reference to another table's identifier, required on insert, never editable
/// * `Timestamp` - filled with the local time by the engine, never required, never editable
/// * `Editable` - everything else, required on insert, optional on edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    SelfId,
    ForeignId,
    Timestamp,
    Editable,
}

impl ColumnRole {
    pub fn is_identifier(&self) -> bool {
        matches!(self, Self::SelfId | Self::ForeignId)
    }

    /// Whether a caller has to supply the column when inserting a row
    pub fn is_required(&self) -> bool {
        matches!(self, Self::ForeignId | Self::Editable)
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Editable)
    }
}

/// The singular phrasing of a table name, `users` -> `user`
pub fn singular(table: &str) -> &str {
    table.trim_end_matches('s')
}

///
/// Classify the columns of a table by naming convention.
///
/// `*_time` columns are timestamps, `*_id` columns are identifiers and everything else is editable.
/// Among the identifiers at most one is the table's own, picked in this order:
/// 1. `user_id` of the users table
/// 2. the primary key column
/// 3. `<table-singular>_id`
/// 4. the first `*_id` column when the table has no primary key
///
/// `user_id` is always a reference on tables other than the users table.
/// # Arguments
/// * `table` - the name of the table
/// * `columns` - the column names in declaration order
/// * `pk` - the primary key column, if known
pub fn infer_roles(table: &str, columns: &[&str], pk: Option<&str>) -> Vec<ColumnRole> {
    let is_users = table == USERS_TABLE;
    let own_id = format!("{}_id", singular(table));
    let can_be_self = |col: &str| is_users || col != USER_ID;
    let self_id = if is_users && columns.contains(&USER_ID) {
        Some(USER_ID)
    } else if let Some(pk) = pk.filter(|&pk| can_be_self(pk) && columns.contains(&pk)) {
        Some(pk)
    } else if columns.iter().any(|&col| col == own_id && can_be_self(col)) {
        Some(own_id.as_str())
    } else if pk.is_none() {
        columns
            .iter()
            .find(|&&col| id_pattern().is_match(col) && can_be_self(col))
            .copied()
    } else {
        None
    };
    columns
        .iter()
        .map(|col| {
            if Some(*col) == self_id {
                ColumnRole::SelfId
            } else if time_pattern().is_match(col) {
                ColumnRole::Timestamp
            } else if id_pattern().is_match(col) {
                ColumnRole::ForeignId
            } else {
                ColumnRole::Editable
            }
        })
        .collect()
}

///
/// The ColumnMeta struct represents the metadata of a column in the database
/// # Fields
/// * `name` - the name of the column
/// * `decl_type` - the declared type, e.g. `INTEGER`, `DOUBLE`
/// * `not_null` - whether the column carries `NOT NULL`
/// * `default` - the default expression, if any
/// * `is_pk` - whether the column is the primary key
/// * `role` - see [ColumnRole]
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub is_pk: bool,
    pub role: ColumnRole,
}

impl ColumnMeta {
    ///
    /// The declared type with its markers,
    /// e.g. `INTEGER PRIMARY KEY`, `TEXT NOT NULL`, `DATETIME DEFAULT (datetime('now','localtime'))`
    pub fn type_display(&self) -> String {
        let mut parts = vec![self.decl_type.clone()];
        if self.is_pk {
            parts.push("PRIMARY KEY".to_string());
        }
        if self.not_null {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &self.default {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }
}

///
/// A table and its columns in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnMeta>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The table's own identifier column
    pub fn self_identifier(&self) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.role == ColumnRole::SelfId)
    }

    fn names_where(&self, pred: impl Fn(&ColumnRole) -> bool) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| pred(&c.role))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns a caller must supply on insert: references and editable columns
    pub fn required_columns(&self) -> Vec<&str> {
        self.names_where(ColumnRole::is_required)
    }

    pub fn editable_columns(&self) -> Vec<&str> {
        self.names_where(ColumnRole::is_editable)
    }

    /// Identifier and timestamp columns, used to pick the rows to edit
    pub fn non_editable_columns(&self) -> Vec<&str> {
        self.names_where(|role| !role.is_editable())
    }

    pub fn identifier_columns(&self) -> Vec<&str> {
        self.names_where(ColumnRole::is_identifier)
    }

    pub fn timestamp_columns(&self) -> Vec<&str> {
        self.names_where(|role| *role == ColumnRole::Timestamp)
    }

    ///
    /// `{column: type}` for the given columns, used in validation responses
    pub fn type_map(&self, names: &[&str]) -> JsonValue {
        let mut map = Map::new();
        for name in names {
            if let Some(col) = self.column(name) {
                map.insert(col.name.clone(), json!(col.type_display()));
            }
        }
        JsonValue::Object(map)
    }

    ///
    /// A representation of the table which can be consumed by clients
    pub fn json(&self) -> JsonValue {
        json!({
            "name": self.name,
            "columns": self.type_map(&self.column_names()),
        })
    }
}

///
/// One column of a declarative table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sql_type: String,
    pub role: ColumnRole,
}

///
/// A declarative table definition, turned into DDL by [crate::sqlite::sql::create_table]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    ///
    /// Build a descriptor whose roles come from the column naming convention, see [infer_roles]
    /// # Arguments
    /// * `name` - the name of the table
    /// * `columns` - `(column name, column type)` pairs in declaration order
    pub fn inferred(name: &str, columns: &[(String, String)]) -> Self {
        let names = columns.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>();
        let roles = infer_roles(name, &names, None);
        Self {
            name: name.to_string(),
            columns: columns
                .iter()
                .zip(roles)
                .map(|((col, sql_type), role)| ColumnDescriptor {
                    name: col.to_string(),
                    sql_type: sql_type.to_string(),
                    role,
                })
                .collect(),
        }
    }

    pub fn users() -> Self {
        Self::inferred(
            USERS_TABLE,
            &[
                ("user_id", "INTEGER"),
                ("username", "TEXT"),
                ("password", "TEXT"),
                ("create_time", "DATETIME"),
            ]
            .map(|(c, t)| (c.to_string(), t.to_string())),
        )
    }

    pub fn oximeter() -> Self {
        Self::inferred(
            "oximeter",
            &[
                ("entry_id", "INTEGER"),
                ("user_id", "INTEGER"),
                ("heart_rate", "INTEGER"),
                ("blood_o2", "INTEGER"),
                ("temperature", "DOUBLE"),
                ("entry_time", "DATETIME"),
            ]
            .map(|(c, t)| (c.to_string(), t.to_string())),
        )
    }
}

///
/// The result of looking a table up by name
/// * `Found` - the table exists
/// * `Missing` - it doesn't, the current catalog is returned so callers can discover what exists
#[derive(Debug, Clone, PartialEq)]
pub enum TableLookup {
    Found(TableSchema),
    Missing(Vec<TableSchema>),
}

///
/// List the user tables of the connected database, sorted by name
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(TABLE_READ_QUERY)?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

fn default_to_string(default: types::Value) -> Option<String> {
    match default {
        types::Value::Null => None,
        types::Value::Integer(int) => Some(int.to_string()),
        types::Value::Real(float) => Some(float.to_string()),
        types::Value::Text(text) => Some(text),
        types::Value::Blob(_) => None,
    }
}

///
/// Read the columns of a table from the catalog.
/// An unknown table yields an empty list.
pub fn get_columns_meta(conn: &Connection, table: &str) -> Result<Vec<ColumnMeta>> {
    let mut stmt = conn.prepare(COLUMN_READ_QUERY)?;
    let mut rows = stmt.query([table])?;
    let mut raw = vec![];
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let decl_type: String = row.get(1)?;
        let not_null: bool = row.get(2)?;
        let default: types::Value = row.get(3)?;
        let pk: i64 = row.get(4)?;
        raw.push((name, decl_type.to_uppercase(), not_null, default, pk));
    }
    let single_pk = raw.iter().filter(|(.., pk)| *pk > 0).count() == 1;
    let pk = raw
        .iter()
        .find(|(.., pk)| single_pk && *pk > 0)
        .map(|(name, ..)| name.as_str());
    let names = raw.iter().map(|(name, ..)| name.as_str()).collect::<Vec<_>>();
    let roles = infer_roles(table, &names, pk);
    let pk = pk.map(str::to_string);
    Ok(raw
        .into_iter()
        .zip(roles)
        .map(|((name, decl_type, not_null, default, _), role)| ColumnMeta {
            is_pk: pk.as_deref() == Some(name.as_str()),
            name,
            decl_type,
            not_null,
            default: default_to_string(default),
            role,
        })
        .collect())
}

///
/// Describe every table of the connected database
pub fn fetch_catalog(conn: &Connection) -> Result<Vec<TableSchema>> {
    let mut catalog = vec![];
    for name in list_tables(conn)? {
        let columns = get_columns_meta(conn, &name)?;
        catalog.push(TableSchema { name, columns });
    }
    Ok(catalog)
}

///
/// Describe a table by its name.
/// The metadata is read fresh on every call so that tables created or dropped
/// by earlier requests are always reflected.
pub fn describe_table(conn: &Connection, name: &str) -> Result<TableLookup> {
    let tables = list_tables(conn)?;
    if !tables.iter().any(|t| t == name) {
        return Ok(TableLookup::Missing(fetch_catalog(conn)?));
    }
    Ok(TableLookup::Found(TableSchema {
        name: name.to_string(),
        columns: get_columns_meta(conn, name)?,
    }))
}

///
/// Create the baseline tables (`users` and `oximeter`) when they don't exist yet
pub fn bootstrap(conn: &Connection) -> Result<()> {
    let tables = list_tables(conn)?;
    for descriptor in [TableDescriptor::users(), TableDescriptor::oximeter()] {
        if tables.contains(&descriptor.name) {
            continue;
        }
        let stmt = super::sql::create_table(&descriptor)?;
        conn.execute(&stmt.sql, [])?;
        tracing::info!(table = %descriptor.name, "created baseline table");
    }
    Ok(())
}
