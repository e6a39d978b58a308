mod helpers;
use helpers::{body, initialize_db, run};

use pathstore::sqlite::schema::{
    describe_table, fetch_catalog, list_tables, ColumnRole, TableLookup, TableSchema,
};

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::collections::HashSet;

fn found(conn: &Connection, name: &str) -> Result<TableSchema> {
    match describe_table(conn, name)? {
        TableLookup::Found(schema) => Ok(schema),
        TableLookup::Missing(_) => Err(anyhow!("table {} is missing", name)),
    }
}

#[test]
fn test_baseline_roles() -> Result<()> {
    let conn = Connection::open_in_memory()?;
    initialize_db(&conn)?;

    let users = found(&conn, "users")?;
    assert_eq!(
        users.self_identifier().map(|c| c.name.as_str()),
        Some("user_id")
    );
    assert_eq!(users.required_columns(), vec!["username", "password"]);
    assert_eq!(users.non_editable_columns(), vec!["user_id", "create_time"]);

    let oximeter = found(&conn, "oximeter")?;
    assert_eq!(
        oximeter.self_identifier().map(|c| c.name.as_str()),
        Some("entry_id")
    );
    assert_eq!(
        oximeter.column("user_id").map(|c| c.role),
        Some(ColumnRole::ForeignId)
    );
    assert_eq!(
        oximeter.required_columns(),
        vec!["user_id", "heart_rate", "blood_o2", "temperature"]
    );
    assert_eq!(
        oximeter.editable_columns(),
        vec!["heart_rate", "blood_o2", "temperature"]
    );
    assert_eq!(oximeter.timestamp_columns(), vec!["entry_time"]);
    Ok(())
}

#[test]
fn test_roles_partition_the_columns() -> Result<()> {
    let conn = Connection::open_in_memory()?;
    initialize_db(&conn)?;

    for schema in fetch_catalog(&conn)? {
        let all: HashSet<&str> = schema.column_names().into_iter().collect();
        let editable: HashSet<&str> = schema.editable_columns().into_iter().collect();
        let ids: HashSet<&str> = schema.identifier_columns().into_iter().collect();
        let times: HashSet<&str> = schema.timestamp_columns().into_iter().collect();
        assert!(ids.is_disjoint(&editable));
        assert!(times.is_disjoint(&editable));
        assert!(ids.is_disjoint(&times));
        let union: HashSet<&str> = ids
            .union(&times)
            .copied()
            .chain(editable.iter().copied())
            .collect();
        assert_eq!(union, all, "table {}", schema.name);
        let self_ids = schema
            .columns
            .iter()
            .filter(|c| c.role == ColumnRole::SelfId)
            .count();
        assert!(self_ids <= 1);
    }
    Ok(())
}

#[test]
fn test_type_markers() -> Result<()> {
    let conn = Connection::open_in_memory()?;
    initialize_db(&conn)?;

    let oximeter = found(&conn, "oximeter")?;
    let types = oximeter.type_map(&oximeter.column_names());
    assert_eq!(types["entry_id"], "INTEGER PRIMARY KEY");
    assert_eq!(types["user_id"], "INTEGER NOT NULL");
    assert_eq!(types["temperature"], "DOUBLE NOT NULL");
    let entry_time = types["entry_time"].as_str().unwrap_or_default();
    assert!(entry_time.starts_with("DATETIME DEFAULT"));
    assert!(entry_time.contains("localtime"));
    Ok(())
}

#[test]
fn test_unknown_table_returns_the_catalog() -> Result<()> {
    let conn = Connection::open_in_memory()?;
    initialize_db(&conn)?;

    match describe_table(&conn, "nonexistent_table")? {
        TableLookup::Found(_) => panic!("nonexistent_table should not exist"),
        TableLookup::Missing(catalog) => {
            let names = catalog.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
            assert_eq!(names, vec!["oximeter", "users"]);
        }
    }

    let reply = body(run(&conn, "/get/nonexistent_table", &[]));
    assert_eq!(reply["message"], "active tables in the database");
    assert_eq!(reply["tables"][1]["name"], "users");
    assert_eq!(
        reply["tables"][1]["columns"]["username"],
        "TEXT NOT NULL"
    );
    Ok(())
}

#[test]
fn test_new_tables_are_seen_right_away() -> Result<()> {
    let conn = Connection::open_in_memory()?;
    initialize_db(&conn)?;

    conn.execute(
        "CREATE TABLE walks (walk_id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, distance DOUBLE NOT NULL, walk_time DATETIME)",
        [],
    )?;
    assert_eq!(list_tables(&conn)?, vec!["oximeter", "users", "walks"]);
    let walks = found(&conn, "walks")?;
    assert_eq!(walks.required_columns(), vec!["user_id", "distance"]);

    conn.execute("DROP TABLE walks", [])?;
    assert!(matches!(
        describe_table(&conn, "walks")?,
        TableLookup::Missing(_)
    ));
    Ok(())
}
